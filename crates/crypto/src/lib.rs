//! # kybervpn-crypto
//!
//! Post-Quanten-Schluesselaustausch und authentifizierte Verschluesselung.
//!
//! ## Module
//! - `kem` - ML-KEM Key Encapsulation (Stufen 1/3/5)
//! - `aead` - AES-256-GCM Kanal mit Zufalls-Nonces
//! - `kdf` - HKDF-SHA256 Ableitung des Kanalschluessels
//! - `handshake` - Vollstaendiger KEM-Handshake bis zum Kanal
//! - `types` - Gemeinsame Typen (SecretBytes, SharedSecret, Nonce, ...)
//! - `error` - Fehlertypen

pub mod aead;
pub mod error;
pub mod handshake;
pub mod kdf;
pub mod kem;
pub mod types;

// Bequeme Re-Exports
pub use aead::SymmetricChannel;
pub use error::{CryptoError, CryptoResult};
pub use handshake::handshake_durchfuehren;
pub use kdf::{derive_channel_key, hkdf_derive, kanal_ableiten, KONTEXT_RAUM, KONTEXT_TUNNEL};
pub use kem::{get_algorithm_details, AlgorithmusDetails, EncapsulatedSecret, KemManager, KeyPair, SicherheitsStufe};
pub use types::{EncryptedPayload, Nonce, SecretBytes, SharedSecret};
