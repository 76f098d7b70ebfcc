//! Schluesselableitung (HKDF-SHA256)
//!
//! Aus dem KEM-Secret wird der 32-Byte-Kanalschluessel abgeleitet.
//! Salt ist der SHA-256 des KEM-Ciphertexts, damit der Schluessel an genau
//! diesen Handshake gebunden ist.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::aead::{SymmetricChannel, SCHLUESSEL_LAENGE};
use crate::error::{CryptoError, CryptoResult};
use crate::types::{SecretBytes, SharedSecret};

/// Kontext-Label fuer den Tunnel-Kanal
pub const KONTEXT_TUNNEL: &[u8] = b"kybervpn-tunnel-key-v1";
/// Kontext-Label fuer Raum-Schluessel im Chat
pub const KONTEXT_RAUM: &[u8] = b"kybervpn-room-key-v1";

/// HKDF-basierte Key Derivation (allgemein verwendbar)
pub fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8], len: usize) -> CryptoResult<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(okm)
}

/// Leitet den Kanalschluessel aus KEM-Secret und Ciphertext ab
pub fn derive_channel_key(
    shared_secret: &SharedSecret,
    kem_ciphertext: &[u8],
    kontext: &[u8],
) -> CryptoResult<SecretBytes> {
    let salt = Sha256::digest(kem_ciphertext);
    let okm = hkdf_derive(shared_secret.as_bytes(), &salt, kontext, SCHLUESSEL_LAENGE)?;
    Ok(SecretBytes::new(okm))
}

/// Leitet den Schluessel ab und bindet direkt einen Kanal daran
pub fn kanal_ableiten(
    shared_secret: &SharedSecret,
    kem_ciphertext: &[u8],
    kontext: &[u8],
) -> CryptoResult<SymmetricChannel> {
    let schluessel = derive_channel_key(shared_secret, kem_ciphertext, kontext)?;
    SymmetricChannel::new(schluessel.as_bytes())
}
