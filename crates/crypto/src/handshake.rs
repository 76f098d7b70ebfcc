//! KEM-Handshake mit lokal simulierter Gegenstelle
//!
//! Ablauf:
//! 1. Client erzeugt ein Schluesselpaar der konfigurierten Stufe
//! 2. Gegenstelle kapselt ein Secret unter dem Client-Public-Key
//! 3. Client dekapselt den Ciphertext
//! 4. Beide Secrets muessen uebereinstimmen, sonst kein Kanal
//! 5. HKDF leitet den Kanalschluessel ab
//!
//! Schluesselpaar und Secrets leben nur innerhalb von [`handshake_durchfuehren`]
//! und werden beim Verlassen genullt.

use crate::aead::SymmetricChannel;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::kanal_ableiten;
use crate::kem::KemManager;

/// Fuehrt den vollstaendigen Handshake durch und liefert den Kanal
pub fn handshake_durchfuehren(kem: &KemManager, kontext: &[u8]) -> CryptoResult<SymmetricChannel> {
    let client = kem.generate_keypair();

    // Gegenstelle: Encapsulation unter dem Client-Public-Key
    let gekapselt = kem.encapsulate(&client.public_key)?;

    // Client: Decapsulation mit eigenem Secret Key
    let secret = kem.decapsulate(&gekapselt.ciphertext, client.secret_key())?;

    if secret != gekapselt.shared_secret {
        return Err(CryptoError::Handshake(
            "Shared Secrets stimmen nicht ueberein".to_string(),
        ));
    }

    let kanal = kanal_ableiten(&secret, &gekapselt.ciphertext, kontext)?;
    tracing::debug!(
        algorithmus = kem.details().name,
        fingerprint = %kanal.key_fingerprint(),
        "KEM-Handshake abgeschlossen"
    );
    Ok(kanal)
}
