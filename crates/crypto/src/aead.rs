//! Authentifizierter symmetrischer Kanal (AES-256-GCM)
//!
//! Ein Kanal ist fuer seine gesamte Lebensdauer an genau einen 32-Byte-
//! Schluessel gebunden. Jede Verschluesselung zieht eine frische 96-Bit-Nonce
//! aus dem OS-CSPRNG. Nach 2^32 Nachrichten verweigert der Kanal weitere
//! Verschluesselungen, damit Nonce-Kollisionen vernachlaessigbar bleiben.
//!
//! ## Format (Base64-Variante)
//! ```text
//! [nonce(12)] [ciphertext + auth_tag(16)]
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce as AesNonce,
};
use base64::{engine::general_purpose::STANDARD, engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};
use crate::types::{EncryptedPayload, Nonce};

pub const SCHLUESSEL_LAENGE: usize = 32;
pub const NONCE_LAENGE: usize = 12;
pub const TAG_LAENGE: usize = 16;

/// Obergrenze fuer Verschluesselungen unter einem Schluessel (zufaellige Nonces)
pub const MAX_NACHRICHTEN_PRO_SCHLUESSEL: u64 = 1 << 32;

/// AEAD-Kanal mit festem Schluessel
///
/// Der Cipher-Zustand wird beim Drop genullt (`aes-gcm` mit `zeroize`).
pub struct SymmetricChannel {
    cipher: Aes256Gcm,
    fingerprint: String,
    verschluesselungen: AtomicU64,
}

impl SymmetricChannel {
    /// Bindet den Kanal an einen Schluessel. Jede Laenge ausser 32 ist ungueltig.
    pub fn new(key_bytes: &[u8]) -> CryptoResult<Self> {
        if key_bytes.len() != SCHLUESSEL_LAENGE {
            return Err(CryptoError::UngueltigeSchluesselLaenge {
                erwartet: SCHLUESSEL_LAENGE,
                erhalten: key_bytes.len(),
            });
        }

        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
            fingerprint: URL_SAFE_NO_PAD.encode(Sha256::digest(key_bytes)),
            verschluesselungen: AtomicU64::new(0),
        })
    }

    /// SHA-256 des Schluessels (Base64url) – nur als Referenz fuer Logs
    pub fn key_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Bisherige Anzahl an Verschluesselungen unter diesem Schluessel
    pub fn verschluesselungen(&self) -> u64 {
        self.verschluesselungen.load(Ordering::Relaxed)
    }

    /// Verschluesselt mit frischer Zufalls-Nonce
    pub fn encrypt(&self, plaintext: &[u8], aad: Option<&[u8]>) -> CryptoResult<EncryptedPayload> {
        self.verschluesselungen
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < MAX_NACHRICHTEN_PRO_SCHLUESSEL).then_some(n + 1)
            })
            .map_err(|_| CryptoError::NonceLimitErreicht {
                limit: MAX_NACHRICHTEN_PRO_SCHLUESSEL,
            })?;

        let mut nonce_bytes = [0u8; NONCE_LAENGE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                AesNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: aad.unwrap_or_default(),
                },
            )
            .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

        Ok(EncryptedPayload {
            nonce: Nonce { bytes: nonce_bytes },
            ciphertext,
        })
    }

    /// Entschluesselt und verifiziert den Auth-Tag
    ///
    /// Bei jedem Fehler wird kein Klartext herausgegeben.
    pub fn decrypt(&self, nonce: &[u8], ciphertext: &[u8], aad: Option<&[u8]>) -> CryptoResult<Vec<u8>> {
        if nonce.len() != NONCE_LAENGE {
            return Err(CryptoError::UngueltigeNonce {
                erwartet: NONCE_LAENGE,
                erhalten: nonce.len(),
            });
        }
        if ciphertext.len() < TAG_LAENGE {
            return Err(CryptoError::Entschluesselung);
        }

        self.cipher
            .decrypt(
                AesNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: aad.unwrap_or_default(),
                },
            )
            .map_err(|_| CryptoError::Entschluesselung)
    }

    /// Entschluesselt einen kompletten Payload
    pub fn decrypt_payload(&self, payload: &EncryptedPayload, aad: Option<&[u8]>) -> CryptoResult<Vec<u8>> {
        self.decrypt(payload.nonce.as_bytes(), &payload.ciphertext, aad)
    }

    /// Verschluesselt und kodiert `nonce || ciphertext` als Standard-Base64
    pub fn encrypt_to_base64(&self, plaintext: &[u8], aad: Option<&[u8]>) -> CryptoResult<String> {
        let payload = self.encrypt(plaintext, aad)?;
        Ok(STANDARD.encode(payload.to_bytes()))
    }

    /// Gegenstueck zu [`encrypt_to_base64`](Self::encrypt_to_base64)
    pub fn decrypt_from_base64(&self, kodiert: &str, aad: Option<&[u8]>) -> CryptoResult<Vec<u8>> {
        let bytes = STANDARD.decode(kodiert)?;
        let payload = EncryptedPayload::from_bytes(&bytes).ok_or(CryptoError::Entschluesselung)?;
        self.decrypt_payload(&payload, aad)
    }
}

impl std::fmt::Debug for SymmetricChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricChannel")
            .field("fingerprint", &self.fingerprint)
            .field("verschluesselungen", &self.verschluesselungen())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kybervpn_core::{FehlerArt, Klassifiziert};
    use std::collections::HashSet;

    fn kanal() -> SymmetricChannel {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        SymmetricChannel::new(&key).unwrap()
    }

    #[test]
    fn falsche_schluessellaenge() {
        for laenge in [0, 16, 31, 33, 64] {
            let err = SymmetricChannel::new(&vec![0u8; laenge]).unwrap_err();
            assert_eq!(err.art(), FehlerArt::UngueltigerParameter);
        }
    }

    #[test]
    fn roundtrip_mit_und_ohne_aad() {
        let kanal = kanal();
        for klartext in [&b""[..], &b"x"[..], &b"Hallo VPN"[..], &[0xABu8; 4096][..]] {
            let p = kanal.encrypt(klartext, Some(b"kopf".as_slice())).unwrap();
            assert_eq!(p.ciphertext.len(), klartext.len() + TAG_LAENGE);
            let zurueck = kanal.decrypt(p.nonce.as_bytes(), &p.ciphertext, Some(b"kopf".as_slice())).unwrap();
            assert_eq!(zurueck, klartext);

            let p = kanal.encrypt(klartext, None).unwrap();
            assert_eq!(kanal.decrypt_payload(&p, None).unwrap(), klartext);
        }
    }

    #[test]
    fn bitflip_im_ciphertext_und_tag_wird_erkannt() {
        let kanal = kanal();
        let p = kanal.encrypt(b"geheime Nutzdaten", None).unwrap();

        for index in [0, p.ciphertext.len() / 2, p.ciphertext.len() - 1] {
            let mut manipuliert = p.ciphertext.clone();
            manipuliert[index] ^= 0x01;
            let err = kanal.decrypt(p.nonce.as_bytes(), &manipuliert, None).unwrap_err();
            assert!(matches!(err, CryptoError::Entschluesselung));
            assert_eq!(err.art(), FehlerArt::AuthentifizierungFehlgeschlagen);
        }
    }

    #[test]
    fn falsche_aad_wird_erkannt() {
        let kanal = kanal();
        let p = kanal.encrypt(b"daten", Some(b"a".as_slice())).unwrap();
        assert!(kanal.decrypt_payload(&p, Some(b"b".as_slice())).is_err());
        assert!(kanal.decrypt_payload(&p, None).is_err());
    }

    #[test]
    fn falscher_schluessel_scheitert() {
        let p = kanal().encrypt(b"daten", None).unwrap();
        assert!(kanal().decrypt_payload(&p, None).is_err());
    }

    #[test]
    fn zu_kurzer_ciphertext_und_falsche_nonce() {
        let kanal = kanal();
        assert!(matches!(
            kanal.decrypt(&[0u8; 12], &[0u8; 15], None),
            Err(CryptoError::Entschluesselung)
        ));
        assert!(matches!(
            kanal.decrypt(&[0u8; 8], &[0u8; 32], None),
            Err(CryptoError::UngueltigeNonce { erwartet: 12, erhalten: 8 })
        ));
    }

    #[test]
    fn nonces_wiederholen_sich_nicht() {
        let kanal = kanal();
        let mut gesehen = HashSet::new();
        for _ in 0..10_000 {
            let p = kanal.encrypt(b"x", None).unwrap();
            assert!(gesehen.insert(p.nonce.bytes), "Nonce doppelt vergeben");
        }
        assert_eq!(kanal.verschluesselungen(), 10_000);
    }

    #[test]
    fn nachrichtenlimit_wird_durchgesetzt() {
        let kanal = kanal();
        kanal
            .verschluesselungen
            .store(MAX_NACHRICHTEN_PRO_SCHLUESSEL, Ordering::SeqCst);
        let err = kanal.encrypt(b"zu viel", None).unwrap_err();
        assert!(matches!(err, CryptoError::NonceLimitErreicht { .. }));
    }

    #[test]
    fn base64_roundtrip() {
        let kanal = kanal();
        let kodiert = kanal.encrypt_to_base64(b"Hola", Some(b"id".as_slice())).unwrap();
        assert_eq!(kanal.decrypt_from_base64(&kodiert, Some(b"id".as_slice())).unwrap(), b"Hola");
        assert!(kanal.decrypt_from_base64("!!kein base64!!", None).is_err());
    }

    #[test]
    fn fingerprint_ist_deterministisch() {
        let a = SymmetricChannel::new(&[9u8; 32]).unwrap();
        let b = SymmetricChannel::new(&[9u8; 32]).unwrap();
        assert_eq!(a.key_fingerprint(), b.key_fingerprint());
        assert!(!format!("{a:?}").contains("cipher"));
    }
}
