//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Laenge eines KEM-Shared-Secrets (alle Stufen)
pub const SHARED_SECRET_LAENGE: usize = 32;

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 32-Byte Shared Secret aus der Key Encapsulation
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_LAENGE]);

impl SharedSecret {
    pub fn new(bytes: [u8; SHARED_SECRET_LAENGE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_LAENGE] {
        &self.0
    }
}

impl PartialEq for SharedSecret {
    /// Vergleich ohne fruehen Abbruch
    fn eq(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for SharedSecret {}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Eine kryptografische Nonce (Number used once)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce {
    pub bytes: [u8; 12],
}

impl Nonce {
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.bytes
    }
}

/// Verschluesselter Payload (Nonce + Ciphertext + Auth-Tag)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// 12 Bytes Nonce
    pub nonce: Nonce,
    /// Verschluesselter Inhalt inkl. 16 Bytes Auth-Tag (angehaengt)
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Serialisiert zu Bytes: [nonce(12)] + [ciphertext]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.ciphertext.len());
        out.extend_from_slice(&self.nonce.bytes);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Deserialisiert aus Bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 12 {
            return None;
        }
        let mut nonce_bytes = [0u8; 12];
        nonce_bytes.copy_from_slice(&bytes[0..12]);

        Some(Self {
            nonce: Nonce { bytes: nonce_bytes },
            ciphertext: bytes[12..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_ist_geschwaerzt() {
        let s = SecretBytes::new(vec![1, 2, 3]);
        let debug = format!("{s:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("1, 2, 3"));
        assert_eq!(format!("{:?}", SharedSecret::new([7; 32])), "SharedSecret([REDACTED])");
    }

    #[test]
    fn shared_secret_vergleich() {
        let a = SharedSecret::new([1; 32]);
        let mut andere = [1; 32];
        andere[31] = 2;
        assert_eq!(a, SharedSecret::new([1; 32]));
        assert_ne!(a, SharedSecret::new(andere));
    }

    #[test]
    fn payload_zu_kurz() {
        assert!(EncryptedPayload::from_bytes(&[0u8; 11]).is_none());
        let leer = EncryptedPayload::from_bytes(&[0u8; 12]).unwrap();
        assert!(leer.ciphertext.is_empty());
    }
}
