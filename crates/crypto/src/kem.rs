//! Key Encapsulation (ML-KEM, FIPS 203)
//!
//! Die Sicherheitsstufen 1/3/5 entsprechen ML-KEM-512/768/1024. Die
//! Groessentabelle aus [`get_algorithm_details`] ist die Referenz fuer die
//! Wire-Kompatibilitaet und muss mit den tatsaechlich erzeugten Laengen
//! uebereinstimmen.
//!
//! Bei falschem Schluessel liefert ML-KEM durch implizite Zurueckweisung ein
//! pseudozufaelliges Secret, das vom korrekten Secret unabhaengig ist.

use libcrux_ml_kem::{mlkem1024, mlkem512, mlkem768};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;

use crate::error::{CryptoError, CryptoResult};
use crate::types::{SecretBytes, SharedSecret, SHARED_SECRET_LAENGE};

// ---------------------------------------------------------------------------
// Sicherheitsstufen
// ---------------------------------------------------------------------------

/// NIST-Sicherheitsstufe des KEM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum SicherheitsStufe {
    Stufe1,
    #[default]
    Stufe3,
    Stufe5,
}

impl SicherheitsStufe {
    pub fn als_zahl(&self) -> u8 {
        match self {
            Self::Stufe1 => 1,
            Self::Stufe3 => 3,
            Self::Stufe5 => 5,
        }
    }
}

impl TryFrom<u8> for SicherheitsStufe {
    type Error = CryptoError;

    fn try_from(stufe: u8) -> Result<Self, Self::Error> {
        match stufe {
            1 => Ok(Self::Stufe1),
            3 => Ok(Self::Stufe3),
            5 => Ok(Self::Stufe5),
            andere => Err(CryptoError::UngueltigeStufe(andere)),
        }
    }
}

/// Statische Groessentabelle eines Parametersatzes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlgorithmusDetails {
    pub name: &'static str,
    pub stufe: u8,
    pub public_key_laenge: usize,
    pub secret_key_laenge: usize,
    pub ciphertext_laenge: usize,
    pub shared_secret_laenge: usize,
    pub ist_kem: bool,
}

/// Liefert die veroeffentlichten Byte-Laengen fuer eine Stufe
pub fn get_algorithm_details(stufe: SicherheitsStufe) -> AlgorithmusDetails {
    let (name, pk, sk, ct) = match stufe {
        SicherheitsStufe::Stufe1 => ("ML-KEM-512", 800, 1632, 768),
        SicherheitsStufe::Stufe3 => ("ML-KEM-768", 1184, 2400, 1088),
        SicherheitsStufe::Stufe5 => ("ML-KEM-1024", 1568, 3168, 1568),
    };
    AlgorithmusDetails {
        name,
        stufe: stufe.als_zahl(),
        public_key_laenge: pk,
        secret_key_laenge: sk,
        ciphertext_laenge: ct,
        shared_secret_laenge: SHARED_SECRET_LAENGE,
        ist_kem: true,
    }
}

// ---------------------------------------------------------------------------
// Schluessel-Typen
// ---------------------------------------------------------------------------

/// KEM-Schluesselpaar. Der private Teil wird beim Drop genullt.
pub struct KeyPair {
    pub stufe: SicherheitsStufe,
    pub public_key: Vec<u8>,
    secret_key: SecretBytes,
}

impl KeyPair {
    pub fn secret_key(&self) -> &[u8] {
        self.secret_key.as_bytes()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("stufe", &self.stufe)
            .field("public_key_laenge", &self.public_key.len())
            .field("secret_key", &self.secret_key)
            .finish()
    }
}

/// Ergebnis der Encapsulation: nur waehrend des Handshakes am Leben
#[derive(Debug)]
pub struct EncapsulatedSecret {
    pub shared_secret: SharedSecret,
    pub ciphertext: Vec<u8>,
}

// ---------------------------------------------------------------------------
// KemManager
// ---------------------------------------------------------------------------

/// Erzeugt Schluesselpaare und fuehrt Encapsulation/Decapsulation
/// fuer genau eine Sicherheitsstufe durch
#[derive(Debug, Clone, Copy)]
pub struct KemManager {
    stufe: SicherheitsStufe,
}

impl KemManager {
    pub fn neu(stufe: SicherheitsStufe) -> Self {
        Self { stufe }
    }

    pub fn stufe(&self) -> SicherheitsStufe {
        self.stufe
    }

    pub fn details(&self) -> AlgorithmusDetails {
        get_algorithm_details(self.stufe)
    }

    /// Erzeugt ein frisches Schluesselpaar aus dem OS-CSPRNG
    pub fn generate_keypair(&self) -> KeyPair {
        let seed = zufall::<64>();
        let (public_key, secret_key) = match self.stufe {
            SicherheitsStufe::Stufe1 => {
                let paar = mlkem512::generate_key_pair(seed);
                (
                    paar.public_key().as_slice().to_vec(),
                    paar.private_key().as_slice().to_vec(),
                )
            }
            SicherheitsStufe::Stufe3 => {
                let paar = mlkem768::generate_key_pair(seed);
                (
                    paar.public_key().as_slice().to_vec(),
                    paar.private_key().as_slice().to_vec(),
                )
            }
            SicherheitsStufe::Stufe5 => {
                let paar = mlkem1024::generate_key_pair(seed);
                (
                    paar.public_key().as_slice().to_vec(),
                    paar.private_key().as_slice().to_vec(),
                )
            }
        };

        KeyPair {
            stufe: self.stufe,
            public_key,
            secret_key: SecretBytes::new(secret_key),
        }
    }

    /// Kapselt ein frisches Secret unter dem Public Key der Gegenseite
    pub fn encapsulate(&self, peer_public_key: &[u8]) -> CryptoResult<EncapsulatedSecret> {
        let details = self.details();
        if peer_public_key.len() != details.public_key_laenge {
            return Err(CryptoError::UngueltigeSchluesselLaenge {
                erwartet: details.public_key_laenge,
                erhalten: peer_public_key.len(),
            });
        }

        let laenge_falsch = |_| CryptoError::UngueltigeSchluesselLaenge {
            erwartet: details.public_key_laenge,
            erhalten: peer_public_key.len(),
        };
        let randomness = zufall::<SHARED_SECRET_LAENGE>();

        let (ciphertext, secret) = match self.stufe {
            SicherheitsStufe::Stufe1 => {
                let pk = mlkem512::MlKem512PublicKey::try_from(peer_public_key)
                    .map_err(laenge_falsch)?;
                let (ct, ss) = mlkem512::encapsulate(&pk, randomness);
                (ct.as_slice().to_vec(), ss)
            }
            SicherheitsStufe::Stufe3 => {
                let pk = mlkem768::MlKem768PublicKey::try_from(peer_public_key)
                    .map_err(laenge_falsch)?;
                let (ct, ss) = mlkem768::encapsulate(&pk, randomness);
                (ct.as_slice().to_vec(), ss)
            }
            SicherheitsStufe::Stufe5 => {
                let pk = mlkem1024::MlKem1024PublicKey::try_from(peer_public_key)
                    .map_err(laenge_falsch)?;
                let (ct, ss) = mlkem1024::encapsulate(&pk, randomness);
                (ct.as_slice().to_vec(), ss)
            }
        };

        Ok(EncapsulatedSecret {
            shared_secret: SharedSecret::new(secret),
            ciphertext,
        })
    }

    /// Gewinnt das Shared Secret aus Ciphertext und eigenem Secret Key zurueck
    ///
    /// Ein Ciphertext falscher Laenge gilt als fehlerhafter Handshake.
    pub fn decapsulate(&self, ciphertext: &[u8], secret_key: &[u8]) -> CryptoResult<SharedSecret> {
        let details = self.details();
        if secret_key.len() != details.secret_key_laenge {
            return Err(CryptoError::UngueltigeSchluesselLaenge {
                erwartet: details.secret_key_laenge,
                erhalten: secret_key.len(),
            });
        }
        if ciphertext.len() != details.ciphertext_laenge {
            return Err(CryptoError::UngueltigerCiphertext {
                erwartet: details.ciphertext_laenge,
                erhalten: ciphertext.len(),
            });
        }

        let ct_falsch = |_| CryptoError::UngueltigerCiphertext {
            erwartet: details.ciphertext_laenge,
            erhalten: ciphertext.len(),
        };
        let sk_falsch = |_| CryptoError::UngueltigeSchluesselLaenge {
            erwartet: details.secret_key_laenge,
            erhalten: secret_key.len(),
        };

        let secret = match self.stufe {
            SicherheitsStufe::Stufe1 => {
                let sk = mlkem512::MlKem512PrivateKey::try_from(secret_key).map_err(sk_falsch)?;
                let ct = mlkem512::MlKem512Ciphertext::try_from(ciphertext).map_err(ct_falsch)?;
                mlkem512::decapsulate(&sk, &ct)
            }
            SicherheitsStufe::Stufe3 => {
                let sk = mlkem768::MlKem768PrivateKey::try_from(secret_key).map_err(sk_falsch)?;
                let ct = mlkem768::MlKem768Ciphertext::try_from(ciphertext).map_err(ct_falsch)?;
                mlkem768::decapsulate(&sk, &ct)
            }
            SicherheitsStufe::Stufe5 => {
                let sk = mlkem1024::MlKem1024PrivateKey::try_from(secret_key).map_err(sk_falsch)?;
                let ct = mlkem1024::MlKem1024Ciphertext::try_from(ciphertext).map_err(ct_falsch)?;
                mlkem1024::decapsulate(&sk, &ct)
            }
        };

        Ok(SharedSecret::new(secret))
    }
}

impl Default for KemManager {
    fn default() -> Self {
        Self::neu(SicherheitsStufe::default())
    }
}

fn zufall<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
