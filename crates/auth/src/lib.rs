//! kybervpn-auth – Session-Registry
//!
//! Dieses Crate implementiert:
//! - Passwort-Hashing mit Argon2id
//! - Signierte, zeitlich begrenzte Tokens (JWT, HMAC-SHA2)
//! - SessionRegistry: Registrierung, Authentifizierung nur aus dem VPN,
//!   Token-Pruefung, Abbildungen Session/Adresse -> Identitaet, Praesenz
//! - Beobachter-Schnittstelle fuer neue Benutzer und beendete Sessions

pub mod error;
pub mod password;
pub mod registry;
pub mod token;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult};
pub use password::{passwort_hashen, passwort_verifizieren};
pub use registry::{
    Benutzer, BenutzerVorlage, RegistrierungsBeobachter, Session, SessionRegistry, TokenInhaber,
    CLEANUP_INTERVALL,
};
pub use token::{
    TokenAlgorithmus, TokenClaims, TokenKonfig, TokenSigner, MAX_TOKEN_MINUTEN, STANDARD_TOKEN_MINUTEN,
};
