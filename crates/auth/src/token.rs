//! Signierte, zeitlich begrenzte Session-Tokens (JWT)
//!
//! Claims: `sub` (Identitaet), `session_id`, `vpn_ip`, `iat`, `exp`.
//! Jede Ablehnung (Signatur, Ablauf, Format) endet in
//! [`AuthError::TokenUngueltig`]; die Ursache wird nur geloggt.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Standard-Lebensdauer eines Tokens: 8 Tage
pub const STANDARD_TOKEN_MINUTEN: i64 = 60 * 24 * 8;

/// Obergrenze der Token-Lebensdauer: ein Jahr
pub const MAX_TOKEN_MINUTEN: i64 = 60 * 24 * 365;

/// Unterstuetzte Signatur-Algorithmen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenAlgorithmus {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl From<TokenAlgorithmus> for Algorithm {
    fn from(a: TokenAlgorithmus) -> Self {
        match a {
            TokenAlgorithmus::HS256 => Algorithm::HS256,
            TokenAlgorithmus::HS384 => Algorithm::HS384,
            TokenAlgorithmus::HS512 => Algorithm::HS512,
        }
    }
}

/// Konfiguration der Token-Ausstellung
#[derive(Debug, Clone)]
pub struct TokenKonfig {
    pub secret: String,
    pub algorithmus: TokenAlgorithmus,
    pub lebensdauer: Duration,
}

impl TokenKonfig {
    pub fn neu(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithmus: TokenAlgorithmus::default(),
            lebensdauer: Duration::minutes(STANDARD_TOKEN_MINUTEN),
        }
    }
}

/// Inhalt eines Tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub session_id: String,
    pub vpn_ip: String,
    pub iat: i64,
    pub exp: i64,
}

/// Stellt Tokens aus und prueft sie
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithmus: Algorithm,
    lebensdauer: Duration,
}

impl TokenSigner {
    pub fn neu(konfig: &TokenKonfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(konfig.secret.as_bytes()),
            decoding: DecodingKey::from_secret(konfig.secret.as_bytes()),
            algorithmus: konfig.algorithmus.into(),
            lebensdauer: konfig.lebensdauer,
        }
    }

    pub fn lebensdauer(&self) -> Duration {
        self.lebensdauer
    }

    /// Ablaufzeitpunkt fuer ein jetzt ausgestelltes Token
    ///
    /// Eine Lebensdauer jenseits des darstellbaren Zeitraums ist ein
    /// Konfigurationsfehler, kein Panic.
    pub fn ablauf(&self, jetzt: DateTime<Utc>) -> AuthResult<DateTime<Utc>> {
        jetzt.checked_add_signed(self.lebensdauer).ok_or_else(|| {
            AuthError::UngueltigeEingabe(format!(
                "Token-Lebensdauer von {} Minuten nicht darstellbar",
                self.lebensdauer.num_minutes()
            ))
        })
    }

    /// Signiert neue Claims; `iat` und `exp` werden aus `jetzt` berechnet
    pub fn ausstellen(
        &self,
        identitaet: &str,
        session_id: &str,
        vpn_ip: &str,
        jetzt: DateTime<Utc>,
    ) -> AuthResult<(String, TokenClaims)> {
        let claims = TokenClaims {
            sub: identitaet.to_string(),
            session_id: session_id.to_string(),
            vpn_ip: vpn_ip.to_string(),
            iat: jetzt.timestamp(),
            exp: self.ablauf(jetzt)?.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(self.algorithmus), &claims, &self.encoding)
            .map_err(|e| AuthError::intern(format!("Token-Signatur fehlgeschlagen: {e}")))?;
        Ok((token, claims))
    }

    /// Prueft Signatur, Algorithmus und Ablauf
    pub fn pruefen(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(self.algorithmus);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|daten| daten.claims)
            .map_err(|e| {
                tracing::debug!(grund = %e, "Token abgelehnt");
                AuthError::TokenUngueltig
            })
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithmus", &self.algorithmus)
            .field("lebensdauer", &self.lebensdauer)
            .finish_non_exhaustive()
    }
}
