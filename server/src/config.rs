//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::Context;
use kybervpn_auth::{
    BenutzerVorlage, TokenAlgorithmus, TokenKonfig, CLEANUP_INTERVALL, MAX_TOKEN_MINUTEN,
    STANDARD_TOKEN_MINUTEN,
};
use kybervpn_core::VpnSubnetz;
use kybervpn_crypto::SicherheitsStufe;
use kybervpn_tunnel::{standard_server, ServerEintrag, TELEMETRIE_INTERVALL};
use serde::{Deserialize, Serialize};

/// Secret der Standardkonfiguration; nur fuer lokale Entwicklung
pub const UNSICHERES_SECRET: &str = "kybervpn-entwicklung-bitte-aendern";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen (REST + WebSocket)
    pub netzwerk: NetzwerkEinstellungen,
    /// VPN-Subnetz, KEM-Stufe und Server-Katalog
    pub vpn: VpnEinstellungen,
    /// Token-Signatur
    pub sicherheit: SicherheitsEinstellungen,
    /// Chat-Einstellungen
    pub chat: ChatEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Kyber-VPN Server".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port fuer REST-API und WebSocket
    pub api_port: u16,
    /// Erlaubte CORS-Origins (leer = alle erlaubt, nur fuer Entwicklung)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            api_port: 8000,
            cors_origins: vec![],
        }
    }
}

/// VPN-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnEinstellungen {
    /// Subnetz in CIDR-Notation
    pub subnetz: String,
    /// Adresse des VPN-Servers im Subnetz (wird nie an Clients vergeben)
    pub server_ip: String,
    /// NIST-Stufe des KEM: 1, 3 oder 5
    pub kem_stufe: u8,
    /// Tick der Verbindungs-Telemetrie in Millisekunden
    pub telemetrie_ms: u64,
    /// Server-Katalog
    pub server: Vec<ServerEintrag>,
}

impl Default for VpnEinstellungen {
    fn default() -> Self {
        Self {
            subnetz: "10.8.0.0/24".into(),
            server_ip: "10.8.0.1".into(),
            kem_stufe: 3,
            telemetrie_ms: TELEMETRIE_INTERVALL.as_millis() as u64,
            server: standard_server(),
        }
    }
}

/// Token-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SicherheitsEinstellungen {
    pub token_secret: String,
    pub algorithmus: TokenAlgorithmus,
    /// Lebensdauer eines Tokens in Minuten (Standard: 8 Tage)
    pub token_minuten: i64,
}

impl Default for SicherheitsEinstellungen {
    fn default() -> Self {
        Self {
            token_secret: UNSICHERES_SECRET.into(),
            algorithmus: TokenAlgorithmus::HS256,
            token_minuten: STANDARD_TOKEN_MINUTEN,
        }
    }
}

/// Chat-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatEinstellungen {
    /// Beim Start angelegte Benutzer
    pub demo_benutzer: Vec<BenutzerVorlage>,
    /// Intervall des Session-Cleanups in Minuten
    pub cleanup_minuten: u64,
}

impl Default for ChatEinstellungen {
    fn default() -> Self {
        Self {
            demo_benutzer: vec![
                BenutzerVorlage {
                    username: "usuario1".into(),
                    password: "password1".into(),
                    display_name: "Usuario Uno".into(),
                },
                BenutzerVorlage {
                    username: "usuario2".into(),
                    password: "password2".into(),
                    display_name: "Usuario Dos".into(),
                },
            ],
            cleanup_minuten: CLEANUP_INTERVALL.as_secs() / 60,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die Bind-Adresse fuer REST und WebSocket zurueck
    pub fn api_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.api_port)
    }

    pub fn vpn_subnetz(&self) -> anyhow::Result<VpnSubnetz> {
        self.vpn
            .subnetz
            .parse()
            .with_context(|| format!("Ungueltiges VPN-Subnetz '{}'", self.vpn.subnetz))
    }

    /// Server-Adresse; muss im Subnetz liegen
    pub fn vpn_server_ip(&self) -> anyhow::Result<Ipv4Addr> {
        let ip: Ipv4Addr = self
            .vpn
            .server_ip
            .parse()
            .with_context(|| format!("Ungueltige Server-IP '{}'", self.vpn.server_ip))?;
        let subnetz = self.vpn_subnetz()?;
        anyhow::ensure!(
            subnetz.enthaelt(ip),
            "Server-IP {ip} liegt nicht im Subnetz {subnetz}"
        );
        Ok(ip)
    }

    pub fn kem_stufe(&self) -> anyhow::Result<SicherheitsStufe> {
        SicherheitsStufe::try_from(self.vpn.kem_stufe)
            .with_context(|| format!("Ungueltige KEM-Stufe {}", self.vpn.kem_stufe))
    }

    pub fn telemetrie_intervall(&self) -> Duration {
        Duration::from_millis(self.vpn.telemetrie_ms.max(1))
    }

    pub fn cleanup_intervall(&self) -> Duration {
        Duration::from_secs(self.chat.cleanup_minuten.max(1) * 60)
    }

    pub fn token_konfig(&self) -> anyhow::Result<TokenKonfig> {
        anyhow::ensure!(
            !self.sicherheit.token_secret.is_empty(),
            "token_secret darf nicht leer sein"
        );
        anyhow::ensure!(
            (1..=MAX_TOKEN_MINUTEN).contains(&self.sicherheit.token_minuten),
            "token_minuten muss zwischen 1 und {MAX_TOKEN_MINUTEN} liegen"
        );
        Ok(TokenKonfig {
            secret: self.sicherheit.token_secret.clone(),
            algorithmus: self.sicherheit.algorithmus,
            lebensdauer: chrono::Duration::minutes(self.sicherheit.token_minuten),
        })
    }

    /// true wenn noch das Entwicklungs-Secret verwendet wird
    pub fn secret_ist_unsicher(&self) -> bool {
        self.sicherheit.token_secret == UNSICHERES_SECRET
    }
}
