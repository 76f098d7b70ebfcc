//! Kyber-VPN Server – Einstiegspunkt
//!
//! Startreihenfolge:
//! 1. Konfiguration laden und Logging aufsetzen
//! 2. Kern-Dienste bauen (Tunnel, Session-Registry, Raeume)
//! 3. Session-Cleanup starten
//! 4. API bedienen bis Ctrl-C, danach Cleanup stoppen

use anyhow::{Context, Result};
use kybervpn_server::config::{LoggingEinstellungen, ServerConfig};
use kybervpn_server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var("KYBERVPN_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = ServerConfig::laden(&config_pfad)?;
    logging_initialisieren(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Kyber-VPN Server startet"
    );
    if config.secret_ist_unsicher() {
        tracing::warn!("Standard-Token-Secret aktiv, fuer den Betrieb `sicherheit.token_secret` setzen");
    }

    let server = Server::neu(config);
    let state = server.dienste_bauen()?;

    tracing::info!(
        subnetz = %server.config.vpn.subnetz,
        server_ip = %server.config.vpn.server_ip,
        kem_stufe = server.config.vpn.kem_stufe,
        "VPN-Subnetz konfiguriert"
    );
    for eintrag in state.tunnel.katalog().alle() {
        tracing::info!(
            server_id = %eintrag.id,
            name = %eintrag.name,
            standort = %eintrag.standort,
            endpunkt = %format!("{}:{}", eintrag.ip, eintrag.port),
            "Server im Katalog"
        );
    }

    let intervall = server.config.cleanup_intervall();
    let cleanup = state.sessions.cleanup_starten(intervall);
    tracing::debug!(intervall_s = intervall.as_secs(), "Session-Cleanup gestartet");

    let ergebnis = server.bedienen(state).await;
    cleanup.abort();
    ergebnis
}

/// Setzt tracing-subscriber auf; `RUST_LOG` hat Vorrang vor der Konfiguration
fn logging_initialisieren(logging: &LoggingEinstellungen) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Ungueltiges Log-Level '{}'", logging.level))?,
    };

    let ergebnis = match logging.format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .try_init(),
        _ => fmt().compact().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow::anyhow!("Logging nicht initialisierbar: {e}"))
}
