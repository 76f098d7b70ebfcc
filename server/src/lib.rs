//! kybervpn-server – Bibliotheks-Root
//!
//! Baut die Kern-Dienste aus der Konfiguration zusammen und stellt sie ueber
//! REST und WebSocket bereit. Oeffentlich fuer Integrationstests.

pub mod config;
pub mod rest;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::ServerConfig;
use kybervpn_auth::SessionRegistry;
use kybervpn_chat::RaumDienst;
use kybervpn_crypto::KemManager;
use kybervpn_tunnel::{AdressPool, ServerKatalog, TunnelKonfig, VerbindungsManager};
use rest::{api_router, AppState};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Erstellt Tunnel-Manager, Session-Registry und Raum-Dienst
    ///
    /// Demo-Benutzer aus der Konfiguration werden sofort angelegt.
    pub fn dienste_bauen(&self) -> Result<AppState> {
        let subnetz = self.config.vpn_subnetz()?;
        let server_ip = self.config.vpn_server_ip()?;
        let kem_stufe = self.config.kem_stufe()?;

        let tunnel = VerbindungsManager::neu(TunnelKonfig {
            katalog: ServerKatalog::neu(self.config.vpn.server.clone()),
            kem: KemManager::neu(kem_stufe),
            adressen: Arc::new(AdressPool::neu(subnetz, server_ip)),
            telemetrie_intervall: self.config.telemetrie_intervall(),
        });

        let sessions = SessionRegistry::neu(subnetz, &self.config.token_konfig()?);
        let chat = RaumDienst::neu(sessions.clone(), KemManager::neu(kem_stufe));

        let angelegt = sessions
            .vorlagen_anlegen(&self.config.chat.demo_benutzer)
            .context("Demo-Benutzer konnten nicht angelegt werden")?;
        if angelegt > 0 {
            tracing::info!(anzahl = angelegt, "Demo-Benutzer angelegt");
        }

        Ok(AppState {
            tunnel,
            sessions,
            chat,
            kem_stufe,
        })
    }

    /// Bedient REST und WebSocket bis zum Shutdown-Signal
    ///
    /// Nach Ctrl-C wird ein aktiver Tunnel abgebaut, bevor die Funktion
    /// zurueckkehrt.
    pub async fn bedienen(&self, state: AppState) -> Result<()> {
        let app = api_router(state.clone(), &self.config.netzwerk.cors_origins);
        let adresse = self.config.api_bind_adresse();
        let listener = tokio::net::TcpListener::bind(&adresse)
            .await
            .with_context(|| format!("Bind auf {adresse} fehlgeschlagen"))?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            "API bereit. Warte auf Shutdown-Signal (Ctrl-C)..."
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar");
                }
            })
            .await?;

        tracing::info!("Shutdown-Signal empfangen, Tunnel wird abgebaut");
        if let Err(e) = state.tunnel.disconnect().await {
            tracing::warn!(fehler = %e, "Tunnel konnte nicht sauber getrennt werden");
        }
        Ok(())
    }
}
