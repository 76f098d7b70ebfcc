//! Session-Registry
//!
//! Zentrale Stelle fuer Benutzer, Sessions und Adressbindungen:
//! - Registrierung mit Argon2id-Hash (nie Klartext)
//! - Authentifizierung nur aus dem VPN-Subnetz
//! - Ausstellung und Pruefung signierter Tokens
//! - Abbildungen `session_id -> identitaet` und `vpn_ip -> identitaet`
//!
//! Alle Maps sind `DashMap`s, Mutationen sind damit pro Schluessel serialisiert.
//! Clone teilt den inneren Zustand.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kybervpn_core::{Identitaet, SessionId, VpnSubnetz};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{AuthError, AuthResult};
use crate::password::{passwort_hashen, passwort_verifizieren};
use crate::token::{TokenKonfig, TokenSigner};

/// Standard-Intervall des Cleanup-Tasks: 15 Minuten
pub const CLEANUP_INTERVALL: Duration = Duration::from_secs(15 * 60);

// ---------------------------------------------------------------------------
// Oeffentliche Typen
// ---------------------------------------------------------------------------

/// Wird synchron ueber Aenderungen der Registry benachrichtigt
///
/// Der Raum-Store nutzt `benutzer_registriert`, um neue Benutzer dem
/// Standardraum hinzuzufuegen. Der Raum-Dienst haengt ueber
/// `session_beendet` die Echtzeit-Verbindungen beendeter Sessions ab.
/// Aufrufe erfolgen ohne gehaltene Registry-Locks.
pub trait RegistrierungsBeobachter: Send + Sync {
    fn benutzer_registriert(&self, _identitaet: &Identitaet) {}

    /// Session wurde abgemeldet oder ist abgelaufen und entfernt
    fn session_beendet(&self, _session_id: &SessionId) {}
}

/// Oeffentliches Profil eines Benutzers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Benutzer {
    pub username: Identitaet,
    pub display_name: String,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub vpn_ip: Option<Ipv4Addr>,
}

/// Vorlage fuer vorab angelegte Benutzer (Konfiguration)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenutzerVorlage {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

/// Ergebnis einer erfolgreichen Authentifizierung
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub identitaet: Identitaet,
    pub ausgestellt_am: DateTime<Utc>,
    pub laeuft_ab_am: DateTime<Utc>,
    pub vpn_ip: Ipv4Addr,
    pub token: String,
}

/// Inhaber eines gueltigen Tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInhaber {
    pub identitaet: Identitaet,
    pub session_id: SessionId,
}

// ---------------------------------------------------------------------------
// Interne Eintraege
// ---------------------------------------------------------------------------

struct BenutzerEintrag {
    profil: Benutzer,
    passwort_hash: String,
}

#[derive(Debug, Clone)]
struct SessionEintrag {
    identitaet: Identitaet,
    vpn_ip: Ipv4Addr,
    laeuft_ab_am: DateTime<Utc>,
}

impl SessionEintrag {
    fn ist_gueltig(&self, jetzt: DateTime<Utc>) -> bool {
        jetzt < self.laeuft_ab_am
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    subnetz: VpnSubnetz,
    signer: TokenSigner,
    benutzer: DashMap<Identitaet, BenutzerEintrag>,
    sessions: DashMap<SessionId, SessionEintrag>,
    adressen: DashMap<Ipv4Addr, Identitaet>,
    beobachter: RwLock<Vec<Arc<dyn RegistrierungsBeobachter>>>,
}

impl SessionRegistry {
    pub fn neu(subnetz: VpnSubnetz, token: &TokenKonfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                subnetz,
                signer: TokenSigner::neu(token),
                benutzer: DashMap::new(),
                sessions: DashMap::new(),
                adressen: DashMap::new(),
                beobachter: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Registriert einen Beobachter fuer neue Benutzer und beendete Sessions
    pub fn beobachter_hinzufuegen(&self, beobachter: Arc<dyn RegistrierungsBeobachter>) {
        self.inner.beobachter.write().push(beobachter);
    }

    fn beobachter(&self) -> Vec<Arc<dyn RegistrierungsBeobachter>> {
        self.inner.beobachter.read().clone()
    }

    fn session_beendet_melden(&self, session_id: &SessionId) {
        for b in self.beobachter() {
            b.session_beendet(session_id);
        }
    }

    // -- Registrierung -------------------------------------------------------

    /// Legt einen neuen Benutzer an
    pub fn registrieren(
        &self,
        username: &str,
        passwort: &str,
        anzeigename: &str,
    ) -> AuthResult<Benutzer> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::UngueltigeEingabe("Benutzername darf nicht leer sein".into()));
        }
        if passwort.is_empty() {
            return Err(AuthError::UngueltigeEingabe("Passwort darf nicht leer sein".into()));
        }

        let identitaet = Identitaet::neu(username);
        if self.inner.benutzer.contains_key(&identitaet) {
            return Err(AuthError::BenutzernameVergeben(username.to_string()));
        }

        // Hashing ausserhalb des Shard-Locks
        let passwort_hash = passwort_hashen(passwort)?;
        let anzeigename = match anzeigename.trim() {
            "" => username.to_string(),
            name => name.to_string(),
        };

        let profil = match self.inner.benutzer.entry(identitaet.clone()) {
            Entry::Occupied(_) => return Err(AuthError::BenutzernameVergeben(username.to_string())),
            Entry::Vacant(frei) => {
                let profil = Benutzer {
                    username: identitaet.clone(),
                    display_name: anzeigename,
                    online: false,
                    last_seen: None,
                    vpn_ip: None,
                };
                frei.insert(BenutzerEintrag {
                    profil: profil.clone(),
                    passwort_hash,
                });
                profil
            }
        };

        tracing::info!(username = %identitaet, "Neuer Benutzer registriert");

        for b in self.beobachter() {
            b.benutzer_registriert(&identitaet);
        }

        Ok(profil)
    }

    /// Legt Benutzer aus der Konfiguration an; bereits vorhandene werden uebersprungen
    pub fn vorlagen_anlegen(&self, vorlagen: &[BenutzerVorlage]) -> AuthResult<usize> {
        let mut angelegt = 0;
        for v in vorlagen {
            match self.registrieren(&v.username, &v.password, &v.display_name) {
                Ok(_) => angelegt += 1,
                Err(AuthError::BenutzernameVergeben(name)) => {
                    tracing::debug!(username = %name, "Vorlage bereits registriert");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(angelegt)
    }

    // -- Authentifizierung ---------------------------------------------------

    /// Prueft Adresse, Benutzer und Passwort (in dieser Reihenfolge) und
    /// stellt eine Session mit signiertem Token aus
    pub fn authentifizieren(
        &self,
        username: &str,
        passwort: &str,
        behauptete_adresse: &str,
    ) -> AuthResult<Session> {
        let vpn_ip = self.adresse_pruefen(behauptete_adresse)?;

        let identitaet = Identitaet::neu(username.trim());
        let passwort_hash = self
            .inner
            .benutzer
            .get(&identitaet)
            .map(|e| e.passwort_hash.clone())
            .ok_or_else(|| AuthError::BenutzerNichtGefunden(identitaet.to_string()))?;

        if !passwort_verifizieren(passwort, &passwort_hash)? {
            tracing::warn!(username = %identitaet, vpn_ip = %vpn_ip, "Fehlgeschlagener Login-Versuch");
            return Err(AuthError::UngueltigeAnmeldedaten);
        }

        let session_id = SessionId::new();
        let jetzt = Utc::now();
        let laeuft_ab_am = self.inner.signer.ablauf(jetzt)?;
        let (token, _) = self.inner.signer.ausstellen(
            identitaet.als_str(),
            &session_id.to_string(),
            &vpn_ip.to_string(),
            jetzt,
        )?;

        self.inner.sessions.insert(
            session_id,
            SessionEintrag {
                identitaet: identitaet.clone(),
                vpn_ip,
                laeuft_ab_am,
            },
        );
        // Letzte Bindung gewinnt
        self.inner.adressen.insert(vpn_ip, identitaet.clone());

        if let Some(mut eintrag) = self.inner.benutzer.get_mut(&identitaet) {
            eintrag.profil.online = true;
            eintrag.profil.last_seen = Some(jetzt);
            eintrag.profil.vpn_ip = Some(vpn_ip);
        }

        tracing::info!(
            username = %identitaet,
            session_id = %session_id,
            vpn_ip = %vpn_ip,
            "Benutzer authentifiziert"
        );

        Ok(Session {
            session_id,
            identitaet,
            ausgestellt_am: jetzt,
            laeuft_ab_am,
            vpn_ip,
            token,
        })
    }

    fn adresse_pruefen(&self, adresse: &str) -> AuthResult<Ipv4Addr> {
        let ip: IpAddr = adresse
            .trim()
            .parse()
            .map_err(|_| AuthError::UngueltigeAdresse(adresse.to_string()))?;

        match ip {
            IpAddr::V4(v4) if self.inner.subnetz.enthaelt(v4) => Ok(v4),
            _ => {
                tracing::warn!(adresse = %ip, subnetz = %self.inner.subnetz, "Login ausserhalb des VPN abgelehnt");
                Err(AuthError::NichtImVpn(ip.to_string()))
            }
        }
    }

    /// Prueft ein Token gegen Signatur, Ablauf und die lebende Session
    ///
    /// Jede Ablehnung ist [`AuthError::TokenUngueltig`].
    pub fn token_pruefen(&self, token: &str) -> AuthResult<TokenInhaber> {
        let claims = self.inner.signer.pruefen(token)?;
        let session_id: SessionId = claims.session_id.parse().map_err(|_| AuthError::TokenUngueltig)?;

        let eintrag = self
            .inner
            .sessions
            .get(&session_id)
            .map(|e| e.clone())
            .ok_or(AuthError::TokenUngueltig)?;

        let passt = eintrag.ist_gueltig(Utc::now())
            && eintrag.identitaet.als_str() == claims.sub
            && eintrag.vpn_ip.to_string() == claims.vpn_ip;
        if !passt {
            tracing::debug!(session_id = %session_id, "Token passt nicht zur Session");
            return Err(AuthError::TokenUngueltig);
        }

        Ok(TokenInhaber {
            identitaet: eintrag.identitaet,
            session_id,
        })
    }

    /// Beendet eine Session
    pub fn abmelden(&self, session_id: &SessionId) -> AuthResult<()> {
        let (_, eintrag) = self
            .inner
            .sessions
            .remove(session_id)
            .ok_or_else(|| AuthError::SessionNichtGefunden(session_id.to_string()))?;

        self.adresse_freigeben_falls_ungenutzt(eintrag.vpn_ip);
        tracing::info!(username = %eintrag.identitaet, session_id = %session_id, "Session beendet");
        self.session_beendet_melden(session_id);
        Ok(())
    }

    fn adresse_freigeben_falls_ungenutzt(&self, vpn_ip: Ipv4Addr) {
        let jetzt = Utc::now();
        let genutzt = self
            .inner
            .sessions
            .iter()
            .any(|s| s.vpn_ip == vpn_ip && s.ist_gueltig(jetzt));
        if !genutzt {
            self.inner.adressen.remove(&vpn_ip);
        }
    }

    // -- Abfragen ------------------------------------------------------------

    /// Identitaet einer lebenden Session
    pub fn identitaet_fuer_session(&self, session_id: &SessionId) -> Option<Identitaet> {
        let jetzt = Utc::now();
        self.inner
            .sessions
            .get(session_id)
            .filter(|e| e.ist_gueltig(jetzt))
            .map(|e| e.identitaet.clone())
    }

    pub fn identitaet_fuer_adresse(&self, adresse: Ipv4Addr) -> Option<Identitaet> {
        self.inner.adressen.get(&adresse).map(|e| e.clone())
    }

    pub fn benutzer(&self, identitaet: &Identitaet) -> Option<Benutzer> {
        self.inner.benutzer.get(identitaet).map(|e| e.profil.clone())
    }

    pub fn ist_registriert(&self, identitaet: &Identitaet) -> bool {
        self.inner.benutzer.contains_key(identitaet)
    }

    /// Alle registrierten Identitaeten, sortiert
    pub fn identitaeten(&self) -> Vec<Identitaet> {
        let mut alle: Vec<_> = self.inner.benutzer.iter().map(|e| e.key().clone()).collect();
        alle.sort();
        alle
    }

    pub fn anzahl_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    // -- Praesenz ------------------------------------------------------------

    /// Setzt den Online-Status (Transport-Verbindung auf/zu)
    pub fn online_setzen(&self, identitaet: &Identitaet, online: bool) {
        if let Some(mut eintrag) = self.inner.benutzer.get_mut(identitaet) {
            eintrag.profil.online = online;
            eintrag.profil.last_seen = Some(Utc::now());
            tracing::debug!(username = %identitaet, online, "Praesenz geaendert");
        }
    }

    // -- Aufraeumen ----------------------------------------------------------

    /// Entfernt abgelaufene Sessions und verwaiste Adressbindungen
    ///
    /// Beobachter werden pro entfernter Session benachrichtigt.
    pub fn abgelaufene_entfernen(&self) -> usize {
        let jetzt = Utc::now();
        let abgelaufen: Vec<SessionId> = self
            .inner
            .sessions
            .iter()
            .filter(|s| !s.ist_gueltig(jetzt))
            .map(|s| *s.key())
            .collect();

        let entfernt: Vec<SessionId> = abgelaufen
            .into_iter()
            .filter(|id| {
                self.inner
                    .sessions
                    .remove_if(id, |_, s| !s.ist_gueltig(jetzt))
                    .is_some()
            })
            .collect();

        let inner = &self.inner;
        inner
            .adressen
            .retain(|ip, _| inner.sessions.iter().any(|s| s.vpn_ip == *ip));

        for session_id in &entfernt {
            self.session_beendet_melden(session_id);
        }
        if !entfernt.is_empty() {
            tracing::debug!(anzahl = entfernt.len(), "Abgelaufene Sessions bereinigt");
        }
        entfernt.len()
    }

    /// Startet den periodischen Cleanup
    ///
    /// Der Task haelt nur eine schwache Referenz und endet, sobald die
    /// Registry verworfen wurde.
    pub fn cleanup_starten(&self, intervall: Duration) -> JoinHandle<()> {
        let schwach: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(intervall);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = schwach.upgrade() else {
                    break;
                };
                SessionRegistry { inner }.abgelaufene_entfernen();
            }
            tracing::debug!("Session-Cleanup beendet");
        })
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("subnetz", &self.inner.subnetz)
            .field("benutzer", &self.inner.benutzer.len())
            .field("sessions", &self.inner.sessions.len())
            .finish_non_exhaustive()
    }
}
