//! RaumDienst – Raeume, Nachrichten und Echtzeit-Verteilung
//!
//! ## Ablauf eines eingehenden `message`-Frames
//! 1. Session -> Identitaet ueber die Session-Registry
//! 2. Raum muss existieren, Identitaet muss Teilnehmer sein
//! 3. Nachricht wird gespeichert (bei Direktraeumen versiegelt)
//! 4. Absender bekommt `message_sent`, alle verbundenen Teilnehmer `new_message`
//!
//! Zustellfehler an eine Senke betreffen nur diese Senke. Verbindungen
//! abgemeldeter oder abgelaufener Sessions werden abgehaengt und nie mehr
//! beliefert; mit der letzten Referenz auf ihre Senke schliesst der Transport.
//!
//! Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use chrono::Utc;
use dashmap::DashMap;
use kybervpn_auth::{RegistrierungsBeobachter, SessionRegistry};
use kybervpn_core::{Identitaet, NachrichtId, RaumId, SessionId};
use kybervpn_crypto::{handshake_durchfuehren, KemManager, KONTEXT_RAUM};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::frames::{AusgangsFrame, EingangsFrame};
use crate::raeume::{GespeicherteNachricht, RaumEintrag, RaumRegister};
use crate::senke::FrameSenke;
use crate::types::{Nachricht, Raum, ZustellBericht, MAX_INHALT_LAENGE, MAX_LIMIT, STANDARD_LIMIT};

/// Fehlertext an den Absender, wenn eine Nachricht abgelehnt wurde
pub const FEHLER_NICHT_GESENDET: &str = "Nachricht konnte nicht gesendet werden";

/// Eine angehaengte Echtzeit-Verbindung
struct Verbindung {
    identitaet: Identitaet,
    senke: Arc<dyn FrameSenke>,
}

#[derive(Clone)]
pub struct RaumDienst {
    inner: Arc<DienstInner>,
}

struct DienstInner {
    sessions: SessionRegistry,
    raeume: Arc<RaumRegister>,
    kem: KemManager,
    verbindungen: DashMap<SessionId, Verbindung>,
}

/// Haengt die Verbindung einer beendeten Session ab
///
/// Haelt den Dienst nur schwach, die Registry soll ihn nicht am Leben halten.
struct SessionAufraeumer {
    dienst: Weak<DienstInner>,
}

impl RegistrierungsBeobachter for SessionAufraeumer {
    fn session_beendet(&self, session_id: &SessionId) {
        if let Some(inner) = self.dienst.upgrade() {
            RaumDienst { inner }.abhaengen(session_id);
        }
    }
}

impl RaumDienst {
    /// Erstellt den Dienst und meldet Raum-Register und Verbindungs-Aufraeumer
    /// als Beobachter an
    ///
    /// Der Standardraum startet mit allen bereits registrierten Benutzern.
    pub fn neu(sessions: SessionRegistry, kem: KemManager) -> Self {
        let raeume = Arc::new(RaumRegister::neu(sessions.identitaeten().into_iter().collect()));
        sessions.beobachter_hinzufuegen(raeume.clone());

        // Registrierungen zwischen Momentaufnahme und Anmeldung nachtragen
        let standard = RaumRegister::standard_raum();
        for identitaet in sessions.identitaeten() {
            if let Err(e) = raeume.teilnehmer_hinzufuegen(&standard, &identitaet) {
                tracing::warn!(username = %identitaet, fehler = %e, "Standardraum nicht verfuegbar");
            }
        }

        let inner = Arc::new(DienstInner {
            sessions,
            raeume,
            kem,
            verbindungen: DashMap::new(),
        });
        inner.sessions.beobachter_hinzufuegen(Arc::new(SessionAufraeumer {
            dienst: Arc::downgrade(&inner),
        }));

        Self { inner }
    }

    pub fn raeume(&self) -> &RaumRegister {
        &self.inner.raeume
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    // -----------------------------------------------------------------------
    // Raeume
    // -----------------------------------------------------------------------

    /// Erstellt einen Direktraum mit eigenem Schluessel
    pub fn direkt_raum_erstellen(&self, a: &Identitaet, b: &Identitaet) -> ChatResult<Raum> {
        for identitaet in [a, b] {
            if !self.inner.sessions.ist_registriert(identitaet) {
                return Err(ChatError::BenutzerNichtGefunden(identitaet.to_string()));
            }
        }
        if a == b {
            return Err(ChatError::UngueltigeEingabe(
                "Direktraum braucht zwei verschiedene Teilnehmer".into(),
            ));
        }

        let kanal = handshake_durchfuehren(&self.inner.kem, KONTEXT_RAUM)?;
        let id = RaumId::neu(format!("private_{a}_{b}_{}", kurz_id()));
        let eintrag = RaumEintrag::neu(
            id,
            format!("Privater Chat: {a} - {b}"),
            false,
            BTreeSet::from([a.clone(), b.clone()]),
            Some(Arc::new(kanal)),
        );

        let raum = self.inner.raeume.einfuegen(eintrag)?;
        tracing::info!(
            raum_id = %raum.id,
            a = %a,
            b = %b,
            fingerprint = raum.key_fingerprint.as_deref().unwrap_or_default(),
            "Direktraum erstellt"
        );
        Ok(raum)
    }

    /// Erstellt einen Gruppenraum ohne eigenen Schluessel
    pub fn gruppenraum_erstellen(&self, name: &str, teilnehmer: &[Identitaet]) -> ChatResult<Raum> {
        if teilnehmer.is_empty() {
            return Err(ChatError::UngueltigeEingabe("Gruppenraum ohne Teilnehmer".into()));
        }
        if let Some(unbekannt) = teilnehmer.iter().find(|t| !self.inner.sessions.ist_registriert(t)) {
            return Err(ChatError::BenutzerNichtGefunden(unbekannt.to_string()));
        }

        let name = match name.trim() {
            "" => "Gruppe".to_string(),
            n => n.to_string(),
        };
        let eintrag = RaumEintrag::neu(
            RaumId::neu(format!("group_{}", kurz_id())),
            name,
            true,
            teilnehmer.iter().cloned().collect(),
            None,
        );

        let raum = self.inner.raeume.einfuegen(eintrag)?;
        tracing::info!(raum_id = %raum.id, teilnehmer = raum.participants.len(), "Gruppenraum erstellt");
        Ok(raum)
    }

    /// Raeume eines Benutzers, nach Erstellung sortiert
    pub fn raeume_fuer(&self, identitaet: &Identitaet) -> Vec<Raum> {
        self.inner.raeume.raeume_fuer(identitaet)
    }

    // -----------------------------------------------------------------------
    // Nachrichten
    // -----------------------------------------------------------------------

    /// Die neuesten `limit` Nachrichten eines Raums in chronologischer Reihenfolge
    pub fn nachrichten_laden(&self, raum: &RaumId, limit: Option<usize>) -> ChatResult<Vec<Nachricht>> {
        let limit = limit.unwrap_or(STANDARD_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Limit {limit} ausserhalb von 1..={MAX_LIMIT}"
            )));
        }

        self.inner.raeume.mit_raum(raum, |r| {
            let start = r.nachrichten.len().saturating_sub(limit);
            r.nachrichten[start..]
                .iter()
                .filter_map(|g| match r.oeffnen(g) {
                    Ok(n) => Some(n),
                    Err(e) => {
                        tracing::warn!(raum_id = %r.id, nachricht_id = %g.id, fehler = %e, "Nachricht nicht lesbar");
                        None
                    }
                })
                .collect()
        })
    }

    /// Wie [`nachrichten_laden`](Self::nachrichten_laden), aber nur fuer Teilnehmer
    pub fn nachrichten_laden_als(
        &self,
        identitaet: &Identitaet,
        raum: &RaumId,
        limit: Option<usize>,
    ) -> ChatResult<Vec<Nachricht>> {
        let ist_teilnehmer = self.inner.raeume.mit_raum(raum, |r| r.ist_teilnehmer(identitaet))?;
        if !ist_teilnehmer {
            return Err(ChatError::KeinTeilnehmer {
                identitaet: identitaet.to_string(),
                raum: raum.to_string(),
            });
        }
        self.nachrichten_laden(raum, limit)
    }

    /// Speichert eine Nachricht
    ///
    /// Gibt `None` zurueck, wenn Session, Raum oder Teilnahme nicht passen.
    /// Der Grund wird geloggt, nicht an den Transport gemeldet.
    pub fn nachricht_posten(&self, session_id: &SessionId, raum: &RaumId, inhalt: &str) -> Option<Nachricht> {
        let Some(absender) = self.inner.sessions.identitaet_fuer_session(session_id) else {
            tracing::warn!(session_id = %session_id, "Nachricht mit ungueltiger Session abgelehnt");
            return None;
        };

        if inhalt.trim().is_empty() || inhalt.len() > MAX_INHALT_LAENGE {
            tracing::warn!(username = %absender, laenge = inhalt.len(), "Nachricht mit ungueltigem Inhalt abgelehnt");
            return None;
        }

        let ergebnis = self.inner.raeume.mit_raum(raum, |r| {
            if !r.ist_teilnehmer(&absender) {
                return Err(ChatError::KeinTeilnehmer {
                    identitaet: absender.to_string(),
                    raum: raum.to_string(),
                });
            }

            let id = NachrichtId::new();
            let gespeichert = GespeicherteNachricht {
                id,
                sender: absender.clone(),
                zeitstempel: Utc::now(),
                inhalt: r.versiegeln(&id, inhalt)?,
                gelesen_von: BTreeSet::from([absender.clone()]),
            };

            let nachricht = Nachricht {
                id,
                sender: absender.clone(),
                room_id: r.id.clone(),
                content: inhalt.to_string(),
                timestamp: gespeichert.zeitstempel,
                read_by: vec![absender.clone()],
            };
            r.nachrichten.push(gespeichert);
            Ok(nachricht)
        });

        match ergebnis.and_then(|n| n) {
            Ok(nachricht) => {
                tracing::info!(username = %absender, raum_id = %raum, nachricht_id = %nachricht.id, "Nachricht gespeichert");
                Some(nachricht)
            }
            Err(e) => {
                tracing::warn!(username = %absender, raum_id = %raum, fehler = %e, "Nachricht abgelehnt");
                None
            }
        }
    }

    /// Markiert eine Nachricht als gelesen
    pub fn als_gelesen_markieren(
        &self,
        session_id: &SessionId,
        raum: &RaumId,
        nachricht: &NachrichtId,
    ) -> ChatResult<()> {
        let leser = self
            .inner
            .sessions
            .identitaet_fuer_session(session_id)
            .ok_or_else(|| ChatError::SessionUnbekannt(session_id.to_string()))?;

        self.inner.raeume.mit_raum(raum, |r| {
            if !r.ist_teilnehmer(&leser) {
                return Err(ChatError::KeinTeilnehmer {
                    identitaet: leser.to_string(),
                    raum: raum.to_string(),
                });
            }
            let eintrag = r
                .nachrichten
                .iter_mut()
                .find(|n| n.id == *nachricht)
                .ok_or_else(|| ChatError::NachrichtNichtGefunden(nachricht.to_string()))?;
            eintrag.gelesen_von.insert(leser.clone());
            Ok(())
        })?
    }

    // -----------------------------------------------------------------------
    // Verbindungen
    // -----------------------------------------------------------------------

    /// Haengt eine Echtzeit-Verbindung an und setzt den Benutzer online
    pub fn anhaengen(&self, session_id: SessionId, senke: Arc<dyn FrameSenke>) -> ChatResult<Identitaet> {
        let identitaet = self
            .inner
            .sessions
            .identitaet_fuer_session(&session_id)
            .ok_or_else(|| ChatError::SessionUnbekannt(session_id.to_string()))?;

        self.inner.verbindungen.insert(
            session_id,
            Verbindung {
                identitaet: identitaet.clone(),
                senke,
            },
        );
        self.inner.sessions.online_setzen(&identitaet, true);
        tracing::info!(username = %identitaet, session_id = %session_id, "Echtzeit-Verbindung angehaengt");
        Ok(identitaet)
    }

    /// Entfernt eine Verbindung; der Benutzer geht offline, wenn es seine letzte war
    pub fn abhaengen(&self, session_id: &SessionId) {
        if let Some((_, verbindung)) = self.inner.verbindungen.remove(session_id) {
            self.abgehaengt(session_id, verbindung);
        }
    }

    /// Wie [`abhaengen`](Self::abhaengen), aber nur solange `senke` noch die
    /// angehaengte Senke der Session ist
    ///
    /// Ein zweiter Socket derselben Session ersetzt die Senke; der alte darf
    /// den neuen beim Schliessen nicht abhaengen. Der Transport haelt seine
    /// Senke nur schwach, der Dienst besitzt sie.
    pub fn abhaengen_senke(&self, session_id: &SessionId, senke: &Weak<dyn FrameSenke>) {
        if let Some((_, verbindung)) = self
            .inner
            .verbindungen
            .remove_if(session_id, |_, v| Weak::ptr_eq(&Arc::downgrade(&v.senke), senke))
        {
            self.abgehaengt(session_id, verbindung);
        }
    }

    fn abgehaengt(&self, session_id: &SessionId, verbindung: Verbindung) {
        let weitere = self
            .inner
            .verbindungen
            .iter()
            .any(|v| v.identitaet == verbindung.identitaet);
        if !weitere {
            self.inner.sessions.online_setzen(&verbindung.identitaet, false);
        }
        tracing::info!(username = %verbindung.identitaet, session_id = %session_id, "Echtzeit-Verbindung getrennt");
    }

    pub fn anzahl_verbindungen(&self) -> usize {
        self.inner.verbindungen.len()
    }

    // -----------------------------------------------------------------------
    // Verteilung
    // -----------------------------------------------------------------------

    /// Sendet einen Frame an alle verbundenen Teilnehmer eines Raums
    ///
    /// Eine scheiternde Senke blockiert die anderen nicht.
    pub fn an_raum_senden(
        &self,
        raum: &RaumId,
        frame: &AusgangsFrame,
        ausser: Option<&SessionId>,
    ) -> ZustellBericht {
        let Some(teilnehmer) = self.inner.raeume.teilnehmer(raum) else {
            tracing::debug!(raum_id = %raum, "Verteilung an unbekannten Raum");
            return ZustellBericht::default();
        };

        // Senken ausserhalb der DashMap-Locks bedienen
        let kandidaten: Vec<(SessionId, Arc<dyn FrameSenke>)> = self
            .inner
            .verbindungen
            .iter()
            .filter(|v| Some(v.key()) != ausser && teilnehmer.contains(&v.identitaet))
            .map(|v| (*v.key(), v.senke.clone()))
            .collect();

        // Abgelaufen, aber vom Cleanup noch nicht erfasst
        let (ziele, veraltet): (Vec<_>, Vec<_>) = kandidaten
            .into_iter()
            .partition(|(session_id, _)| self.inner.sessions.identitaet_fuer_session(session_id).is_some());
        for (session_id, _) in veraltet {
            tracing::debug!(session_id = %session_id, "Verbindung einer abgelaufenen Session abgehaengt");
            self.abhaengen(&session_id);
        }

        let mut bericht = ZustellBericht::default();
        for (session_id, senke) in ziele {
            match senke.senden(frame) {
                Ok(()) => bericht.zugestellt += 1,
                Err(e) => {
                    bericht.fehlgeschlagen += 1;
                    tracing::warn!(session_id = %session_id, raum_id = %raum, fehler = %e, "Zustellung fehlgeschlagen");
                }
            }
        }
        bericht
    }

    /// Verteilt eine Nachricht als `new_message` an ihren Raum
    pub fn nachricht_verteilen(&self, nachricht: &Nachricht, ausser: Option<&SessionId>) -> ZustellBericht {
        let frame = AusgangsFrame::NewMessage {
            message: nachricht.clone(),
        };
        self.an_raum_senden(&nachricht.room_id, &frame, ausser)
    }

    /// Sendet einen Frame an genau eine Session
    pub fn an_session_senden(&self, session_id: &SessionId, frame: &AusgangsFrame) -> ChatResult<()> {
        let senke = self
            .inner
            .verbindungen
            .get(session_id)
            .map(|v| v.senke.clone())
            .ok_or_else(|| ChatError::SessionUnbekannt(session_id.to_string()))?;
        senke.senden(frame)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Eingang
    // -----------------------------------------------------------------------

    /// Verarbeitet einen Frame einer angehaengten Verbindung
    pub fn eingang_verarbeiten(&self, session_id: &SessionId, frame: EingangsFrame) -> ZustellBericht {
        match frame {
            EingangsFrame::Message { room_id, content } => {
                match self.nachricht_posten(session_id, &room_id, &content) {
                    Some(nachricht) => {
                        self.an_absender(
                            session_id,
                            &AusgangsFrame::MessageSent {
                                message_id: nachricht.id,
                                timestamp: nachricht.timestamp,
                            },
                        );
                        self.nachricht_verteilen(&nachricht, None)
                    }
                    None => {
                        self.an_absender(session_id, &AusgangsFrame::fehler(FEHLER_NICHT_GESENDET));
                        ZustellBericht::default()
                    }
                }
            }
            EingangsFrame::Typing { room_id } => {
                if !self.inner.raeume.existiert(&room_id) {
                    return ZustellBericht::default();
                }
                let Some(username) = self.inner.sessions.identitaet_fuer_session(session_id) else {
                    return ZustellBericht::default();
                };
                let frame = AusgangsFrame::Typing {
                    room_id: room_id.clone(),
                    username,
                };
                self.an_raum_senden(&room_id, &frame, Some(session_id))
            }
        }
    }

    /// Parst einen JSON-Text-Frame und verarbeitet ihn; ungueltige Frames
    /// beantwortet der Dienst mit einem `error`-Frame
    pub fn eingang_text_verarbeiten(&self, session_id: &SessionId, text: &str) -> ZustellBericht {
        match serde_json::from_str::<EingangsFrame>(text) {
            Ok(frame) => self.eingang_verarbeiten(session_id, frame),
            Err(e) => {
                tracing::debug!(session_id = %session_id, fehler = %e, "Ungueltiger Frame");
                self.an_absender(session_id, &AusgangsFrame::fehler(format!("Ungueltiger Frame: {e}")));
                ZustellBericht::default()
            }
        }
    }

    fn an_absender(&self, session_id: &SessionId, frame: &AusgangsFrame) {
        if let Err(e) = self.an_session_senden(session_id, frame) {
            tracing::debug!(session_id = %session_id, fehler = %e, "Antwort an Absender nicht zugestellt");
        }
    }
}

/// Erste 8 Hex-Zeichen einer zufaelligen UUID
fn kurz_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
