//! Raum-Register
//!
//! Haelt alle Raeume samt Nachrichten im Speicher. Jeder Raum liegt hinter
//! einem eigenen `parking_lot::Mutex`, Mutationen sind damit pro Raum
//! serialisiert. Teilnehmer werden nur hinzugefuegt, nie entfernt.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kybervpn_auth::RegistrierungsBeobachter;
use kybervpn_core::{Identitaet, NachrichtId, RaumId};
use kybervpn_crypto::SymmetricChannel;
use parking_lot::Mutex;

use crate::error::{ChatError, ChatResult};
use crate::types::{Nachricht, Raum, STANDARD_RAUM};

// ---------------------------------------------------------------------------
// Eintraege
// ---------------------------------------------------------------------------

/// Gespeicherte Nachricht; `inhalt` ist bei Raeumen mit Schluessel versiegelt
#[derive(Debug, Clone)]
pub(crate) struct GespeicherteNachricht {
    pub id: NachrichtId,
    pub sender: Identitaet,
    pub zeitstempel: DateTime<Utc>,
    pub inhalt: String,
    pub gelesen_von: BTreeSet<Identitaet>,
}

pub(crate) struct RaumEintrag {
    pub id: RaumId,
    pub name: String,
    pub is_group: bool,
    pub teilnehmer: BTreeSet<Identitaet>,
    pub erstellt_am: DateTime<Utc>,
    pub folge: u64,
    pub kanal: Option<Arc<SymmetricChannel>>,
    pub nachrichten: Vec<GespeicherteNachricht>,
}

impl RaumEintrag {
    pub fn neu(
        id: RaumId,
        name: String,
        is_group: bool,
        teilnehmer: BTreeSet<Identitaet>,
        kanal: Option<Arc<SymmetricChannel>>,
    ) -> Self {
        Self {
            id,
            name,
            is_group,
            teilnehmer,
            erstellt_am: Utc::now(),
            folge: 0,
            kanal,
            nachrichten: Vec::new(),
        }
    }

    pub fn ist_teilnehmer(&self, identitaet: &Identitaet) -> bool {
        self.teilnehmer.contains(identitaet)
    }

    pub fn momentaufnahme(&self) -> Raum {
        Raum {
            id: self.id.clone(),
            name: self.name.clone(),
            is_group: self.is_group,
            participants: self.teilnehmer.iter().cloned().collect(),
            created_at: self.erstellt_am,
            key_fingerprint: self.kanal.as_ref().map(|k| k.key_fingerprint().to_string()),
        }
    }

    /// Versiegelt den Inhalt, falls der Raum einen Schluessel hat (AAD = Nachrichten-ID)
    pub fn versiegeln(&self, id: &NachrichtId, klartext: &str) -> ChatResult<String> {
        match &self.kanal {
            Some(kanal) => Ok(kanal.encrypt_to_base64(klartext.as_bytes(), Some(id.0.as_bytes().as_slice()))?),
            None => Ok(klartext.to_string()),
        }
    }

    /// Oeffnet eine gespeicherte Nachricht
    pub fn oeffnen(&self, gespeichert: &GespeicherteNachricht) -> ChatResult<Nachricht> {
        let content = match &self.kanal {
            Some(kanal) => {
                let bytes = kanal.decrypt_from_base64(
                    &gespeichert.inhalt,
                    Some(gespeichert.id.0.as_bytes().as_slice()),
                )?;
                String::from_utf8(bytes)
                    .map_err(|_| ChatError::UngueltigeEingabe("Inhalt ist kein UTF-8".into()))?
            }
            None => gespeichert.inhalt.clone(),
        };

        Ok(Nachricht {
            id: gespeichert.id,
            sender: gespeichert.sender.clone(),
            room_id: self.id.clone(),
            content,
            timestamp: gespeichert.zeitstempel,
            read_by: gespeichert.gelesen_von.iter().cloned().collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// RaumRegister
// ---------------------------------------------------------------------------

pub struct RaumRegister {
    raeume: DashMap<RaumId, Mutex<RaumEintrag>>,
    folge: AtomicU64,
}

impl RaumRegister {
    /// Neues Register; der Standardraum startet mit `teilnehmer`
    pub fn neu(teilnehmer: BTreeSet<Identitaet>) -> Self {
        let register = Self {
            raeume: DashMap::new(),
            folge: AtomicU64::new(0),
        };
        let standard = RaumEintrag::neu(
            Self::standard_raum(),
            "Allgemeiner Kanal".to_string(),
            true,
            teilnehmer,
            None,
        );
        // Das Register ist leer, das Einfuegen kann nicht kollidieren
        let _ = register.einfuegen(standard);
        register
    }

    pub fn standard_raum() -> RaumId {
        RaumId::neu(STANDARD_RAUM)
    }

    /// Fuegt einen neuen Raum ein; vergibt die Erstellungsreihenfolge
    pub(crate) fn einfuegen(&self, mut eintrag: RaumEintrag) -> ChatResult<Raum> {
        eintrag.folge = self.folge.fetch_add(1, Ordering::Relaxed);
        match self.raeume.entry(eintrag.id.clone()) {
            Entry::Occupied(_) => Err(ChatError::UngueltigeEingabe(format!(
                "Raum existiert bereits: {}",
                eintrag.id
            ))),
            Entry::Vacant(frei) => {
                let raum = eintrag.momentaufnahme();
                frei.insert(Mutex::new(eintrag));
                Ok(raum)
            }
        }
    }

    pub fn existiert(&self, raum: &RaumId) -> bool {
        self.raeume.contains_key(raum)
    }

    pub fn anzahl(&self) -> usize {
        self.raeume.len()
    }

    /// Fuehrt `f` unter dem Lock des Raums aus
    pub(crate) fn mit_raum<R>(
        &self,
        raum: &RaumId,
        f: impl FnOnce(&mut RaumEintrag) -> R,
    ) -> ChatResult<R> {
        let eintrag = self
            .raeume
            .get(raum)
            .ok_or_else(|| ChatError::RaumNichtGefunden(raum.to_string()))?;
        let mut gesperrt = eintrag.lock();
        Ok(f(&mut gesperrt))
    }

    pub fn teilnehmer(&self, raum: &RaumId) -> Option<BTreeSet<Identitaet>> {
        self.mit_raum(raum, |r| r.teilnehmer.clone()).ok()
    }

    pub fn teilnehmer_hinzufuegen(&self, raum: &RaumId, identitaet: &Identitaet) -> ChatResult<bool> {
        self.mit_raum(raum, |r| r.teilnehmer.insert(identitaet.clone()))
    }

    /// Alle Raeume mit `identitaet` als Teilnehmer, nach Erstellung sortiert
    pub fn raeume_fuer(&self, identitaet: &Identitaet) -> Vec<Raum> {
        let mut treffer: Vec<(u64, Raum)> = self
            .raeume
            .iter()
            .filter_map(|eintrag| {
                let r = eintrag.value().lock();
                r.ist_teilnehmer(identitaet).then(|| (r.folge, r.momentaufnahme()))
            })
            .collect();
        treffer.sort_by_key(|(folge, _)| *folge);
        treffer.into_iter().map(|(_, raum)| raum).collect()
    }
}

impl RegistrierungsBeobachter for RaumRegister {
    fn benutzer_registriert(&self, identitaet: &Identitaet) {
        match self.teilnehmer_hinzufuegen(&Self::standard_raum(), identitaet) {
            Ok(_) => tracing::debug!(username = %identitaet, "Dem Standardraum beigetreten"),
            Err(e) => tracing::warn!(username = %identitaet, fehler = %e, "Standardraum nicht verfuegbar"),
        }
    }
}
