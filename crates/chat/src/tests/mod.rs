//! Unit-Tests fuer den Raum-Dienst

mod verteilung_tests;

use std::sync::Arc;

use kybervpn_auth::{SessionRegistry, TokenKonfig};
use kybervpn_core::{Identitaet, SessionId};
use kybervpn_crypto::{KemManager, SicherheitsStufe};
use parking_lot::Mutex;

use crate::error::ZustellFehler;
use crate::frames::AusgangsFrame;
use crate::senke::FrameSenke;
use crate::RaumDienst;

/// Dienst mit den Benutzern `usuario1..=usuarioN` (Passwort `passwordN`)
pub(crate) fn dienst_mit_benutzern(anzahl: usize) -> RaumDienst {
    dienst_mit_lebensdauer(anzahl, TokenKonfig::neu("chat-test-geheimnis").lebensdauer)
}

/// Wie [`dienst_mit_benutzern`], Sessions laufen nach `lebensdauer` ab
pub(crate) fn dienst_mit_lebensdauer(anzahl: usize, lebensdauer: chrono::Duration) -> RaumDienst {
    let subnetz = "10.8.0.0/24".parse().expect("Subnetz");
    let mut konfig = TokenKonfig::neu("chat-test-geheimnis");
    konfig.lebensdauer = lebensdauer;
    let registry = SessionRegistry::neu(subnetz, &konfig);
    let dienst = RaumDienst::neu(registry.clone(), KemManager::neu(SicherheitsStufe::Stufe1));
    for i in 1..=anzahl {
        registry
            .registrieren(&format!("usuario{i}"), &format!("password{i}"), "")
            .expect("Registrierung fehlgeschlagen");
    }
    dienst
}

/// Meldet `usuarioN` an und gibt die Session-ID zurueck
pub(crate) fn anmelden(dienst: &RaumDienst, n: usize) -> SessionId {
    dienst
        .sessions()
        .authentifizieren(&format!("usuario{n}"), &format!("password{n}"), &format!("10.8.0.{}", n + 1))
        .expect("Anmeldung fehlgeschlagen")
        .session_id
}

pub(crate) fn id(n: usize) -> Identitaet {
    Identitaet::neu(format!("usuario{n}"))
}

/// Senke, die alle Frames mitschreibt
#[derive(Default)]
pub(crate) struct TestSenke {
    pub frames: Mutex<Vec<AusgangsFrame>>,
}

impl FrameSenke for TestSenke {
    fn senden(&self, frame: &AusgangsFrame) -> Result<(), ZustellFehler> {
        self.frames.lock().push(frame.clone());
        Ok(())
    }
}

impl TestSenke {
    pub fn anzahl(&self) -> usize {
        self.frames.lock().len()
    }
}

/// Senke, die jede Zustellung ablehnt
pub(crate) struct KaputteSenke;

impl FrameSenke for KaputteSenke {
    fn senden(&self, _frame: &AusgangsFrame) -> Result<(), ZustellFehler> {
        Err(ZustellFehler::Geschlossen)
    }
}

pub(crate) fn senke_anhaengen(dienst: &RaumDienst, session: SessionId) -> Arc<TestSenke> {
    let senke = Arc::new(TestSenke::default());
    dienst.anhaengen(session, senke.clone()).expect("Anhaengen fehlgeschlagen");
    senke
}
