//! Verbindungen, Verteilung und Eingangs-Frames

use std::sync::Arc;
use std::time::Duration;

use kybervpn_core::{Identitaet, RaumId};
use tokio::sync::mpsc::error::TryRecvError;

use super::{
    anmelden, dienst_mit_benutzern, dienst_mit_lebensdauer, id, senke_anhaengen, KaputteSenke,
    TestSenke,
};
use crate::frames::{AusgangsFrame, EingangsFrame};
use crate::senke::{FrameSenke, KanalSenke};
use crate::types::{ZustellBericht, STANDARD_RAUM};
use crate::FEHLER_NICHT_GESENDET;

#[test]
fn kaputte_senke_blockiert_andere_nicht() {
    let dienst = dienst_mit_benutzern(3);
    let raum = dienst
        .gruppenraum_erstellen("drei", &[id(1), id(2), id(3)])
        .expect("Gruppenraum");

    let s1 = anmelden(&dienst, 1);
    let s2 = anmelden(&dienst, 2);
    let s3 = anmelden(&dienst, 3);
    let senke1 = senke_anhaengen(&dienst, s1);
    dienst.anhaengen(s2, Arc::new(KaputteSenke)).expect("Anhaengen");
    let senke3 = senke_anhaengen(&dienst, s3);

    let nachricht = dienst.nachricht_posten(&s1, &raum.id, "an alle").expect("Nachricht");
    let bericht = dienst.nachricht_verteilen(&nachricht, None);

    assert_eq!(bericht, ZustellBericht { zugestellt: 2, fehlgeschlagen: 1 });
    assert_eq!(senke1.anzahl(), 1);
    assert_eq!(senke3.anzahl(), 1);
}

#[test]
fn verteilung_nur_an_teilnehmer_und_ohne_ausgeschlossene_session() {
    let dienst = dienst_mit_benutzern(3);
    let raum = dienst.direkt_raum_erstellen(&id(1), &id(2)).expect("Direktraum");
    let s1 = anmelden(&dienst, 1);
    let s2 = anmelden(&dienst, 2);
    let s3 = anmelden(&dienst, 3);
    let senke1 = senke_anhaengen(&dienst, s1);
    let senke2 = senke_anhaengen(&dienst, s2);
    let senke3 = senke_anhaengen(&dienst, s3);

    let nachricht = dienst.nachricht_posten(&s1, &raum.id, "privat").expect("Nachricht");
    let bericht = dienst.nachricht_verteilen(&nachricht, Some(&s1));

    assert_eq!(bericht.zugestellt, 1);
    assert_eq!(senke1.anzahl(), 0);
    assert_eq!(senke2.anzahl(), 1);
    assert_eq!(senke3.anzahl(), 0);
}

#[test]
fn message_frame_bestaetigt_und_verteilt() {
    let dienst = dienst_mit_benutzern(2);
    let s1 = anmelden(&dienst, 1);
    let s2 = anmelden(&dienst, 2);
    let senke1 = senke_anhaengen(&dienst, s1);
    let senke2 = senke_anhaengen(&dienst, s2);

    let bericht = dienst.eingang_verarbeiten(
        &s1,
        EingangsFrame::Message {
            room_id: RaumId::neu(STANDARD_RAUM),
            content: "Hola".into(),
        },
    );
    // Absender bekommt die Nachricht ebenfalls
    assert_eq!(bericht.zugestellt, 2);

    let frames1 = senke1.frames.lock().clone();
    assert!(matches!(frames1[0], AusgangsFrame::MessageSent { .. }));
    assert!(matches!(&frames1[1], AusgangsFrame::NewMessage { message } if message.content == "Hola"));

    let frames2 = senke2.frames.lock().clone();
    assert_eq!(frames2.len(), 1);
    match &frames2[0] {
        AusgangsFrame::NewMessage { message } => assert_eq!(message.sender, id(1)),
        anderer => panic!("unerwartet: {anderer:?}"),
    }
}

#[test]
fn abgelehnte_nachricht_ergibt_error_frame() {
    let dienst = dienst_mit_benutzern(3);
    let raum = dienst.direkt_raum_erstellen(&id(1), &id(2)).expect("Direktraum");
    let s3 = anmelden(&dienst, 3);
    let senke3 = senke_anhaengen(&dienst, s3);

    let bericht = dienst.eingang_verarbeiten(
        &s3,
        EingangsFrame::Message {
            room_id: raum.id,
            content: "hallo?".into(),
        },
    );
    assert_eq!(bericht, ZustellBericht::default());
    assert_eq!(
        senke3.frames.lock().as_slice(),
        &[AusgangsFrame::fehler(FEHLER_NICHT_GESENDET)]
    );
}

#[test]
fn typing_geht_an_alle_ausser_absender() {
    let dienst = dienst_mit_benutzern(2);
    let s1 = anmelden(&dienst, 1);
    let s2 = anmelden(&dienst, 2);
    let senke1 = senke_anhaengen(&dienst, s1);
    let senke2 = senke_anhaengen(&dienst, s2);

    dienst.eingang_text_verarbeiten(&s1, r#"{"type":"typing","room_id":"general"}"#);
    assert_eq!(senke1.anzahl(), 0);
    assert_eq!(
        senke2.frames.lock().as_slice(),
        &[AusgangsFrame::Typing {
            room_id: RaumId::neu(STANDARD_RAUM),
            username: id(1),
        }]
    );

    // Unbekannter Raum: keine Verteilung
    dienst.eingang_text_verarbeiten(&s1, r#"{"type":"typing","room_id":"nirgendwo"}"#);
    assert_eq!(senke2.anzahl(), 1);
}

#[test]
fn ungueltiger_text_frame_ergibt_error_frame() {
    let dienst = dienst_mit_benutzern(1);
    let s1 = anmelden(&dienst, 1);
    let senke1 = senke_anhaengen(&dienst, s1);

    dienst.eingang_text_verarbeiten(&s1, "kein json");
    let frames = senke1.frames.lock().clone();
    assert!(matches!(&frames[..], [AusgangsFrame::Error { .. }]));
}

#[test]
fn praesenz_folgt_verbindungen() {
    let dienst = dienst_mit_benutzern(1);
    let a = anmelden(&dienst, 1);
    let b = anmelden(&dienst, 1);
    let benutzer = |d: &crate::RaumDienst| d.sessions().benutzer(&id(1)).expect("Profil");

    senke_anhaengen(&dienst, a);
    senke_anhaengen(&dienst, b);
    assert_eq!(dienst.anzahl_verbindungen(), 2);

    dienst.abhaengen(&a);
    assert!(benutzer(&dienst).online, "zweite Verbindung ist noch offen");
    dienst.abhaengen(&b);
    assert!(!benutzer(&dienst).online);

    // Doppeltes Abhaengen ist harmlos
    dienst.abhaengen(&b);
}

#[test]
fn ersetzte_senke_haengt_neue_verbindung_nicht_ab() {
    let dienst = dienst_mit_benutzern(1);
    let s = anmelden(&dienst, 1);

    let alt: Arc<dyn FrameSenke> = Arc::new(TestSenke::default());
    let neu: Arc<dyn FrameSenke> = Arc::new(TestSenke::default());
    dienst.anhaengen(s, alt.clone()).expect("Anhaengen");
    dienst.anhaengen(s, neu.clone()).expect("Erneut anhaengen");

    // Der alte Socket schliesst nach dem neuen
    dienst.abhaengen_senke(&s, &Arc::downgrade(&alt));
    assert_eq!(dienst.anzahl_verbindungen(), 1);
    assert!(dienst.sessions().benutzer(&id(1)).expect("Profil").online);

    dienst.abhaengen_senke(&s, &Arc::downgrade(&neu));
    assert_eq!(dienst.anzahl_verbindungen(), 0);
    assert!(!dienst.sessions().benutzer(&id(1)).expect("Profil").online);
}

#[test]
fn abgelaufene_session_wird_nicht_mehr_beliefert() {
    let dienst = dienst_mit_lebensdauer(2, chrono::Duration::milliseconds(500));
    let raum = dienst.direkt_raum_erstellen(&id(1), &id(2)).expect("Direktraum");
    let s1 = anmelden(&dienst, 1);
    let senke1 = senke_anhaengen(&dienst, s1);

    std::thread::sleep(Duration::from_millis(700));

    // Der Cleanup lief noch nicht, die Verbindung haengt noch
    assert_eq!(dienst.anzahl_verbindungen(), 1);
    let frame = AusgangsFrame::Typing {
        room_id: raum.id.clone(),
        username: id(2),
    };
    let bericht = dienst.an_raum_senden(&raum.id, &frame, None);

    assert_eq!(bericht, ZustellBericht::default());
    assert_eq!(senke1.anzahl(), 0);
    assert_eq!(dienst.anzahl_verbindungen(), 0);
    assert!(!dienst.sessions().benutzer(&id(1)).expect("Profil").online);
}

#[test]
fn cleanup_schliesst_verbindung_abgelaufener_session() {
    let dienst = dienst_mit_lebensdauer(1, chrono::Duration::milliseconds(500));
    let s1 = anmelden(&dienst, 1);
    let (senke, mut rx) = KanalSenke::neu(s1);
    dienst.anhaengen(s1, Arc::new(senke)).expect("Anhaengen");

    std::thread::sleep(Duration::from_millis(700));
    assert_eq!(dienst.sessions().abgelaufene_entfernen(), 1);

    assert_eq!(dienst.anzahl_verbindungen(), 0);
    // Letzte Senke verworfen: der Writer des Transports endet
    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
}

#[test]
fn abmelden_schliesst_verbindung() {
    let dienst = dienst_mit_benutzern(2);
    let s1 = anmelden(&dienst, 1);
    let s2 = anmelden(&dienst, 2);
    let (senke, mut rx) = KanalSenke::neu(s1);
    dienst.anhaengen(s1, Arc::new(senke)).expect("Anhaengen");
    let senke2 = senke_anhaengen(&dienst, s2);

    dienst.sessions().abmelden(&s1).expect("Abmelden");
    assert_eq!(dienst.anzahl_verbindungen(), 1);
    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));

    let nachricht = dienst
        .nachricht_posten(&s2, &RaumId::neu(STANDARD_RAUM), "noch jemand da?")
        .expect("Nachricht");
    assert_eq!(dienst.nachricht_verteilen(&nachricht, None).zugestellt, 1);
    assert_eq!(senke2.anzahl(), 1);
}

#[test]
fn anhaengen_nur_mit_lebender_session() {
    let dienst = dienst_mit_benutzern(1);
    let (senke, _rx) = KanalSenke::neu(kybervpn_core::SessionId::new());
    assert!(dienst.anhaengen(senke.session_id(), Arc::new(senke)).is_err());
    assert!(dienst.sessions().benutzer(&Identitaet::neu("usuario1")).is_some());
}

#[tokio::test]
async fn kanal_senke_liefert_in_reihenfolge() {
    let dienst = dienst_mit_benutzern(1);
    let s1 = anmelden(&dienst, 1);
    let (senke, mut rx) = KanalSenke::neu(s1);
    dienst.anhaengen(s1, Arc::new(senke)).expect("Anhaengen");

    for i in 0..5 {
        dienst.nachricht_posten(&s1, &RaumId::neu(STANDARD_RAUM), &format!("n{i}"))
            .map(|n| dienst.nachricht_verteilen(&n, None))
            .expect("Nachricht");
    }
    for i in 0..5 {
        match rx.recv().await {
            Some(AusgangsFrame::NewMessage { message }) => assert_eq!(message.content, format!("n{i}")),
            anderes => panic!("unerwartet: {anderes:?}"),
        }
    }
}
