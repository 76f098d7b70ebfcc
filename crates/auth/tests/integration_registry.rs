//! Integration-Tests fuer die Session-Registry

use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::Duration;
use kybervpn_auth::{
    AuthError, BenutzerVorlage, RegistrierungsBeobachter, SessionRegistry, TokenKonfig,
};
use kybervpn_core::{FehlerArt, Identitaet, Klassifiziert, SessionId, VpnSubnetz};
use parking_lot::Mutex;

fn subnetz() -> VpnSubnetz {
    "10.8.0.0/24".parse().expect("Subnetz")
}

fn registry() -> SessionRegistry {
    SessionRegistry::neu(subnetz(), &TokenKonfig::neu("integrationstest-geheimnis"))
}

fn registry_mit_lebensdauer(lebensdauer: Duration) -> SessionRegistry {
    let mut konfig = TokenKonfig::neu("integrationstest-geheimnis");
    konfig.lebensdauer = lebensdauer;
    SessionRegistry::neu(subnetz(), &konfig)
}

#[test]
fn authentifizieren_im_vpn_und_token_pruefen() {
    let r = registry();
    r.registrieren("usuario1", "password1", "Usuario Uno").expect("Registrierung");

    let session = r
        .authentifizieren("usuario1", "password1", "10.8.0.5")
        .expect("Authentifizierung");
    assert_eq!(session.vpn_ip, Ipv4Addr::new(10, 8, 0, 5));

    let inhaber = r.token_pruefen(&session.token).expect("Token muss gueltig sein");
    assert_eq!(inhaber.identitaet, Identitaet::neu("usuario1"));
    assert_eq!(inhaber.session_id, session.session_id);

    assert_eq!(r.identitaet_fuer_session(&session.session_id), Some(Identitaet::neu("usuario1")));
    assert_eq!(
        r.identitaet_fuer_adresse(Ipv4Addr::new(10, 8, 0, 5)),
        Some(Identitaet::neu("usuario1"))
    );
    let profil = r.benutzer(&Identitaet::neu("usuario1")).expect("Profil");
    assert!(profil.online);
    assert_eq!(profil.vpn_ip, Some(Ipv4Addr::new(10, 8, 0, 5)));
}

#[test]
fn adresse_ausserhalb_des_vpn_scheitert_unabhaengig_von_anmeldedaten() {
    let r = registry();
    r.registrieren("usuario1", "password1", "").expect("Registrierung");

    for (name, pw) in [("usuario1", "password1"), ("usuario1", "falsch"), ("niemand", "x")] {
        let err = r.authentifizieren(name, pw, "192.168.1.5").unwrap_err();
        assert!(matches!(err, AuthError::NichtImVpn(_)), "{name}/{pw}: {err:?}");
        assert_eq!(err.art(), FehlerArt::AuthentifizierungFehlgeschlagen);
    }
    assert!(matches!(
        r.authentifizieren("usuario1", "password1", "kein-ip"),
        Err(AuthError::UngueltigeAdresse(_))
    ));
    assert!(matches!(
        r.authentifizieren("usuario1", "password1", "::1"),
        Err(AuthError::NichtImVpn(_))
    ));
    assert_eq!(r.anzahl_sessions(), 0);
}

#[test]
fn pruefreihenfolge_benutzer_vor_passwort() {
    let r = registry();
    r.registrieren("usuario1", "password1", "").expect("Registrierung");

    let err = r.authentifizieren("usuario9", "password1", "10.8.0.5").unwrap_err();
    assert_eq!(err.art(), FehlerArt::NichtGefunden);

    let err = r.authentifizieren("usuario1", "password2", "10.8.0.5").unwrap_err();
    assert!(matches!(err, AuthError::UngueltigeAnmeldedaten));
    assert_eq!(err.art(), FehlerArt::AuthentifizierungFehlgeschlagen);
}

#[test]
fn doppelte_registrierung_und_leere_eingaben() {
    let r = registry();
    let profil = r.registrieren("usuario2", "password2", "").expect("Registrierung");
    assert_eq!(profil.display_name, "usuario2");

    let err = r.registrieren("usuario2", "anders", "Zwei").unwrap_err();
    assert!(matches!(err, AuthError::BenutzernameVergeben(_)));
    assert_eq!(err.art(), FehlerArt::UngueltigerParameter);

    assert!(matches!(r.registrieren("  ", "pw", ""), Err(AuthError::UngueltigeEingabe(_))));
    assert!(matches!(r.registrieren("neu", "", ""), Err(AuthError::UngueltigeEingabe(_))));
}

#[test]
fn abmelden_macht_token_ungueltig() {
    let r = registry();
    r.registrieren("usuario1", "password1", "").expect("Registrierung");
    let session = r.authentifizieren("usuario1", "password1", "10.8.0.7").expect("Login");

    r.abmelden(&session.session_id).expect("Abmelden");
    assert!(matches!(r.token_pruefen(&session.token), Err(AuthError::TokenUngueltig)));
    assert_eq!(r.identitaet_fuer_adresse(Ipv4Addr::new(10, 8, 0, 7)), None);
    assert!(matches!(
        r.abmelden(&session.session_id),
        Err(AuthError::SessionNichtGefunden(_))
    ));
}

#[test]
fn letzte_adressbindung_gewinnt() {
    let r = registry();
    r.registrieren("usuario1", "password1", "").expect("Registrierung");
    r.registrieren("usuario2", "password2", "").expect("Registrierung");

    r.authentifizieren("usuario1", "password1", "10.8.0.9").expect("Login 1");
    r.authentifizieren("usuario2", "password2", "10.8.0.9").expect("Login 2");
    assert_eq!(
        r.identitaet_fuer_adresse(Ipv4Addr::new(10, 8, 0, 9)),
        Some(Identitaet::neu("usuario2"))
    );
}

#[test]
fn token_einer_fremden_registry_wird_abgelehnt() {
    let a = registry();
    let b = registry();
    for r in [&a, &b] {
        r.registrieren("usuario1", "password1", "").expect("Registrierung");
    }
    let session = a.authentifizieren("usuario1", "password1", "10.8.0.5").expect("Login");
    // Gleiches Secret, aber die Session existiert in `b` nicht
    assert!(matches!(b.token_pruefen(&session.token), Err(AuthError::TokenUngueltig)));
}

#[test]
fn abgelaufene_sessions_werden_entfernt() {
    let r = registry_mit_lebensdauer(Duration::seconds(-1));
    r.registrieren("usuario1", "password1", "").expect("Registrierung");
    let session = r.authentifizieren("usuario1", "password1", "10.8.0.5").expect("Login");

    assert!(matches!(r.token_pruefen(&session.token), Err(AuthError::TokenUngueltig)));
    assert_eq!(r.identitaet_fuer_session(&session.session_id), None);

    assert_eq!(r.abgelaufene_entfernen(), 1);
    assert_eq!(r.anzahl_sessions(), 0);
    assert_eq!(r.identitaet_fuer_adresse(Ipv4Addr::new(10, 8, 0, 5)), None);
}

#[test]
fn unbekannte_session_id() {
    let r = registry();
    assert_eq!(r.identitaet_fuer_session(&SessionId::new()), None);
}

#[derive(Default)]
struct Protokoll(Mutex<Vec<Identitaet>>);

impl RegistrierungsBeobachter for Protokoll {
    fn benutzer_registriert(&self, identitaet: &Identitaet) {
        self.0.lock().push(identitaet.clone());
    }
}

#[derive(Default)]
struct Beendet(Mutex<Vec<SessionId>>);

impl RegistrierungsBeobachter for Beendet {
    fn session_beendet(&self, session_id: &SessionId) {
        self.0.lock().push(*session_id);
    }
}

#[test]
fn beobachter_erfahren_von_beendeten_sessions() {
    let r = registry();
    let beendet = Arc::new(Beendet::default());
    r.beobachter_hinzufuegen(beendet.clone());
    r.registrieren("usuario1", "password1", "").expect("Registrierung");

    let session = r.authentifizieren("usuario1", "password1", "10.8.0.5").expect("Login");
    r.abmelden(&session.session_id).expect("Abmelden");
    assert_eq!(*beendet.0.lock(), vec![session.session_id]);

    // Ohne abgelaufene Sessions keine Meldung
    assert_eq!(r.abgelaufene_entfernen(), 0);
    assert_eq!(beendet.0.lock().len(), 1);
}

#[test]
fn cleanup_meldet_abgelaufene_sessions() {
    let r = registry_mit_lebensdauer(Duration::seconds(-1));
    let beendet = Arc::new(Beendet::default());
    r.beobachter_hinzufuegen(beendet.clone());
    r.registrieren("usuario1", "password1", "").expect("Registrierung");
    let a = r.authentifizieren("usuario1", "password1", "10.8.0.5").expect("Login");
    let b = r.authentifizieren("usuario1", "password1", "10.8.0.6").expect("Login");

    assert_eq!(r.abgelaufene_entfernen(), 2);
    let mut gemeldet = beendet.0.lock().clone();
    gemeldet.sort_by_key(|s| s.to_string());
    let mut erwartet = vec![a.session_id, b.session_id];
    erwartet.sort_by_key(|s| s.to_string());
    assert_eq!(gemeldet, erwartet);
}

#[test]
fn gleichzeitige_registrierung_gelingt_genau_einmal() {
    const THREADS: usize = 8;
    let r = registry();
    let protokoll = Arc::new(Protokoll::default());
    r.beobachter_hinzufuegen(protokoll.clone());

    let ergebnisse: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let r = &r;
                scope.spawn(move || r.registrieren("usuario1", &format!("password{i}"), ""))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("Registrier-Thread"))
            .collect()
    });

    assert_eq!(ergebnisse.iter().filter(|e| e.is_ok()).count(), 1);
    assert_eq!(
        ergebnisse
            .iter()
            .filter(|e| matches!(e, Err(AuthError::BenutzernameVergeben(_))))
            .count(),
        THREADS - 1
    );
    assert_eq!(r.identitaeten(), vec![Identitaet::neu("usuario1")]);
    assert_eq!(protokoll.0.lock().len(), 1);
}

#[test]
fn uebergrosse_token_lebensdauer_scheitert_ohne_session() {
    let r = registry_mit_lebensdauer(Duration::MAX);
    r.registrieren("usuario1", "password1", "").expect("Registrierung");

    let err = r.authentifizieren("usuario1", "password1", "10.8.0.5").unwrap_err();
    assert!(matches!(err, AuthError::UngueltigeEingabe(_)), "{err:?}");
    assert_eq!(r.anzahl_sessions(), 0);
    assert_eq!(r.identitaet_fuer_adresse(Ipv4Addr::new(10, 8, 0, 5)), None);
}

#[test]
fn beobachter_und_vorlagen() {
    let r = registry();
    let protokoll = Arc::new(Protokoll::default());
    r.beobachter_hinzufuegen(protokoll.clone());

    let vorlagen = vec![
        BenutzerVorlage {
            username: "usuario1".into(),
            password: "password1".into(),
            display_name: "Usuario 1".into(),
        },
        BenutzerVorlage {
            username: "usuario2".into(),
            password: "password2".into(),
            display_name: "Usuario 2".into(),
        },
    ];
    assert_eq!(r.vorlagen_anlegen(&vorlagen).expect("Vorlagen"), 2);
    // Zweiter Durchlauf ueberspringt vorhandene
    assert_eq!(r.vorlagen_anlegen(&vorlagen).expect("Vorlagen"), 0);

    assert_eq!(
        *protokoll.0.lock(),
        vec![Identitaet::neu("usuario1"), Identitaet::neu("usuario2")]
    );
    assert_eq!(r.identitaeten().len(), 2);
}

#[test]
fn praesenz_setzen() {
    let r = registry();
    r.registrieren("usuario1", "password1", "").expect("Registrierung");
    let id = Identitaet::neu("usuario1");
    r.online_setzen(&id, true);
    assert!(r.benutzer(&id).expect("Profil").online);
    r.online_setzen(&id, false);
    let profil = r.benutzer(&id).expect("Profil");
    assert!(!profil.online);
    assert!(profil.last_seen.is_some());
}

#[tokio::test(start_paused = true)]
async fn cleanup_task_endet_mit_registry() {
    let r = registry_mit_lebensdauer(Duration::seconds(-1));
    r.registrieren("usuario1", "password1", "").expect("Registrierung");
    r.authentifizieren("usuario1", "password1", "10.8.0.5").expect("Login");

    let handle = r.cleanup_starten(std::time::Duration::from_secs(60));
    tokio::time::sleep(std::time::Duration::from_secs(61)).await;
    assert_eq!(r.anzahl_sessions(), 0);

    drop(r);
    tokio::time::timeout(std::time::Duration::from_secs(120), handle)
        .await
        .expect("Cleanup-Task muss nach Drop enden")
        .expect("Cleanup-Task darf nicht paniken");
}
