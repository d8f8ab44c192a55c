//! Association, listings and HTTP against the scripted module

use wgxlink_communication::{Engine, ManualClock, ScriptedModule, ScriptedTransport, StreamRead};
use wgxlink_core::{
    ConnectionState, EngineConfig, EngineEvent, Error, NetworkError, Protocol, StreamStatus,
    StreamType,
};

fn ready() -> (Engine<ScriptedTransport, ManualClock>, ScriptedModule) {
    let (transport, module) = ScriptedTransport::new();
    let mut engine =
        Engine::new(transport, ManualClock::default(), EngineConfig::default()).unwrap();
    engine.initialize().unwrap();
    module.clear_sent();
    (engine, module)
}

fn connected() -> (Engine<ScriptedTransport, ManualClock>, ScriptedModule) {
    let (mut engine, module) = ready();
    engine.connect(None, None).unwrap();
    module.clear_sent();
    (engine, module)
}

#[test]
fn test_connect_with_credentials() {
    let (mut engine, module) = ready();
    let mut events = engine.subscribe();

    engine.connect(Some("HomeNet"), Some("hunter22")).unwrap();
    assert_eq!(
        module.commands(),
        vec![
            "set wl s HomeNet".to_string(),
            "set wl p hunter22".to_string(),
            "nup -i wlan ".to_string(),
        ]
    );
    assert_eq!(engine.link_state().connection, ConnectionState::ConnectedAp);
    assert_eq!(
        events.try_recv().unwrap(),
        EngineEvent::ConnectionChanged(ConnectionState::ConnectedAp)
    );

    module.respond_to("get wl n s", 0, "1");
    assert!(!engine.is_connected());
    module.respond_to("get wl n s", 0, "2");
    assert!(engine.is_connected());
}

#[test]
fn test_network_info() {
    let (mut engine, module) = connected();
    module.respond_to("get wl n i", 0, "10.0.0.12");
    module.respond_to("get wl s ", 0, "HomeNet");
    module.respond_to("rssi", 0, "-61");

    assert_eq!(engine.ip_address().unwrap(), "10.0.0.12");
    assert_eq!(engine.ssid().unwrap(), "HomeNet");
    assert_eq!(engine.rssi().unwrap(), -61);
}

#[test]
fn test_disconnected_operations() {
    let (mut engine, module) = ready();

    let no_connection =
        |err: Error| matches!(err, Error::Network(NetworkError::NoConnection));
    assert!(no_connection(engine.ip_address().unwrap_err()));
    assert!(no_connection(engine.ssid().unwrap_err()));
    assert!(no_connection(
        engine.http_get(0, "http://example.com/").unwrap_err()
    ));
    assert!(no_connection(
        engine
            .open_client(0, Protocol::Tcp, "10.0.0.2", 80, 0)
            .unwrap_err()
    ));
    assert!(no_connection(
        engine.start_server(Protocol::Udp, 5000).unwrap_err()
    ));
    assert!(!engine.is_connected());
    assert!(module.commands().is_empty());

    // nothing to bring down
    engine.disconnect().unwrap();
    assert!(module.commands().is_empty());
}

#[test]
fn test_disconnect_releases_network_streams_only() {
    let (mut engine, module) = connected();

    module.reply(0, "2");
    engine
        .open_client(0, Protocol::Tcp, "10.0.0.2", 80, 0)
        .unwrap();
    engine.stream_wait(0).unwrap();
    module.reply(0, "3");
    engine.open_file(1, "settings.json").unwrap();
    module.clear_sent();

    engine.disconnect().unwrap();

    assert_eq!(module.commands(), vec!["ndo -i wlan ".to_string()]);
    assert_eq!(engine.link_state().connection, ConnectionState::Disconnected);
    assert!(!engine.streams().slot(0).unwrap().is_open());
    assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::Closed);
    assert_eq!(engine.streams().slot(1).unwrap().handle, 3);
    assert_eq!(
        engine.streams().slot(1).unwrap().stream_type,
        StreamType::File
    );
}

#[test]
fn test_soft_ap() {
    let (mut engine, module) = ready();
    engine.start_soft_ap("Gadget", "password1").unwrap();

    assert_eq!(
        module.commands(),
        vec![
            "set so s Gadget".to_string(),
            "set so p password1".to_string(),
            "nup -i softap ".to_string(),
        ]
    );
    assert!(engine.is_connected());

    module.respond_to("get so s i", 0, "10.10.10.1");
    assert_eq!(engine.ip_address().unwrap(), "10.10.10.1");

    module.clear_sent();
    module.reply(0, "7");
    module.reply(0, "clients 2");
    assert_eq!(engine.soft_ap_client_count().unwrap(), 2);
    assert_eq!(
        module.commands(),
        vec![
            "get so o".to_string(),
            format!("read {:>7}{:>7}", 7, 64),
            format!("close {:>7}", 7),
        ]
    );

    module.reply(0, "7");
    module.reply(0, "channel 6");
    assert_eq!(engine.soft_ap_client_count().unwrap(), 0);
}

#[test]
fn test_scan() {
    let (mut engine, module) = connected();

    module.reply(0, "4");
    module.reply(0, "! 2 networks");
    module.reply(0, "! # Ch RSSI MAC (BSSID)       SSID");
    module.reply(0, "#  0  1  -72 FE:EC:DA:81:30:32 SiliconLabsGuest");
    module.reply(0, "#  1 11  -48 10:00:E8:6C:A0:01 HomeNet");
    engine.scan_wifi(0).unwrap();
    assert_eq!(engine.streams().slot(0).unwrap().stream_type, StreamType::Command);

    let mut found = Vec::new();
    while let Some(entry) = engine.read_scan_entry(0).unwrap() {
        found.push(entry);
    }

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].ssid, "SiliconLabsGuest");
    assert_eq!(found[0].rssi, -72);
    assert_eq!(found[1].ssid, "HomeNet");
    assert_eq!(found[1].channel, 11);
    assert_eq!(found[1].mac, "10:00:E8:6C:A0:01");

    let json = serde_json::to_value(&found[1]).unwrap();
    assert_eq!(json["ssid"], "HomeNet");

    engine.stream_close(0).unwrap();
    assert_eq!(
        module.commands().last().cloned(),
        Some(format!("close {:>7}", 4))
    );
}

#[test]
fn test_file_listing() {
    let (mut engine, module) = ready();

    module.reply(0, "3");
    module.reply(0, "!  #    Size  Version Filename");
    module.reply(0, "#  0   1995     1.5.0  webapp/index.html");
    module.reply(0, "#  1  22670     1.5.0  webapp/app.css.gz");
    engine.list_files(2).unwrap();

    let first = engine.read_file_list_entry(2).unwrap().unwrap();
    assert_eq!(first.name, "webapp/index.html");
    assert_eq!(first.size, 1995);
    let second = engine.read_file_list_entry(2).unwrap().unwrap();
    assert_eq!(second.size, 22670);
    assert_eq!(engine.read_file_list_entry(2).unwrap(), None);
    assert_eq!(engine.read_file_list_entry(2).unwrap(), None);

    // files need no network
    assert_eq!(engine.link_state().connection, ConnectionState::Disconnected);
}

#[test]
fn test_create_and_write_file() {
    let (mut engine, module) = ready();

    module.reply(0, "6");
    engine.create_file(0, "log.txt", 120).unwrap();
    assert_eq!(
        module.commands(),
        vec![format!("fcr -o log.txt{:>7}", 120)]
    );
    assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::Ok);

    assert_eq!(engine.stream_write_str(0, "boot ok").unwrap(), 7);

    engine.stream_close(0).unwrap();
    assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::Closed);
    assert!(!engine.streams().slot(0).unwrap().is_open());
}

#[test]
fn test_rejected_file_open_leaves_slot_free() {
    let (mut engine, module) = ready();

    module.reply(5, "");
    let err = engine.open_file(0, "missing.txt").unwrap_err();
    assert_eq!(err.rejection_code(), Some(5));
    assert!(!engine.streams().slot(0).unwrap().is_open());
    assert_eq!(
        module.commands(),
        vec!["fop missing.txt".to_string()]
    );
}

#[test]
fn test_http_get() {
    let (mut engine, module) = connected();

    module.reply(0, "6");
    engine.http_get(1, "http://example.com/").unwrap();
    let slot = *engine.streams().slot(1).unwrap();
    assert_eq!(slot.stream_type, StreamType::Http);
    assert_eq!(slot.handle, 6);
    assert_eq!(slot.status, StreamStatus::Ok);
    assert_eq!(
        module.commands(),
        vec!["hge  -i wlan http://example.com/".to_string()]
    );

    module.reply(0, "<html>");
    let mut body = [0u8; 32];
    assert_eq!(engine.stream_read(1, &mut body).unwrap(), StreamRead::Data(6));
    assert_eq!(&body[..6], b"<html>");
}

#[test]
fn test_http_post_failure_marks_slot() {
    let (mut engine, module) = connected();

    module.reply(3, "");
    let err = engine
        .http_post(0, "http://example.com/api", "application/json")
        .unwrap_err();
    assert_eq!(err.rejection_code(), Some(3));
    assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::Error);
    assert_eq!(
        module.commands(),
        vec!["hpo  -i wlan http://example.com/api application/json".to_string()]
    );
}

#[test]
fn test_sleep_disconnects_first() {
    let (mut engine, module) = connected();
    module.set_answer_pings(false);

    engine.sleep(10).unwrap();
    let commands = module.commands();
    assert_eq!(commands[0], format!("set sy w t {:>7}", 10));
    assert_eq!(commands[1], "ndo -i wlan ");
    assert_eq!(commands[2], "sleep");
    assert!(engine.is_busy());
    assert_eq!(engine.link_state().connection, ConnectionState::Disconnected);
}
