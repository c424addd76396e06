use convene_crypto::{generate_data_key, seal, Envelope};
use convene_storage::{render_csv, BackendConfig, MeetingStore, StoreBackend};
use convene_types::{now_ms, Meeting, Registrant};

fn registrant(first: &str, last: &str) -> Registrant {
    Registrant {
        id: convene_types::new_id(),
        first_name: first.into(),
        last_name: last.into(),
        address: "1 Main St".into(),
        zip: "10115".into(),
        city: "Berlin".into(),
        country: "DE".into(),
        created_at: now_ms(),
    }
}

#[test]
fn store_survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.duckdb");
    let key = generate_data_key();
    let meeting = Meeting::new("Persistence Check", "2026-10-01", "p-1");

    {
        let store = MeetingStore::open("m-1", &path).unwrap();
        store.write_meta(&meeting).unwrap();
        store.insert_registrant(&key, &registrant("Ada", "Lovelace")).unwrap();
    }

    let reopened = MeetingStore::open("m-1", &path).unwrap();
    let meta = reopened.read_meta().unwrap().unwrap();
    assert_eq!(meta.title, "Persistence Check");

    let registrants = reopened.list_registrants(&key).unwrap();
    assert_eq!(registrants.len(), 1);
    assert_eq!(registrants[0].first_name, "Ada");
}

#[test]
fn wrapped_keys_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.duckdb");
    let envelope = seal(b"principal secret", b"meeting data key bytes..32bytes!").unwrap();

    {
        let store = MeetingStore::open("m-1", &path).unwrap();
        store.upsert_wrapped_key("p-1", "owner@example.com", &envelope).unwrap();
    }

    let reopened = MeetingStore::open("m-1", &path).unwrap();
    let row = reopened.wrapped_key_for("p-1").unwrap().unwrap();
    assert_eq!(row.principal_email, "owner@example.com");
    assert_eq!(row.envelope(), envelope);
    assert!(reopened.wrapped_key_for("p-2").unwrap().is_none());
}

#[test]
fn remove_wrapped_key_reports_existence() {
    let store = MeetingStore::open_in_memory("m-1").unwrap();
    let envelope = Envelope { iv: vec![0; 16], ciphertext: vec![1; 32] };
    store.upsert_wrapped_key("p-1", "a@example.com", &envelope).unwrap();

    assert!(store.remove_wrapped_key("p-1").unwrap());
    assert!(!store.remove_wrapped_key("p-1").unwrap());
}

#[tokio::test]
async fn backend_create_then_open_sees_same_store() {
    let dir = tempfile::tempdir().unwrap();
    let backend = BackendConfig::Folder { root: dir.path().to_path_buf() }.build();

    let key = generate_data_key();
    {
        let created = backend.create("m-shared").await.unwrap();
        created.insert_registrant(&key, &registrant("Grace", "Hopper")).unwrap();
        // The store holds the database's file lock until the handle drops;
        // a second connection must wait for it.
    }

    let opened = backend.open("m-shared").await.unwrap();
    assert_eq!(opened.count_registrants().unwrap(), 1);

    // Clones of one handle share the connection and observe each other.
    let twin = opened.clone();
    twin.insert_registrant(&key, &registrant("Ada", "Lovelace")).unwrap();
    assert_eq!(opened.count_registrants().unwrap(), 2);
}

#[test]
fn export_full_pipeline() {
    let store = MeetingStore::open_in_memory("m-1").unwrap();
    let key = generate_data_key();
    let mut meeting = Meeting::new("Board Meeting", "2026-11-05", "p-1");
    meeting.id = "m-1".into();

    let mut first = registrant("Ada", "Lovelace");
    first.created_at = 1;
    let mut second = registrant("Grace", "Hopper");
    second.created_at = 2;
    store.insert_registrant(&key, &first).unwrap();
    store.insert_registrant(&key, &second).unwrap();

    let registrants = store.list_registrants(&key).unwrap();
    let (filename, bytes) = render_csv(&meeting, &registrants);

    assert_eq!(filename, "exportedMeeting-2026-11-05-board_meeting.csv");
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.trim_start_matches('\u{FEFF}').lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("Ada,Lovelace,"));
    assert!(lines[2].starts_with("Grace,Hopper,"));
}
