use lmdbview::notice::Level;
use lmdbview::session::{Action, Effect, PageTarget, Session, SessionOptions};
use lmdbview::settings::{ConnectionConfig, ConnectionDraft, Settings};
use lmdbview::store::{KvStore, LmdbConnector, LmdbStore};
use std::path::Path;
use tempfile::TempDir;

fn seed_database<K, V>(path: &Path, entries: &[(K, V)])
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let store = LmdbStore::open(path, 1 << 30).unwrap();
    for (key, value) in entries {
        store.put(key.as_ref(), value.as_ref()).unwrap();
    }
    Box::new(store).close().unwrap();
}

fn connection(name: &str, dir: &TempDir) -> ConnectionConfig {
    ConnectionConfig {
        name: name.to_string(),
        database_path: dir.path().display().to_string(),
        map_size_gb: 1,
    }
}

fn lmdb_session(page_size: usize) -> Session {
    Session::new(
        Box::new(LmdbConnector),
        SessionOptions {
            page_size,
            hide_key_prefix: false,
        },
    )
    .unwrap()
}

fn shown_keys(session: &Session) -> Vec<String> {
    session.rows().iter().map(|r| r.key.clone()).collect()
}

fn has_error(effects: &[Effect]) -> bool {
    effects
        .iter()
        .any(|e| matches!(e, Effect::Notice(n) if n.level == Level::Error))
}

#[test]
fn test_prefix_pages_over_lmdb() {
    let dir = TempDir::new().unwrap();
    seed_database(dir.path(), &[("a:1", "x"), ("a:2", "y"), ("b:1", "z")]);

    let mut session = lmdb_session(1);
    let effects = session.dispatch(Action::Connect(connection("local", &dir)));
    assert!(!has_error(&effects));
    assert_eq!(session.total_records(), 3);

    session.dispatch(Action::SetPrefix("a:".to_string()));
    assert_eq!(session.total_records(), 2);
    assert_eq!(session.total_pages(), 2);
    assert_eq!(shown_keys(&session), vec!["a:1"]);

    session.dispatch(Action::GoToPage(PageTarget::Next));
    assert_eq!(shown_keys(&session), vec!["a:2"]);

    session.dispatch(Action::ClearPrefix);
    assert_eq!(session.total_records(), 3);
    assert_eq!(session.current_page(), 1);

    session.dispatch(Action::Disconnect);
}

#[test]
fn test_page_input_bounds_over_lmdb() {
    let dir = TempDir::new().unwrap();
    let entries: Vec<(String, String)> = (0..25)
        .map(|i| (format!("key:{:02}", i), format!("value {}", i)))
        .collect();
    seed_database(dir.path(), &entries);

    let mut session = lmdb_session(10);
    session.dispatch(Action::Connect(connection("local", &dir)));
    assert_eq!(session.total_pages(), 3);

    assert!(has_error(&session.dispatch(Action::GoToPageInput("0".to_string()))));
    assert!(has_error(&session.dispatch(Action::GoToPageInput("4".to_string()))));
    assert_eq!(session.current_page(), 1);

    session.dispatch(Action::GoToPageInput("3".to_string()));
    assert_eq!(session.current_page(), 3);
    assert_eq!(shown_keys(&session), vec!["key:20", "key:21", "key:22", "key:23", "key:24"]);

    session.dispatch(Action::Disconnect);
}

#[test]
fn test_inserted_key_counted_after_refresh() {
    let dir = TempDir::new().unwrap();
    seed_database(dir.path(), &[("a:1", "x"), ("a:2", "y"), ("b:1", "z")]);

    let mut session = lmdb_session(10);
    session.dispatch(Action::Connect(connection("local", &dir)));
    session.dispatch(Action::SetPrefix("a:".to_string()));
    assert_eq!(session.total_records(), 2);

    session.dispatch(Action::SaveRow {
        key: b"a:3".to_vec(),
        value: "new".to_string(),
    });
    assert_eq!(shown_keys(&session), vec!["a:1", "a:2", "a:3"]);
    assert_eq!(session.total_records(), 2);

    let effects = session.dispatch(Action::Refresh);
    assert!(!has_error(&effects));
    assert_eq!(session.total_records(), 3);

    session.dispatch(Action::Disconnect);
}

#[test]
fn test_edit_and_delete_round_trip() {
    let dir = TempDir::new().unwrap();
    seed_database(
        dir.path(),
        &[("users:1", r#"{"name":"ada","langs":["en"]}"#), ("users:2", "plain")],
    );

    let mut session = Session::new(Box::new(LmdbConnector), SessionOptions::default()).unwrap();
    session.dispatch(Action::Connect(connection("local", &dir)));
    session.dispatch(Action::SetPrefix("users:".to_string()));
    assert_eq!(shown_keys(&session), vec!["1", "2"]);

    let effects = session.dispatch(Action::OpenRow(0));
    let Some(Effect::ValueLoaded { key, text }) = effects.first() else {
        panic!("expected a loaded value, got {:?}", effects);
    };
    assert_eq!(key, b"users:1");
    assert!(text.contains("\n  \"name\": \"ada\""));

    let key = session.stored_key(1).unwrap().to_vec();
    let effects = session.dispatch(Action::DeleteRow { key });
    assert!(!has_error(&effects));
    assert_eq!(shown_keys(&session), vec!["1"]);

    session.dispatch(Action::Disconnect);

    let store = LmdbStore::open(dir.path(), 1 << 30).unwrap();
    assert_eq!(store.get(b"users:2").unwrap(), None);
    assert!(store.get(b"users:1").unwrap().is_some());
    Box::new(store).close().unwrap();
}

#[test]
fn test_binary_key_round_trip_over_lmdb() {
    let dir = TempDir::new().unwrap();
    seed_database(
        dir.path(),
        &[(&b"raw:\x00\xfe"[..], &b"bytes"[..]), (&b"raw:text"[..], &b"ok"[..])],
    );

    let mut session = lmdb_session(10);
    session.dispatch(Action::Connect(connection("local", &dir)));
    session.dispatch(Action::SetPrefix("raw:".to_string()));
    assert_eq!(session.total_records(), 2);

    let effects = session.dispatch(Action::OpenRow(0));
    assert!(!has_error(&effects), "{:?}", effects);

    let key = session.stored_key(0).unwrap().to_vec();
    assert_eq!(key, b"raw:\x00\xfe");
    let effects = session.dispatch(Action::DeleteRow { key });
    assert!(!has_error(&effects), "{:?}", effects);
    assert_eq!(shown_keys(&session), vec!["raw:text"]);

    session.dispatch(Action::Disconnect);
}

#[test]
fn test_switching_connections_releases_environment() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    seed_database(first.path(), &[("one", "1")]);
    seed_database(second.path(), &[("two", "2"), ("three", "3")]);

    let mut session = lmdb_session(10);
    session.dispatch(Action::Connect(connection("first", &first)));
    assert_eq!(session.total_records(), 1);

    session.dispatch(Action::Connect(connection("second", &second)));
    assert_eq!(session.total_records(), 2);

    // The first environment is closed, so it can be opened again.
    let store = LmdbStore::open(first.path(), 1 << 30).unwrap();
    assert_eq!(store.get(b"one").unwrap(), Some(b"1".to_vec()));
    Box::new(store).close().unwrap();

    session.dispatch(Action::Disconnect);
}

#[test]
fn test_missing_database_path() {
    let dir = TempDir::new().unwrap();
    let missing = ConnectionConfig {
        name: "missing".to_string(),
        database_path: dir.path().join("nope").display().to_string(),
        map_size_gb: 1,
    };

    let mut session = lmdb_session(10);
    let effects = session.dispatch(Action::Connect(missing.clone()));
    assert!(has_error(&effects));
    assert!(!session.is_connected());
    assert!(session.probe(&missing).is_err());
}

#[test]
fn test_connection_settings_persist() {
    let db_dir = TempDir::new().unwrap();
    seed_database(db_dir.path(), &[("k", "v")]);
    let settings_dir = TempDir::new().unwrap();
    let settings_path = settings_dir.path().join("lmdbview").join("settings.toml");

    let draft = ConnectionDraft {
        name: "local".to_string(),
        database_path: db_dir.path().display().to_string(),
        map_size_gb: "2".to_string(),
    };
    let config = draft.validate().unwrap();

    let session = lmdb_session(10);
    session.probe(&config).unwrap();

    let mut settings = Settings::default();
    settings.add_connection(config.clone());
    settings.ui.page_size = 50;
    settings.save(&settings_path).unwrap();

    let loaded = Settings::load(&settings_path).unwrap();
    assert_eq!(loaded.find_connection("local"), Some(&config));
    assert_eq!(loaded.ui.page_size, 50);
    assert_eq!(SessionOptions::from(&loaded.ui).page_size, 50);
}
