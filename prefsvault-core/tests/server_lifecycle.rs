//! Lifecycle and data operations through the server's async interface.

mod common;

use common::{key, open_server, temp_root, TEST_KEY};
use prefsvault_core::store::StoragePaths;
use prefsvault_core::{
    DataInterface, HandleState, InitializeOptions, Server, StoreError, Theme, UserAttributes,
    USER_ID_KEY,
};
use serde_json::json;

#[tokio::test]
async fn test_first_run_has_no_user() {
    let root = temp_root();
    let server = open_server(root.path());
    assert_eq!(server.state(), HandleState::Open);
    assert_eq!(server.get_user_info().await, Ok(None));
}

#[tokio::test]
async fn test_state_transitions() {
    let root = temp_root();
    let server = Server::new();
    assert_eq!(server.state(), HandleState::Unopened);

    server
        .initialize(InitializeOptions::new(root.path(), key(TEST_KEY)))
        .expect("initialize");
    assert_eq!(server.state(), HandleState::Open);
    assert_eq!(
        server.initialize(InitializeOptions::new(root.path(), key(TEST_KEY))),
        Err(StoreError::AlreadyInitialized)
    );

    server.close().await.expect("close");
    assert_eq!(server.state(), HandleState::Closed);
    assert_eq!(server.get_user_info().await, Err(StoreError::NotInitialized));

    server
        .initialize(InitializeOptions::new(root.path(), key(TEST_KEY)))
        .expect("fresh initialize after close");
    assert_eq!(server.state(), HandleState::Open);
}

#[tokio::test]
async fn test_data_operations_before_initialize() {
    let server = Server::new();
    assert_eq!(server.get_user_info().await, Err(StoreError::NotInitialized));
    assert_eq!(
        server
            .update_or_create_user(UserAttributes::default())
            .await,
        Err(StoreError::NotInitialized)
    );
    assert_eq!(
        server.set_user_theme(Theme::Light).await,
        Err(StoreError::NotInitialized)
    );
    assert_eq!(server.remove_db().await, Err(StoreError::NoFilePathKnown));
    server.close().await.expect("close is a no-op");
}

#[tokio::test]
async fn test_settings_round_trip_and_persist() {
    let root = temp_root();
    let server = open_server(root.path());
    let user = UserAttributes::with_theme(Theme::Dark)
        .attribute("displayName", "Ada Lovelace")
        .attribute("recent", json!(["a.txt", "b.txt"]));

    server
        .update_or_create_user(user.clone())
        .await
        .expect("upsert");
    server.set_user_theme(Theme::Light).await.expect("theme");
    server.close().await.expect("close");

    let reopened = open_server(root.path());
    let record = reopened
        .get_user_info()
        .await
        .expect("get")
        .expect("record");
    assert_eq!(record.id, USER_ID_KEY);
    assert_eq!(record.user.theme, Theme::Light);
    assert_eq!(record.user.attributes, user.attributes);
}

#[tokio::test]
async fn test_file_is_encrypted_at_rest() {
    let root = temp_root();
    let server = open_server(root.path());
    server
        .update_or_create_user(UserAttributes::default().attribute("secret", "plaintext-marker"))
        .await
        .expect("upsert");
    server.close().await.expect("close");

    let bytes = std::fs::read(StoragePaths::new(root.path()).db_path()).expect("read db");
    assert!(!bytes.starts_with(b"SQLite format 3"));
    assert!(!bytes
        .windows(b"plaintext-marker".len())
        .any(|w| w == b"plaintext-marker"));
}

#[tokio::test]
async fn test_wrong_key_is_storage_open_error() {
    let root = temp_root();
    let server = open_server(root.path());
    server
        .update_or_create_user(UserAttributes::default())
        .await
        .expect("upsert");
    server.close().await.expect("close");

    let other = Server::new();
    let err = other
        .initialize(InitializeOptions::new(root.path(), key("notTheKey")))
        .expect_err("wrong key");
    assert!(matches!(err, StoreError::StorageOpen(_)), "{err:?}");
    assert_eq!(other.state(), HandleState::Closed);
}

#[tokio::test]
async fn test_remove_db_then_reinitialize() {
    let root = temp_root();
    let server = open_server(root.path());
    server
        .update_or_create_user(UserAttributes::with_theme(Theme::Dark))
        .await
        .expect("upsert");
    let paths = StoragePaths::new(root.path());
    assert_eq!(server.database_path(), Some(paths.db_path()));

    server.remove_db().await.expect("remove");
    assert_eq!(server.state(), HandleState::Closed);
    for file in [paths.db_path(), paths.wal_path(), paths.shm_path()] {
        assert!(!file.exists(), "{} still exists", file.display());
    }

    server
        .initialize(InitializeOptions::new(root.path(), key("anotherKey7")))
        .expect("reinitialize");
    assert_eq!(server.get_user_info().await, Ok(None));
}

#[tokio::test]
async fn test_server_as_trait_object() {
    let root = temp_root();
    let server = open_server(root.path());
    let store: &dyn DataInterface = server.as_ref();
    store
        .update_or_create_user(UserAttributes::with_theme(Theme::System))
        .await
        .expect("upsert");
    let record = store.get_user_info().await.expect("get").expect("record");
    assert_eq!(record.user.theme, Theme::System);
}
