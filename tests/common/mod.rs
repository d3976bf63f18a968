#![allow(dead_code)]

use farmified_messaging::libs::storage::database::storage_sqlite::SqliteStore;
use farmified_messaging::{MessagingService, NewUser, UserRecord, UserType};
use tempfile::TempDir;

pub const ALICE: &str = "a@x.com";
pub const BOB: &str = "b@x.com";
pub const CAROL: &str = "c@x.com";

/// Keeps the temp directory alive for as long as the store is used.
pub struct TestContext {
    pub dir: TempDir,
    pub store: SqliteStore,
    pub service: MessagingService,
}

pub fn setup() -> TestContext {
    let dir = TempDir::new().expect("Failed to create test directory");
    let db_path = dir.path().join("messaging.db");
    let store = SqliteStore::open(db_path.to_str().expect("Non utf8 temp path"), 8)
        .expect("Failed to open store");
    let service = MessagingService::new(store.clone());

    TestContext { dir, store, service }
}

/// Fresh store with Alice, Bob and Carol registered.
pub fn setup_with_users() -> TestContext {
    let ctx = setup();
    seed_user(&ctx.service, "Alice", ALICE, "555-0001", UserType::Farmer);
    seed_user(&ctx.service, "Bob", BOB, "555-0002", UserType::Consumer);
    seed_user(&ctx.service, "Carol", CAROL, "555-0003", UserType::Consumer);
    ctx
}

pub fn seed_user(
    service: &MessagingService,
    first_name: &str,
    email: &str,
    phone: &str,
    user_type: UserType,
) -> UserRecord {
    service
        .create_user(NewUser::new(first_name, "Tester", email, phone, user_type))
        .unwrap_or_else(|e| panic!("Failed to create {email}: {e}"))
}
