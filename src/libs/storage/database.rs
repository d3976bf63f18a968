pub mod database;
pub mod storage_sqlite;
pub mod storage_traits;
