pub mod core;
pub mod error;
pub mod messaging;
pub mod server;
pub mod storage;
pub mod sync;
