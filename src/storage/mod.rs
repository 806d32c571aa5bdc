pub mod kvstore;
pub mod mem_store;
pub mod log_store;
pub mod wal;
pub mod file_lock;
pub mod layout;
pub mod registry;
