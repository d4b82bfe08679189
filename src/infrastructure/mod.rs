pub mod config;
pub mod error;
pub mod local_store;
pub mod ops_log;
pub mod remote_store;
pub mod storage;
