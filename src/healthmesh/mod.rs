pub mod agents;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod error;
pub mod history_store;
pub mod intent;
pub mod key_pool;
pub mod knowledge;
pub mod memory;
pub mod orchestrator;
#[cfg(feature = "server")]
pub mod server;
pub mod streaming;
