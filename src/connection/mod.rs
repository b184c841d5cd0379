pub mod config;

pub use config::{AdapterConfig, BackendKind, DEFAULT_PORT};
