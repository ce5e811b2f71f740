pub mod config;

pub use config::{resolve_data_dir, EngineConfig};
