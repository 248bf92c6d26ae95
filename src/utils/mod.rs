//! # Utility Functions (`utils`)
//!
//! File IO helpers (binary, JSON, YAML) and the logger factory.

pub mod logging;
pub mod serialization;

pub use logging::{get_logger, get_logger_with_level, LogLevel, Logger, LoggerConfig, LoggerError};
pub use serialization::{
    load_json, load_pickle, load_yaml, save_json, save_pickle, save_yaml, SerializationError,
};
