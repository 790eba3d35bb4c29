pub mod config;

pub use config::ExtractionConfig;
