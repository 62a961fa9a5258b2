pub mod app;
pub mod backup;
pub mod cli;
pub mod config;
pub mod deadline;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
