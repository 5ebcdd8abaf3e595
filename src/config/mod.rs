//! Configuration module
//!
//! Handles application settings and per-session connection configuration

mod settings;

pub use settings::{
    available_baud_rates, seconds, AppConfig, BaudRate, ConnectionConfig, ConnectionSettings,
    LineTerminator, LoggingSettings, PollingSettings, DEFAULT_BAUD_RATE, STANDARD_BAUD_RATES,
};

use directories::ProjectDirs;
use std::path::PathBuf;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "serialbridge", "Serialbridge")
}

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default configuration file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Get the application data directory
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the log directory
pub fn log_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("logs"))
}
