use crate::store::DEFAULT_TASKS_FILE;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_LOG_FILE: &str = "tasks.log";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tasks_file: PathBuf,
    pub log_file: PathBuf,
    pub log_filter: String,
}

impl Config {
    /// Reads settings from the process environment. Call `dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Config {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Config {
            tasks_file: PathBuf::from(var("TASKS_FILE", DEFAULT_TASKS_FILE)),
            log_file: PathBuf::from(var("TASKS_LOG_FILE", DEFAULT_LOG_FILE)),
            log_filter: var("RUST_LOG", DEFAULT_LOG_FILTER),
        }
    }
}
