use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Rejected user input. The caller is expected to ask again.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Task title cannot be empty.")]
    EmptyTitle,
    #[error("Invalid date '{0}'. Please use DD.MM.YYYY.")]
    InvalidDate(String),
    #[error("Invalid priority '{0}'. Please choose 1-3.")]
    InvalidPriority(String),
    #[error("Invalid status '{0}'. Please choose 1-3.")]
    InvalidStatus(String),
    #[error("Invalid ID '{0}'. Please enter a number.")]
    InvalidId(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("No task with ID {0}.")]
    NotFound(u32),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("could not encode tasks: {0}")]
    Encode(#[source] serde_json::Error),
}
