use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid scope: {0} (expected <release>/<component>)")]
    InvalidScope(String),

    #[error("Unknown version order: {0}")]
    UnknownVersionOrder(String),

    #[error("Failed to persist state for {scope}: {source}")]
    Persist {
        scope: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a backend failure with the scope it was writing.
    pub fn persist(scope: impl std::fmt::Display, source: Error) -> Self {
        Error::Persist {
            scope: scope.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
