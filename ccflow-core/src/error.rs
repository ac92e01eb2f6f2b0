use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CcflowError {
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cannot determine home directory")]
    HomeDirectoryNotFound,

    #[error("session not found for session_id={session_id}")]
    SessionNotFound {
        session_id: String,
        searched_roots: Vec<PathBuf>,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CcflowError>;
