use std::path::PathBuf;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("usage: aggr @username")]
    MissingUsername,
    #[error("empty username")]
    EmptyUsername,
    #[error("unexpected argument {0:?}")]
    UnexpectedArgument(String),
    #[error("invalid username {0:?}")]
    InvalidUsername(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cached feed at {}", .0.display())]
    NotFound(PathBuf),
    #[error("decode cached feed at {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache i/o at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status received from {method} {url}, got {}", .status.as_u16())]
    HttpStatus {
        method: String,
        url: String,
        status: StatusCode,
    },
    #[error("parse feed from {url}")]
    Parse {
        url: String,
        #[source]
        source: crate::feed::ParseError,
    },
}

impl RefreshError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RefreshError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
