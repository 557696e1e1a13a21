use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::USERNAME_PLACEHOLDER;
use crate::error::CacheError;
use crate::feed::Feed;

const FILE_PREFIX: &str = "aggr-cli-feed-";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    username: String,
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) etag: Option<String>,
    #[serde(
        default,
        rename = "lastmodified",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) feed: Option<Feed>,
}

impl Record {
    pub fn new(username: &str, url_template: &str) -> Self {
        Self {
            username: username.to_string(),
            url: url_template.replace(USERNAME_PLACEHOLDER, username),
            etag: None,
            last_modified: None,
            feed: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref().filter(|etag| !etag.is_empty())
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref().filter(|lm| !lm.is_empty())
    }

    pub fn feed(&self) -> Option<&Feed> {
        self.feed.as_ref()
    }

    pub fn into_feed(self) -> Option<Feed> {
        self.feed
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{username}"))
    }

    pub fn load(&self, username: &str) -> Result<Record, CacheError> {
        let path = self.path_for(username);
        let data = fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => CacheError::NotFound(path.clone()),
            _ => CacheError::Io {
                path: path.clone(),
                source,
            },
        })?;
        let record: Record =
            serde_json::from_slice(&data).map_err(|source| CacheError::Decode {
                path: path.clone(),
                source,
            })?;
        // A file renamed by hand must not hand out another user's record.
        if record.username != username {
            return Err(CacheError::NotFound(path));
        }
        Ok(record)
    }

    pub fn load_or_create(&self, username: &str, url_template: &str) -> Record {
        match self.load(username) {
            Ok(record) => {
                tracing::debug!(username, path = %self.path_for(username).display(), "loaded cached feed");
                record
            }
            Err(err) => {
                tracing::debug!(username, error = %err, "starting with a fresh cache record");
                Record::new(username, url_template)
            }
        }
    }

    // Written next to its final location, then renamed into place.
    pub fn save(&self, record: &Record) -> Result<PathBuf, CacheError> {
        let path = self.path_for(&record.username);
        let io_err = |source: io::Error| CacheError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        serde_json::to_writer(&mut file, record).map_err(|err| io_err(err.into()))?;
        file.write_all(b"\n").map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;
        file.persist(&path).map_err(|err| io_err(err.error))?;

        Ok(path)
    }
}
