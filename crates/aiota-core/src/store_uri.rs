//! Shared store URI resolution.
//!
//! The launcher and the controller it starts locate the same store through a
//! URI, so the value has to round-trip through `Display` unchanged.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreUri {
    /// On-disk redb file: redb:///var/lib/aiota/aiota.redb, file:///..., or a bare path.
    Redb { path: PathBuf },
    /// Ephemeral in-process store: memory:
    Memory,
}

impl StoreUri {
    pub fn parse(uri: &str) -> CoreResult<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(CoreError::InvalidUri(uri.to_string()));
        }

        if uri == "memory:" || uri == "memory://" {
            Ok(StoreUri::Memory)
        } else if let Some(path) = uri.strip_prefix("redb://") {
            Self::file(uri, path)
        } else if let Some(path) = uri.strip_prefix("file://") {
            Self::file(uri, path)
        } else if uri.starts_with('/') || uri.starts_with("./") || uri.ends_with(".redb") {
            Self::file(uri, uri)
        } else {
            let scheme = uri.split_once("://").map(|(s, _)| s).unwrap_or(uri);
            Err(CoreError::UnsupportedScheme(scheme.to_string()))
        }
    }

    fn file(uri: &str, path: &str) -> CoreResult<Self> {
        if path.is_empty() {
            return Err(CoreError::InvalidUri(uri.to_string()));
        }
        Ok(StoreUri::Redb {
            path: PathBuf::from(path),
        })
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            StoreUri::Redb { .. } => "redb",
            StoreUri::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreUri::Redb { path } => write!(f, "redb://{}", path.display()),
            StoreUri::Memory => f.write_str("memory:"),
        }
    }
}

impl std::str::FromStr for StoreUri {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
