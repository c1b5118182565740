use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::registry::{Properties, RegistryError, ServiceUrl, UrlError};

#[derive(Debug, thiserror::Error)]
pub enum RestartError {
    #[error("failed to read restart state {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("restart state {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write restart state {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("restart state holds an invalid service url: {0}")]
    InvalidUrl(#[from] UrlError),
    #[error("failed to re-register from restart state: {0}")]
    Register(#[from] RegistryError),
}

/// The registration this instance made the last time it configured successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartState {
    #[serde(rename = "serviceURL", alias = "serviceUrl")]
    pub service_url: String,
    #[serde(default)]
    pub service_properties: Properties,
}

impl RestartState {
    pub fn url(&self) -> Result<ServiceUrl, RestartError> {
        Ok(self.service_url.parse()?)
    }
}

/// Single-record JSON file holding a `RestartState`.
#[derive(Debug, Clone)]
pub struct RestartStore {
    path: PathBuf,
}

impl RestartStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// `Ok(None)` when no state was ever saved. An unreadable or unparsable file is an error.
    pub fn load(&self) -> Result<Option<RestartState>, RestartError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RestartError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let state = serde_json::from_slice(&raw).map_err(|source| RestartError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(state))
    }

    /// Replaces the stored state atomically (tmp file then rename).
    pub fn save(&self, state: &RestartState) -> Result<(), RestartError> {
        let write_err = |source: io::Error| RestartError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let data = serde_json::to_vec_pretty(state)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "restart".to_string());
        let tmp_path = self.path.with_file_name(format!("{}.tmp", name));

        let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
        file.write_all(&data).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);
        fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        info!(
            component = "restart",
            event = "saved",
            path = %self.path.display(),
            url = %state.service_url,
            "restart state saved"
        );
        Ok(())
    }
}
