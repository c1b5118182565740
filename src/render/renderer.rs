use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Template;
use crate::variables::VariableContext;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to read template group {path:?}: {source}")]
    Group {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template group {path:?} is malformed: {reason}")]
    MalformedGroup { path: PathBuf, reason: String },
    #[error("template {template:?} not found in group {group:?}")]
    TemplateNotFound { template: String, group: PathBuf },
    #[error("template {template:?} references undefined variable {placeholder:?}")]
    Undefined { template: String, placeholder: String },
    #[error("failed to write generated file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a template plus variables into configuration text.
pub trait Renderer: Send + Sync {
    fn render(&self, template: &Template, variables: &VariableContext) -> Result<String, RenderError>;
}

/// Writes `text` to `path` through a sibling `.tmp` file, creating parent directories.
pub fn write_generated(path: &Path, text: &str) -> Result<(), RenderError> {
    let write_err = |source: std::io::Error| RenderError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "generated".to_string());
    let tmp_path = path.with_file_name(format!("{}.tmp", name));

    let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
    file.write_all(text.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(write_err)
}
