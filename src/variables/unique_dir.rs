//! Fresh per-attempt directories exposed as variables.

use std::fs;
use std::io;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::UniqueDirectory;

/// Creates `base/<prefix><uuid><suffix>` and returns its canonical path.
///
/// The base is created if missing; the leaf must not exist yet.
pub fn create_unique_directory(definition: &UniqueDirectory) -> io::Result<PathBuf> {
    fs::create_dir_all(&definition.base)?;
    let name = format!("{}{}{}", definition.prefix, Uuid::new_v4().simple(), definition.suffix);
    let dir = definition.base.join(name);
    fs::create_dir(&dir)?;
    dir.canonicalize()
}
