//! Builds a `VariableContext` from six layers; later layers override earlier ones:
//! constants, unique directories, singletons, collections, ordering index, overrides.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use crate::config::UniqueDirectory;
use crate::registry::RegistryError;

use super::context::{ServiceModel, Value, VariableContext};
use super::unique_dir::create_unique_directory;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to create unique directory for {variable:?} under {base:?}: {source}")]
    UniqueDirectory {
        variable: String,
        base: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("requirement {0:?} has no discovered service")]
    Undiscovered(String),
    #[error("this instance is not a member of ordering collection {collection:?}")]
    NotInOrderingCollection { collection: String },
    #[error("failed to publish ordering index: {0}")]
    PropertyUpdate(#[from] RegistryError),
}

/// Snapshot of everything resolution needs.
#[derive(Debug, Default)]
pub struct ResolveInputs<'a> {
    pub constants: Option<&'a BTreeMap<String, String>>,
    pub unique_directories: &'a [UniqueDirectory],
    pub singletons: Vec<(String, ServiceModel)>,
    pub collections: Vec<(String, Vec<ServiceModel>)>,
    /// Variable name and this instance's 1-based index.
    pub ordering: Option<(String, String)>,
    pub overrides: Option<&'a BTreeMap<String, String>>,
}

pub fn resolve(inputs: ResolveInputs<'_>) -> Result<VariableContext, ResolveError> {
    let mut ctx = VariableContext::new();

    if let Some(constants) = inputs.constants {
        for (name, value) in constants {
            ctx.insert(name.clone(), Value::Text(value.clone()));
        }
    }

    for unique in inputs.unique_directories {
        let dir = create_unique_directory(unique).map_err(|source| ResolveError::UniqueDirectory {
            variable: unique.variable.clone(),
            base: unique.base.clone(),
            source,
        })?;
        debug!(
            component = "variables",
            event = "unique_directory",
            variable = %unique.variable,
            path = %dir.display(),
            "created unique directory"
        );
        ctx.insert(unique.variable.clone(), Value::Path(dir));
    }

    for (name, service) in inputs.singletons {
        ctx.insert(name, Value::Service(service));
    }

    for (name, members) in inputs.collections {
        ctx.insert(name, Value::Cluster(members));
    }

    if let Some((name, index)) = inputs.ordering {
        ctx.insert(name, Value::Text(index));
    }

    if let Some(overrides) = inputs.overrides {
        for (name, value) in overrides {
            if ctx.insert(name.clone(), Value::Text(value.clone())).is_some() {
                debug!(component = "variables", event = "override", variable = %name, "runtime override replaced variable");
            }
        }
    }

    Ok(ctx)
}
