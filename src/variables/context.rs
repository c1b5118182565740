//! Values visible to templates.

use serde::Serialize;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::path::PathBuf;

use crate::registry::Properties;

/// Host, port and properties of one discovered (or the local) service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceModel {
    pub host: String,
    pub port: u16,
    pub properties: Properties,
}

impl ServiceModel {
    /// Looks up `host`, `port` or a property by name.
    pub fn lookup(&self, field: &str) -> Option<String> {
        match field {
            "host" => Some(self.host.clone()),
            "port" => Some(self.port.to_string()),
            _ => self.properties.get(field).cloned(),
        }
    }
}

impl fmt::Display for ServiceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Path(PathBuf),
    Service(ServiceModel),
    /// Collection members in total order.
    Cluster(Vec<ServiceModel>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Path(path) => write!(f, "{}", path.display()),
            Value::Service(service) => service.fmt(f),
            Value::Cluster(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    member.fmt(f)?;
                }
                Ok(())
            }
        }
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

/// Ordered name -> value mapping; inserting an existing name replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VariableContext {
    values: BTreeMap<String, Value>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced value, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    /// Inserts only when `name` is not yet defined. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        match self.values.entry(name.into()) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<ServiceModel> for Value {
    fn from(service: ServiceModel) -> Self {
        Value::Service(service)
    }
}

impl From<Vec<ServiceModel>> for Value {
    fn from(members: Vec<ServiceModel>) -> Self {
        Value::Cluster(members)
    }
}

impl From<PathBuf> for Value {
    fn from(path: PathBuf) -> Self {
        Value::Path(path)
    }
}
