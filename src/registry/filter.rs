//! Query predicates selecting registered services.

use std::fmt;

use super::registry::{Properties, ServiceReference};

/// Pseudo-property naming the service type in filter text.
pub const SERVICE_TYPE: &str = "service.type";

const RESERVED: &[char] = &['(', ')', '=', '&', '|', '*', '!'];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("filter service type is empty")]
    EmptyServiceType,
    #[error("filter term {0:?} contains a reserved character")]
    ReservedCharacter(String),
}

/// Conjunction of service-type equality and property equalities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    service_type: String,
    properties: Properties,
}

impl Filter {
    pub fn new(service_type: impl Into<String>, properties: Properties) -> Result<Self, FilterError> {
        let service_type = service_type.into();
        if service_type.trim().is_empty() {
            return Err(FilterError::EmptyServiceType);
        }
        check_term(&service_type)?;
        for (key, value) in &properties {
            if key.trim().is_empty() {
                return Err(FilterError::ReservedCharacter(key.clone()));
            }
            check_term(key)?;
            check_term(value)?;
        }
        Ok(Self {
            service_type,
            properties,
        })
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn matches(&self, reference: &ServiceReference) -> bool {
        reference.url.service_type() == self.service_type
            && self
                .properties
                .iter()
                .all(|(k, v)| reference.properties.get(k) == Some(v))
    }
}

fn check_term(term: &str) -> Result<(), FilterError> {
    if term.contains(RESERVED) {
        return Err(FilterError::ReservedCharacter(term.to_string()));
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.properties.is_empty() {
            return write!(f, "({}={})", SERVICE_TYPE, self.service_type);
        }
        write!(f, "(&({}={})", SERVICE_TYPE, self.service_type)?;
        for (key, value) in &self.properties {
            write!(f, "({}={})", key, value)?;
        }
        f.write_str(")")
    }
}
