//! Singleton and collection requirements and the references they capture.

use tracing::{info, warn};

use crate::config::{ServiceCollection, SingletonService};
use crate::registry::{Filter, FilterError, Properties, RegistrationId, ServiceReference, ServiceUrl};
use crate::variables::ServiceModel;

use super::ordering;

/// A peer captured from a discovery event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredReference {
    pub registration: RegistrationId,
    pub url: ServiceUrl,
    pub properties: Properties,
}

impl DiscoveredReference {
    pub fn model(&self) -> ServiceModel {
        ServiceModel {
            host: self.url.host().to_string(),
            port: self.url.port(),
            properties: self.properties.clone(),
        }
    }
}

impl From<ServiceReference> for DiscoveredReference {
    fn from(reference: ServiceReference) -> Self {
        Self {
            registration: reference.registration,
            url: reference.url,
            properties: reference.properties,
        }
    }
}

/// Outcome of feeding a discovery event into a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// Stored and counts toward the barrier.
    Accepted,
    /// Singleton already holds a reference; nothing stored.
    AlreadySatisfied,
}

#[derive(Debug)]
pub struct SingletonRequirement {
    variable: String,
    filter: Filter,
    discovered: Option<DiscoveredReference>,
}

impl SingletonRequirement {
    pub fn discovered(&self) -> Option<&DiscoveredReference> {
        self.discovered.as_ref()
    }
}

#[derive(Debug)]
pub struct CollectionRequirement {
    variable: String,
    filter: Filter,
    cardinality: usize,
    id_property: String,
    members: Vec<DiscoveredReference>,
}

impl CollectionRequirement {
    /// Members in total order.
    pub fn members(&self) -> &[DiscoveredReference] {
        &self.members
    }

    pub fn id_property(&self) -> &str {
        &self.id_property
    }

    pub fn index_of(&self, registration: RegistrationId) -> Option<String> {
        ordering::index_of(&self.members, registration, &self.id_property)
    }
}

#[derive(Debug)]
pub enum PeerRequirement {
    Singleton(SingletonRequirement),
    Collection(CollectionRequirement),
}

impl PeerRequirement {
    pub fn singleton(definition: &SingletonService) -> Result<Self, FilterError> {
        Ok(PeerRequirement::Singleton(SingletonRequirement {
            variable: definition.variable.clone(),
            filter: Filter::new(definition.service.clone(), definition.properties.clone())?,
            discovered: None,
        }))
    }

    pub fn collection(definition: &ServiceCollection) -> Result<Self, FilterError> {
        Ok(PeerRequirement::Collection(CollectionRequirement {
            variable: definition.variable.clone(),
            filter: Filter::new(definition.service.clone(), definition.properties.clone())?,
            cardinality: definition.cardinality,
            id_property: definition.id_property.clone(),
            members: Vec::new(),
        }))
    }

    pub fn variable(&self) -> &str {
        match self {
            PeerRequirement::Singleton(s) => &s.variable,
            PeerRequirement::Collection(c) => &c.variable,
        }
    }

    pub fn filter(&self) -> &Filter {
        match self {
            PeerRequirement::Singleton(s) => &s.filter,
            PeerRequirement::Collection(c) => &c.filter,
        }
    }

    pub fn cardinality(&self) -> usize {
        match self {
            PeerRequirement::Singleton(_) => 1,
            PeerRequirement::Collection(c) => c.cardinality,
        }
    }

    pub fn discovered_count(&self) -> usize {
        match self {
            PeerRequirement::Singleton(s) => usize::from(s.discovered.is_some()),
            PeerRequirement::Collection(c) => c.members.len(),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.discovered_count() >= self.cardinality()
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, PeerRequirement::Singleton(_))
    }

    pub fn as_collection(&self) -> Option<&CollectionRequirement> {
        match self {
            PeerRequirement::Collection(c) => Some(c),
            PeerRequirement::Singleton(_) => None,
        }
    }

    pub fn discover(&mut self, reference: ServiceReference) -> Discovery {
        match self {
            PeerRequirement::Singleton(s) => {
                if s.discovered.is_some() {
                    warn!(
                        component = "requirement",
                        event = "duplicate_singleton",
                        variable = %s.variable,
                        filter = %s.filter,
                        url = %reference.url,
                        "service has already been discovered"
                    );
                    return Discovery::AlreadySatisfied;
                }
                info!(
                    component = "requirement",
                    event = "discovered",
                    variable = %s.variable,
                    url = %reference.url,
                    "discovered service"
                );
                s.discovered = Some(reference.into());
                Discovery::Accepted
            }
            // Every member is stored and counted, even past the declared cardinality.
            PeerRequirement::Collection(c) => {
                if c.members.len() >= c.cardinality {
                    warn!(
                        component = "requirement",
                        event = "collection_overfull",
                        variable = %c.variable,
                        url = %reference.url,
                        cardinality = c.cardinality,
                        "collection already holds its declared cardinality"
                    );
                }
                info!(
                    component = "requirement",
                    event = "discovered",
                    variable = %c.variable,
                    url = %reference.url,
                    members = c.members.len() + 1,
                    cardinality = c.cardinality,
                    "discovered collection member"
                );
                c.members.push(reference.into());
                ordering::canonicalize(&mut c.members, &c.id_property);
                Discovery::Accepted
            }
        }
    }
}
