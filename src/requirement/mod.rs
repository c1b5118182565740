//! Peer requirements: the singletons and collections an instance must discover.

pub mod ordering;
pub mod requirement;

#[cfg(test)]
mod ordering_test;

pub use ordering::{canonicalize, index_of};
pub use requirement::{
    CollectionRequirement, Discovery, DiscoveredReference, PeerRequirement, SingletonRequirement,
};
