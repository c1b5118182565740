//! Deterministic total ordering of collection members.

use std::cmp::Ordering;

use crate::registry::RegistrationId;

use super::requirement::DiscoveredReference;

/// Sorts members by URL canonical form, ties broken by registration id, and
/// writes each 1-based position into `id_property`.
pub fn canonicalize(members: &mut [DiscoveredReference], id_property: &str) {
    members.sort_by(compare);
    for (i, member) in members.iter_mut().enumerate() {
        member
            .properties
            .insert(id_property.to_string(), (i + 1).to_string());
    }
}

/// Position of `registration` within canonicalized `members`.
pub fn index_of(
    members: &[DiscoveredReference],
    registration: RegistrationId,
    id_property: &str,
) -> Option<String> {
    members
        .iter()
        .find(|m| m.registration == registration)
        .and_then(|m| m.properties.get(id_property).cloned())
}

fn compare(a: &DiscoveredReference, b: &DiscoveredReference) -> Ordering {
    a.url
        .cmp(&b.url)
        .then_with(|| a.registration.to_string().cmp(&b.registration.to_string()))
}
