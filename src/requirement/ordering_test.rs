//! Tests for total ordering of collection members.

#[cfg(test)]
mod tests {
    use crate::registry::{Properties, RegistrationId};
    use crate::requirement::{canonicalize, index_of, DiscoveredReference};

    const ID: &str = "totalOrderingIndex";

    fn member(url: &str) -> DiscoveredReference {
        DiscoveredReference {
            registration: RegistrationId::new(),
            url: url.parse().unwrap(),
            properties: Properties::new(),
        }
    }

    fn indices(members: &[DiscoveredReference]) -> Vec<(String, String)> {
        members
            .iter()
            .map(|m| (m.url.to_string(), m.properties[ID].clone()))
            .collect()
    }

    #[test]
    fn test_indices_do_not_depend_on_arrival_order() {
        let members = vec![
            member("service:w:tcp://c:1"),
            member("service:w:tcp://a:1"),
            member("service:w:tcp://b:1"),
        ];

        let mut forward = members.clone();
        canonicalize(&mut forward, ID);

        let mut reversed: Vec<_> = members.iter().rev().cloned().collect();
        canonicalize(&mut reversed, ID);

        assert_eq!(indices(&forward), indices(&reversed));
        assert_eq!(
            indices(&forward),
            vec![
                ("service:w:tcp://a:1".to_string(), "1".to_string()),
                ("service:w:tcp://b:1".to_string(), "2".to_string()),
                ("service:w:tcp://c:1".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_ties_broken_by_registration_id() {
        let a = member("service:w:tcp://same:1");
        let b = member("service:w:tcp://same:1");
        let (first, second) = if a.registration.to_string() < b.registration.to_string() {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };

        let mut members = vec![second.clone(), first.clone()];
        canonicalize(&mut members, ID);
        assert_eq!(index_of(&members, first.registration, ID).as_deref(), Some("1"));
        assert_eq!(index_of(&members, second.registration, ID).as_deref(), Some("2"));
    }

    #[test]
    fn test_index_of_unknown_is_none() {
        let mut members = vec![member("service:w:tcp://a:1")];
        canonicalize(&mut members, ID);
        assert_eq!(index_of(&members, RegistrationId::new(), ID), None);
    }

    #[test]
    fn test_reindexes_on_insertion() {
        let mut members = vec![member("service:w:tcp://b:1")];
        canonicalize(&mut members, ID);
        let b = members[0].registration;
        assert_eq!(index_of(&members, b, ID).as_deref(), Some("1"));

        members.push(member("service:w:tcp://a:1"));
        canonicalize(&mut members, ID);
        assert_eq!(index_of(&members, b, ID).as_deref(), Some("2"));
    }
}
