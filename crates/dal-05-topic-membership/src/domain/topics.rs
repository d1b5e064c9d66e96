//! Topic derivation. Everything here is a pure function of its inputs.

use std::collections::BTreeSet;

use shared_types::{Committee, Profile, SlotIndex, Topic};

use super::errors::{MembershipError, MembershipResult};

/// Topics a node with `profiles` must be joined to, given the relevant
/// committees.
///
/// - `Attester(pkh)`: `(i, pkh)` for every slot index
/// - `Producer(i)`, `Observer(i)`: `(i, pkh)` for every committee member
/// - `Bootstrap`: nothing
pub fn desired_topics<'a, I>(profiles: &[Profile], committees: I, number_of_slots: u16) -> BTreeSet<Topic>
where
    I: IntoIterator<Item = &'a Committee>,
{
    let committees: Vec<&Committee> = committees.into_iter().collect();
    let mut topics = BTreeSet::new();
    for profile in profiles {
        match profile {
            Profile::Attester(pkh) => {
                topics.extend((0..number_of_slots).map(|i| Topic::new(i, *pkh)));
            }
            Profile::Producer(slot_index) | Profile::Observer(slot_index) => {
                for committee in &committees {
                    topics.extend(committee.members().map(|pkh| Topic::new(*slot_index, *pkh)));
                }
            }
            Profile::Bootstrap => {}
        }
    }
    topics
}

/// Check and normalize a profile list: sorted, deduplicated, Bootstrap alone,
/// slot indices in range.
pub fn normalize_profiles(profiles: Vec<Profile>, number_of_slots: u16) -> MembershipResult<Vec<Profile>> {
    let unique: BTreeSet<Profile> = profiles.into_iter().collect();
    if unique.len() > 1 && unique.iter().any(Profile::is_bootstrap) {
        return Err(MembershipError::BootstrapNotExclusive);
    }
    for profile in &unique {
        if let Profile::Producer(slot_index) | Profile::Observer(slot_index) = profile {
            check_slot_index(*slot_index, number_of_slots)?;
        }
    }
    Ok(unique.into_iter().collect())
}

fn check_slot_index(slot_index: SlotIndex, number_of_slots: u16) -> MembershipResult<()> {
    if slot_index >= number_of_slots {
        return Err(MembershipError::InvalidSlotIndex {
            slot_index,
            number_of_slots,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::PublicKeyHash;
    use std::collections::BTreeMap;

    fn pkh(b: u8) -> PublicKeyHash {
        PublicKeyHash::from_bytes([b; 20])
    }

    fn committee(members: &[u8]) -> Committee {
        let assignments: BTreeMap<_, _> = members
            .iter()
            .enumerate()
            .map(|(i, m)| (pkh(*m), vec![i as u16]))
            .collect();
        Committee::new(10, assignments)
    }

    #[test]
    fn test_attester_follows_every_slot() {
        let topics = desired_topics(&[Profile::Attester(pkh(1))], Vec::<&Committee>::new(), 4);
        assert_eq!(topics.len(), 4);
        assert!(topics.iter().all(|t| t.pkh == pkh(1)));
    }

    #[test]
    fn test_observer_follows_committee() {
        let c = committee(&[1, 2, 3]);
        let topics = desired_topics(&[Profile::Observer(2)], [&c], 4);
        let expected: BTreeSet<Topic> = [1, 2, 3].iter().map(|m| Topic::new(2, pkh(*m))).collect();
        assert_eq!(topics, expected);
    }

    #[test]
    fn test_producer_unions_committees() {
        let current = committee(&[1, 2]);
        let next = committee(&[2, 3]);
        let topics = desired_topics(&[Profile::Producer(0)], [&current, &next], 4);
        assert_eq!(topics.len(), 3);
    }

    #[test]
    fn test_bootstrap_has_no_topics() {
        let c = committee(&[1, 2]);
        assert!(desired_topics(&[Profile::Bootstrap], [&c], 32).is_empty());
    }

    #[test]
    fn test_bootstrap_exclusive() {
        assert_eq!(
            normalize_profiles(vec![Profile::Bootstrap, Profile::Observer(1)], 4),
            Err(MembershipError::BootstrapNotExclusive)
        );
        assert_eq!(
            normalize_profiles(vec![Profile::Bootstrap, Profile::Bootstrap], 4),
            Ok(vec![Profile::Bootstrap])
        );
    }

    #[test]
    fn test_slot_index_checked() {
        assert!(matches!(
            normalize_profiles(vec![Profile::Producer(4)], 4),
            Err(MembershipError::InvalidSlotIndex { slot_index: 4, .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_desired_topics_deterministic(
            members in proptest::collection::btree_set(0u8..20, 0..8),
            slots in proptest::collection::vec(0u16..8, 0..4),
        ) {
            let members: Vec<u8> = members.into_iter().collect();
            let c = committee(&members);
            let mut profiles: Vec<Profile> = slots.iter().map(|s| Profile::Observer(*s)).collect();
            let first = desired_topics(&profiles, [&c], 8);
            profiles.reverse();
            let second = desired_topics(&profiles, [&c], 8);
            prop_assert_eq!(&first, &second);
            for topic in &first {
                prop_assert!(c.is_member(&topic.pkh));
                prop_assert!(slots.contains(&topic.slot_index));
            }
        }
    }
}
