//! Fee arbitration between headers competing for one (level, slot_index).

use std::collections::HashSet;

use shared_types::PublishedHeader;

/// Candidates in priority order: highest fee first, ties to the lowest
/// operation position. A commitment published twice keeps its best entry.
pub fn rank_candidates<'a, I>(candidates: I) -> Vec<&'a PublishedHeader>
where
    I: IntoIterator<Item = &'a PublishedHeader>,
{
    let mut ranked: Vec<&PublishedHeader> = candidates.into_iter().collect();
    ranked.sort_by(|a, b| b.fee.cmp(&a.fee).then(a.op_position.cmp(&b.op_position)));
    let mut seen = HashSet::new();
    ranked.retain(|h| seen.insert(h.commitment));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::Commitment;

    fn header(c: u8, fee: u64, op_position: u32) -> PublishedHeader {
        PublishedHeader {
            slot_index: 0,
            commitment: Commitment([c; 32]),
            fee,
            op_position,
        }
    }

    #[test]
    fn test_highest_fee_wins() {
        let headers = [header(1, 1200, 0), header(2, 1500, 5)];
        assert_eq!(rank_candidates(&headers)[0].commitment, Commitment([2; 32]));
    }

    #[test]
    fn test_tie_goes_to_earliest_operation() {
        let headers = [header(1, 1000, 7), header(2, 1000, 3)];
        assert_eq!(rank_candidates(&headers)[0].commitment, Commitment([2; 32]));
    }

    #[test]
    fn test_duplicate_commitment_collapses() {
        let headers = [header(1, 10, 0), header(1, 20, 1), header(2, 5, 2)];
        let ranked = rank_candidates(&headers);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].fee, 20);
    }

    proptest! {
        #[test]
        fn prop_winner_has_max_fee(fees in proptest::collection::vec(0u64..50, 1..10)) {
            let headers: Vec<_> = fees
                .iter()
                .enumerate()
                .map(|(i, &fee)| header(i as u8, fee, i as u32))
                .collect();
            let ranked = rank_candidates(&headers);
            let max = fees.iter().copied().max().unwrap_or_default();
            prop_assert_eq!(ranked[0].fee, max);
        }
    }
}
