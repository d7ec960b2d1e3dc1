//! Shared contraction index-list bookkeeping used by both lowering
//! passes: validating that every contraction tuple is a pair,
//! partitioning a pair list relative to a product's left/right
//! operands, and renumbering indices after some have already been
//! spliced out. One shared implementation, called once per recursive
//! step from each of `direct_codegen` and `graph_codegen`, rather than
//! duplicating the logic in both. Both passes shift a mixed pair's
//! right-hand index (and the pairs recursed into the right operand) by
//! the same amount, `-rank_l` — a leg's position within the right
//! operand's own numbering cannot depend on how the left operand
//! happens to be reduced, so this is not a place where the two
//! lowering strategies can legitimately diverge.
use crate::error::InternalError;

/// A contracted index pair `(left_index, right_index)`.
pub type Pair = (usize, usize);

/// Confirms every inner list in `indices` has exactly two elements and
/// returns them as pairs. Sema (§4.3) accepts contraction index lists
/// of any length and checks only dimension compatibility; only the
/// lowering passes require pairs, since only binary contraction nodes
/// are constructed.
pub fn validate_pairs(indices: &[Vec<usize>]) -> Result<Vec<Pair>, InternalError> {
    indices
        .iter()
        .map(|list| {
            if list.len() != 2 {
                Err(InternalError::NonPairContraction { len: list.len() })
            } else {
                Ok((list[0], list[1]))
            }
        })
        .collect()
}

/// The three buckets a contraction's pairs fall into relative to the
/// product `left # right` they index into, where `rank_l` is the rank
/// of `left`: a pair entirely within `left`'s positions, a pair
/// entirely within `right`'s positions (still expressed in the
/// concatenated numbering), or a pair with one index on each side.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Partition {
    pub left: Vec<Pair>,
    pub right: Vec<Pair>,
    pub mixed: Vec<Pair>,
}

/// Splits `pairs` (indices relative to the concatenated `left#right`
/// dimension vector) into the three buckets above.
pub fn partition_pairs(rank_l: usize, pairs: &[Pair]) -> Partition {
    let mut p = Partition::default();
    for &(a, b) in pairs {
        let a_on_left = a < rank_l;
        let b_on_left = b < rank_l;
        if a_on_left && b_on_left {
            p.left.push((a, b));
        } else if !a_on_left && !b_on_left {
            p.right.push((a, b));
        } else {
            p.mixed.push((a, b));
        }
    }
    p
}

/// Shifts both elements of every pair by `delta`.
pub fn shift_pairs(pairs: &[Pair], delta: isize) -> Vec<Pair> {
    pairs
        .iter()
        .map(|&(a, b)| (shift(a, delta), shift(b, delta)))
        .collect()
}

fn shift(index: usize, delta: isize) -> usize {
    (index as isize + delta) as usize
}

/// Adjusts each index in `indices` downward by the number of already-
/// contracted positions (from `removed`) that precede it — the same
/// renumbering `adjustForContractions` performs in both original
/// lowering passes after a pair of legs is spliced out of a node.
pub fn adjust_for_contractions(indices: &mut [usize], removed: &[usize]) {
    for index in indices.iter_mut() {
        let shift = removed.iter().filter(|&&r| r < *index).count();
        *index -= shift;
    }
}

/// Splits a list of pairs into their left and right components, in
/// order — used when handing indices to `ExprNodeBuilder::contraction`.
pub fn unpack_pairs(pairs: &[Pair]) -> (Vec<usize>, Vec<usize>) {
    (
        pairs.iter().map(|&(a, _)| a).collect(),
        pairs.iter().map(|&(_, b)| b).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_pair_is_internal_error() {
        let err = validate_pairs(&[vec![0, 1, 2]]).unwrap_err();
        assert_eq!(err, InternalError::NonPairContraction { len: 3 });
    }

    #[test]
    fn partition_buckets_by_side() {
        let pairs = validate_pairs(&[vec![0, 1], vec![2, 3], vec![1, 2]]).unwrap();
        let p = partition_pairs(2, &pairs);
        assert_eq!(p.left, vec![(0, 1)]);
        assert_eq!(p.right, vec![(2, 3)]);
        assert_eq!(p.mixed, vec![(1, 2)]);
    }

    #[test]
    fn adjust_accounts_for_removed_positions() {
        let mut indices = vec![0, 2, 4];
        adjust_for_contractions(&mut indices, &[1, 3]);
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn shift_moves_both_sides() {
        let pairs = vec![(2, 3)];
        assert_eq!(shift_pairs(&pairs, -1), vec![(1, 2)]);
    }
}
