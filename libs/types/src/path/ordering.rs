//! Total orderings over paths
//!
//! Two orderings are provided. Both compare the context first, then the
//! components pairwise, and finally the component count (shorter first).
//!
//! - wildcard-last: absent context before any context; literal < `*` < `**`
//! - wildcard-first: any context before an absent one; `**` < `*` < literal
//!
//! Literals always compare lexically, in both orderings.

use super::{Component, Path, WILDCARD};
use std::cmp::Ordering;

impl Path {
    /// Order with wildcards sorting after literals
    pub fn cmp_wildcard_last(&self, other: &Path) -> Ordering {
        compare(self, other, WildcardPlacement::Last)
    }

    /// Order with wildcards sorting before literals
    pub fn cmp_wildcard_first(&self, other: &Path) -> Ordering {
        compare(self, other, WildcardPlacement::First)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WildcardPlacement {
    First,
    Last,
}

impl WildcardPlacement {
    fn orient(self, ordering: Ordering) -> Ordering {
        match self {
            WildcardPlacement::Last => ordering,
            WildcardPlacement::First => ordering.reverse(),
        }
    }
}

fn rank(component: &Component) -> u8 {
    match component {
        Component::Literal(_) => 0,
        Component::Wildcard => 1,
        Component::WildcardRecursive => 2,
    }
}

fn compare_components(lhs: &Component, rhs: &Component, placement: WildcardPlacement) -> Ordering {
    match (lhs, rhs) {
        (Component::Literal(l), Component::Literal(r)) => l.cmp(r),
        _ => placement.orient(rank(lhs).cmp(&rank(rhs))),
    }
}

fn compare_contexts(lhs: Option<&str>, rhs: Option<&str>, placement: WildcardPlacement) -> Ordering {
    match (lhs, rhs) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => placement.orient(Ordering::Less),
        (Some(_), None) => placement.orient(Ordering::Greater),
        (Some(l), Some(r)) => {
            let l_wild = l == WILDCARD;
            let r_wild = r == WILDCARD;
            if l_wild == r_wild {
                l.cmp(r)
            } else {
                placement.orient(l_wild.cmp(&r_wild))
            }
        }
    }
}

fn compare(lhs: &Path, rhs: &Path, placement: WildcardPlacement) -> Ordering {
    compare_contexts(lhs.context(), rhs.context(), placement)
        .then_with(|| {
            lhs.components()
                .iter()
                .zip(rhs.components())
                .map(|(l, r)| compare_components(l, r, placement))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| lhs.components().len().cmp(&rhs.components().len()))
}
