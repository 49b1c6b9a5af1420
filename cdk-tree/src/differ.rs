//! Keyed diffing of ordered collections.
//!
//! [`IterableDiffer`] remembers the previous collection and turns the next
//! one into a list of [`DiffOperation`]s. Applying the operations in order
//! to a sequence that mirrors the previous collection yields a sequence that
//! mirrors the new one.
//!
//! Removals come first, from the highest index down. Insertions and moves
//! follow, placing new positions from the back: every item is put directly
//! in front of its final successor. Retained items on a longest increasing
//! subsequence of their new positions never move.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use log::trace;

use crate::control::ExpansionKey;

/// One mutation of the mirrored sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOperation {
    /// Remove the element at `index`.
    Remove { index: usize },
    /// Insert the new collection's `item` at `index`.
    Insert { item: usize, index: usize },
    /// Take the element at `from` out and put it back at `to` (an index
    /// into the sequence after the removal). It holds the new collection's
    /// `item`.
    Move { item: usize, from: usize, to: usize },
}

/// Result of one diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterableChanges {
    /// Mutations, in application order.
    pub operations: Vec<DiffOperation>,
    /// Positions in the new collection of retained items whose value changed
    /// while their key stayed the same.
    pub identity_changes: Vec<usize>,
}

/// Keyed differ over successive snapshots of a collection.
pub struct IterableDiffer<T, K> {
    key: ExpansionKey<T, K>,
    previous: Vec<(K, T)>,
}

impl<T, K> IterableDiffer<T, K>
where
    T: Clone + PartialEq,
    K: Clone + Eq + Hash,
{
    /// Create a differ whose previous collection is empty.
    pub fn new(key: ExpansionKey<T, K>) -> Self {
        Self {
            key,
            previous: Vec::new(),
        }
    }

    /// Forget the previous collection.
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    /// Number of items in the previous collection.
    pub fn len(&self) -> usize {
        self.previous.len()
    }

    /// Whether the previous collection is empty.
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    /// Diff `items` against the previous collection and remember them.
    ///
    /// Returns `None` when nothing changed. Items sharing a key are matched
    /// in order of appearance.
    pub fn diff(&mut self, items: &[T]) -> Option<IterableChanges> {
        let next: Vec<(K, T)> = items
            .iter()
            .map(|item| ((self.key)(item), item.clone()))
            .collect();
        let changes = compute(&self.previous, &next);
        self.previous = next;
        changes
    }
}

fn compute<T: PartialEq, K: Clone + Eq + Hash>(
    previous: &[(K, T)],
    next: &[(K, T)],
) -> Option<IterableChanges> {
    // Previous position of every new item, if it was there before.
    let mut available: HashMap<&K, VecDeque<usize>> = HashMap::new();
    for (index, (key, _)) in previous.iter().enumerate() {
        available.entry(key).or_default().push_back(index);
    }
    let sources: Vec<Option<usize>> = next
        .iter()
        .map(|(key, _)| available.get_mut(key).and_then(VecDeque::pop_front))
        .collect();

    let mut target_of = vec![None; previous.len()];
    let mut identity_changes = Vec::new();
    for (target, source) in sources.iter().enumerate() {
        if let Some(source) = *source {
            target_of[source] = Some(target);
            if previous[source].1 != next[target].1 {
                identity_changes.push(target);
            }
        }
    }

    let mut operations = Vec::new();
    for (index, target) in target_of.iter().enumerate().rev() {
        if target.is_none() {
            operations.push(DiffOperation::Remove { index });
        }
    }

    // The mirrored sequence after removals, holding new positions.
    let mut work: Vec<usize> = target_of.iter().flatten().copied().collect();
    let stable = longest_increasing_run(&work);

    for target in (0..next.len()).rev() {
        let anchor = if target + 1 == next.len() {
            None
        } else {
            Some(target + 1)
        };
        let position_of = |work: &[usize], id: Option<usize>| match id {
            Some(id) => work.iter().position(|&w| w == id).unwrap_or(work.len()),
            None => work.len(),
        };

        match sources[target] {
            None => {
                let index = position_of(&work, anchor);
                work.insert(index, target);
                operations.push(DiffOperation::Insert {
                    item: target,
                    index,
                });
            }
            Some(_) if stable.contains(&target) => {}
            Some(_) => {
                let from = position_of(&work, Some(target));
                work.remove(from);
                let to = position_of(&work, anchor);
                work.insert(to, target);
                if from != to {
                    operations.push(DiffOperation::Move {
                        item: target,
                        from,
                        to,
                    });
                }
            }
        }
    }

    if operations.is_empty() && identity_changes.is_empty() {
        return None;
    }
    trace!(
        "IterableDiffer: {} operations, {} identity changes",
        operations.len(),
        identity_changes.len()
    );
    Some(IterableChanges {
        operations,
        identity_changes,
    })
}

/// Values forming one longest strictly increasing subsequence of `values`.
fn longest_increasing_run(values: &[usize]) -> std::collections::HashSet<usize> {
    // tails[len] = index into values of the smallest tail of a run of len + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; values.len()];
    for (i, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&t| values[t] < value);
        if slot > 0 {
            predecessor[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }

    let mut run = std::collections::HashSet::new();
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        run.insert(values[i]);
        cursor = predecessor[i];
    }
    run
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn differ() -> IterableDiffer<(char, u32), char> {
        IterableDiffer::new(Arc::new(|item: &(char, u32)| item.0))
    }

    fn items(keys: &str) -> Vec<(char, u32)> {
        keys.chars().map(|c| (c, 0)).collect()
    }

    /// Apply operations to a mirror of the previous collection.
    fn apply(previous: &[(char, u32)], next: &[(char, u32)], changes: &IterableChanges) -> Vec<char> {
        let mut mirror: Vec<char> = previous.iter().map(|i| i.0).collect();
        for op in &changes.operations {
            match *op {
                DiffOperation::Remove { index } => {
                    mirror.remove(index);
                }
                DiffOperation::Insert { item, index } => mirror.insert(index, next[item].0),
                DiffOperation::Move { item, from, to } => {
                    let moved = mirror.remove(from);
                    assert_eq!(moved, next[item].0);
                    mirror.insert(to, moved);
                }
            }
        }
        mirror
    }

    fn check(before: &str, after: &str) -> IterableChanges {
        let mut differ = differ();
        let previous = items(before);
        let next = items(after);
        differ.diff(&previous);
        let changes = differ.diff(&next).expect("collections differ");
        assert_eq!(apply(&previous, &next, &changes).iter().collect::<String>(), after);
        changes
    }

    #[test]
    fn test_first_diff_inserts_everything() {
        let mut differ = differ();
        let changes = differ.diff(&items("abc")).unwrap();
        assert_eq!(changes.operations.len(), 3);
        assert_eq!(apply(&[], &items("abc"), &changes), vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_same_collection_has_no_changes() {
        let mut differ = differ();
        differ.diff(&items("abcd"));
        assert_eq!(differ.diff(&items("abcd")), None);
    }

    #[test]
    fn test_removals_are_descending() {
        let changes = check("abcde", "bd");
        assert_eq!(
            changes.operations,
            vec![
                DiffOperation::Remove { index: 4 },
                DiffOperation::Remove { index: 2 },
                DiffOperation::Remove { index: 0 },
            ]
        );
    }

    #[test]
    fn test_rotation_is_a_single_move() {
        let changes = check("abcd", "bcda");
        assert_eq!(
            changes.operations,
            vec![DiffOperation::Move {
                item: 3,
                from: 0,
                to: 3
            }]
        );
    }

    #[test]
    fn test_mixed_changes_reach_new_order() {
        check("abcdef", "fxbdyae");
        check("abc", "cba");
        check("a", "bcad");
        check("abcd", "");
        check("aab", "baa");
    }

    #[test]
    fn test_identity_changes_are_reported() {
        let mut differ = differ();
        differ.diff(&[('a', 1), ('b', 1)]);
        let changes = differ.diff(&[('a', 1), ('b', 2)]).unwrap();
        assert!(changes.operations.is_empty());
        assert_eq!(changes.identity_changes, vec![1]);
    }

    #[test]
    fn test_reset_forgets_previous_collection() {
        let mut differ = differ();
        differ.diff(&items("ab"));
        differ.reset();
        let changes = differ.diff(&items("ab")).unwrap();
        assert_eq!(changes.operations.len(), 2);
    }
}
