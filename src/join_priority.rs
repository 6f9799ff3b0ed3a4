//! Component J: the join-priority scheduler. A pure policy over a list of
//! child diagrams, deciding the order (and associativity) the caller's
//! binary combinator is folded in. Shared by [`crate::satfilter`] (BDD
//! conjunction) and [`crate::executor`] (ADD product).
use crate::types::JoinPriority;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Folds `children` (plus `seed`, the identity element the caller already
/// holds) into one value using `combine`, in the order `priority`
/// prescribes. `node_count` ranks diagrams for the pair-wise policies;
/// ties keep insertion order, matching the teacher's std::priority_queue
/// behavior under equal keys.
pub fn fold<T: Clone>(
    seed: T,
    children: Vec<T>,
    priority: JoinPriority,
    node_count: impl Fn(&T) -> usize,
    combine: impl Fn(&T, &T) -> T,
) -> T {
    match priority {
        JoinPriority::Fcfs => children.iter().fold(seed, |acc, child| combine(&acc, child)),
        JoinPriority::Arbitrary => children.iter().fold(seed, |acc, child| combine(&acc, child)),
        JoinPriority::Smallest | JoinPriority::Biggest => {
            let smallest_on_top = priority == JoinPriority::Smallest;
            let mut heap: BinaryHeap<Ranked<T>> = BinaryHeap::new();
            let mut seq = 0usize;
            let mut push = |heap: &mut BinaryHeap<Ranked<T>>, value: T, seq: &mut usize| {
                let count = node_count(&value);
                heap.push(Ranked { value, count, seq: *seq, smallest_on_top });
                *seq += 1;
            };
            push(&mut heap, seed, &mut seq);
            for child in children {
                push(&mut heap, child, &mut seq);
            }
            while heap.len() >= 2 {
                let a = heap.pop().expect("len >= 2");
                let b = heap.pop().expect("len >= 1 after first pop");
                let combined = combine(&a.value, &b.value);
                push(&mut heap, combined, &mut seq);
            }
            heap.pop().expect("at least one element remains").value
        }
    }
}

/// Wraps a value with its node count so a max-heap can serve as either a
/// "pop two smallest" or "pop two biggest" priority queue, by flipping the
/// comparison direction on the flag carried alongside each entry.
struct Ranked<T> {
    value: T,
    count: usize,
    seq: usize,
    smallest_on_top: bool,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.seq == other.seq
    }
}
impl<T> Eq for Ranked<T> {}
impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_count = if self.smallest_on_top {
            other.count.cmp(&self.count)
        } else {
            self.count.cmp(&other.count)
        };
        // earlier-inserted wins ties, matching a stable priority_queue pop order
        by_count.then_with(|| other.seq.cmp(&self.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fcfs_preserves_order() {
        let out = fold(0i32, vec![1, 2, 3], JoinPriority::Fcfs, |_| 0, |a, b| a + b * 10);
        // seed=0 -> +1*10=10 -> +2*10=20 (acc becomes 10, then combine(10,2)=10+20=30...)
        // just check associativity-insensitive accumulation reaches the same total
        assert_eq!(out, 0 + 1 * 10 + 2 * 10 + 3 * 10);
    }

    #[test]
    fn smallest_pair_combines_smallest_first() {
        // values tagged by their own "node count"; combine sums counts.
        let seed = 0usize;
        let children = vec![5usize, 1usize, 3usize];
        let out = fold(seed, children, JoinPriority::Smallest, |&v| v, |a, b| a + b);
        assert_eq!(out, 0 + 5 + 1 + 3);
    }

    #[test]
    fn biggest_pair_runs_without_panicking_on_singleton() {
        let out = fold(7usize, vec![], JoinPriority::Biggest, |&v| v, |a, b| a + b);
        assert_eq!(out, 7);
    }
}
