//! Two-way merge and the k-way reduce built on it

use crate::model::{Batch, Record};

/// Merge two sequences that are each in key order.
///
/// On equal keys the record from `right` is emitted first.
pub fn merge(left: Vec<Record>, right: Vec<Record>) -> Vec<Record> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l.key() < r.key(),
            _ => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }

    merged.extend(left);
    merged.extend(right);
    merged
}

/// Fold every partition, in order, into one key-ordered sequence.
///
/// The first partition seeds the result and each following one is merged
/// into it. No partitions yield no records.
pub fn reduce(partitions: Vec<Batch>) -> Vec<Record> {
    let mut partitions = partitions.into_iter();
    let Some(first) = partitions.next() else {
        return Vec::new();
    };

    partitions.fold(first.into_records(), |acc, batch| {
        merge(acc, batch.into_records())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn records(keys: &[i64]) -> Vec<Record> {
        keys.iter()
            .map(|k| Record::parse(&k.to_string()).unwrap())
            .collect()
    }

    fn keys(records: &[Record]) -> Vec<i64> {
        records.iter().map(Record::key).collect()
    }

    fn sorted_records() -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec(-50i64..50, 0..40).prop_map(|mut keys| {
            keys.sort_unstable();
            records(&keys)
        })
    }

    #[test]
    fn test_merge_interleaves() {
        let merged = merge(records(&[1, 4, 9]), records(&[2, 3, 10, 11]));
        assert_eq!(keys(&merged), vec![1, 2, 3, 4, 9, 10, 11]);
    }

    #[test]
    fn test_ties_favor_right_operand() {
        let left = vec![Record::parse("7").unwrap()];
        let right = vec![Record::parse("007").unwrap()];
        let merged = merge(left, right);
        let texts: Vec<_> = merged.iter().map(Record::text).collect();
        assert_eq!(texts, vec!["007", "7"]);
    }

    #[test]
    fn test_merge_with_empty_side() {
        assert_eq!(keys(&merge(Vec::new(), records(&[1, 2]))), vec![1, 2]);
        assert_eq!(keys(&merge(records(&[1, 2]), Vec::new())), vec![1, 2]);
        assert!(merge(Vec::new(), Vec::new()).is_empty());
    }

    #[test]
    fn test_reduce_folds_in_partition_order() {
        let partitions = vec![
            Batch::from_records("a", records(&[3, 8])),
            Batch::from_records("b", records(&[1, 9])),
            Batch::from_records("c", Vec::new()),
            Batch::from_records("d", records(&[2, 5, 7])),
        ];
        assert_eq!(keys(&reduce(partitions)), vec![1, 2, 3, 5, 7, 8, 9]);
    }

    #[test]
    fn test_reduce_of_nothing_is_empty() {
        assert!(reduce(Vec::new()).is_empty());
    }

    proptest! {
        #[test]
        fn prop_merge_is_sorted_and_complete(a in sorted_records(), b in sorted_records()) {
            let merged = merge(a.clone(), b.clone());
            prop_assert_eq!(merged.len(), a.len() + b.len());
            prop_assert!(merged.windows(2).all(|w| w[0].key() <= w[1].key()));

            let mut expected = keys(&a);
            expected.extend(keys(&b));
            expected.sort_unstable();
            prop_assert_eq!(keys(&merged), expected);
        }

        #[test]
        fn prop_equal_keys_keep_right_before_left(a in sorted_records(), b in sorted_records()) {
            // Right-hand records carry a leading zero so the side shows in the text
            let padded = |k: i64| if k < 0 { format!("-0{}", -k) } else { format!("0{k}") };
            let right: Vec<Record> = b
                .iter()
                .map(|r| Record::parse(&padded(r.key())).unwrap())
                .collect();
            let is_right = |r: &Record| r.text() != r.key().to_string();

            let merged = merge(a, right);
            for pair in merged.windows(2) {
                if pair[0].key() == pair[1].key() {
                    prop_assert!(is_right(&pair[0]) || !is_right(&pair[1]));
                }
            }
        }

        #[test]
        fn prop_reduce_matches_full_sort(
            parts in prop::collection::vec(sorted_records(), 1..6)
        ) {
            let mut expected: Vec<i64> = parts.iter().flat_map(|p| keys(p)).collect();
            expected.sort_unstable();

            let batches = parts
                .into_iter()
                .enumerate()
                .map(|(i, p)| Batch::from_records(format!("p{i}"), p))
                .collect();
            prop_assert_eq!(keys(&reduce(batches)), expected);
        }
    }
}
