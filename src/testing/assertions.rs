//! Assertion helpers for materialization outputs.

use super::fakes::RecordingOnlineStore;
use crate::value::FeatureRow;
use std::fmt::Debug;

/// Assert that two collections are equal (order matters).
///
/// # Panics
///
/// Panics with a message naming the first differing index.
///
/// # Example
///
/// ```
/// use ironmat::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            a == e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}"
        );
    }
}

/// Assert the row counts of every provider call `store` received.
///
/// # Panics
///
/// Panics if the call sizes differ from `expected`.
pub fn assert_mini_batch_sizes(store: &RecordingOnlineStore, expected: &[usize]) {
    let actual = store.call_sizes();
    assert_eq!(
        actual, expected,
        "Mini-batch sizes mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert that acknowledged calls, concatenated, are exactly `expected` in order.
///
/// # Panics
///
/// Panics on the first row that is missing, extra or out of place.
pub fn assert_rows_written_in_order(store: &RecordingOnlineStore, expected: &[FeatureRow]) {
    assert_collections_equal(&store.acknowledged_rows(), expected);
}

/// Assert that every call except possibly the last has exactly `size` rows,
/// and the last has between 1 and `size`.
///
/// Only holds when the rows came from a single input batch; every input batch
/// starts a fresh run of mini-batches.
///
/// # Panics
///
/// Panics if any call violates the bound.
pub fn assert_mini_batches_bounded(store: &RecordingOnlineStore, size: usize) {
    let sizes = store.call_sizes();
    let Some((last, rest)) = sizes.split_last() else {
        return;
    };
    for (i, s) in rest.iter().enumerate() {
        assert_eq!(*s, size, "Mini-batch {i} has {s} rows, expected {size}: {sizes:?}");
    }
    assert!(
        (1..=size).contains(last),
        "Last mini-batch has {last} rows, expected 1..={size}: {sizes:?}"
    );
}
