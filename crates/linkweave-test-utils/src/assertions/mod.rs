//! Assertion helpers for creation orders and upload outcomes.

use std::collections::{HashMap, HashSet};

use linkweave_core::{Record, Schedule, ValueId};

/// Assert that every in-batch reference points to an earlier record.
///
/// References to ids outside `ordered` are ignored.
pub fn assert_valid_order(ordered: &[Record]) {
    let positions: HashMap<&str, usize> = ordered
        .iter()
        .enumerate()
        .map(|(i, r)| (r.local_id.as_str(), i))
        .collect();

    for (i, record) in ordered.iter().enumerate() {
        for value in &record.values {
            for target in value.referenced_ids() {
                if let Some(&at) = positions.get(target.as_str()) {
                    assert!(
                        at < i,
                        "'{}' (position {}) references '{}' through value '{}', which comes at position {}",
                        record.local_id,
                        i,
                        target,
                        value.id,
                        at
                    );
                }
            }
        }
    }
}

/// Assert that `first` was created before `second`
pub fn assert_created_before(created_ids: &[String], first: &str, second: &str) {
    let at = |id: &str| {
        created_ids
            .iter()
            .position(|c| c == id)
            .unwrap_or_else(|| panic!("'{}' was never created; created: {:?}", id, created_ids))
    };
    assert!(
        at(first) < at(second),
        "expected '{}' before '{}' in {:?}",
        first,
        second,
        created_ids
    );
}

/// Assert that every input value ended up either in a scheduled record or in the stash, exactly once
pub fn assert_no_value_lost(input: &[Record], schedule: &Schedule) {
    let expected: HashSet<&ValueId> = input.iter().flat_map(|r| r.values.iter().map(|v| &v.id)).collect();

    let mut seen: Vec<&ValueId> = schedule
        .ordered
        .iter()
        .flat_map(|r| r.values.iter().map(|v| &v.id))
        .collect();
    seen.extend(schedule.stash.iter().map(|item| &item.value.id));

    assert_eq!(seen.len(), expected.len(), "values duplicated or lost: {:?}", seen);
    let seen: HashSet<&ValueId> = seen.into_iter().collect();
    assert_eq!(seen, expected);
}
