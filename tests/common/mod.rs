#![allow(dead_code)]

use chargewalk::core::{EventKind, History, MfpTable};
use chargewalk::error::Result;
use std::collections::BTreeMap;

/// Three-state table used across the integration tests.
pub fn toy_table() -> Result<MfpTable> {
    MfpTable::from_labeled([("1->2", 1.0), ("2->1", 1.0), ("2->3", 2.0), ("3->2", 2.0)])
}

/// Assert the structural invariants every history must satisfy.
pub fn check_history(history: &History, (q_min, q_max): (i32, i32)) {
    assert!(!history.is_empty(), "history must not be empty");
    assert_eq!(history[0].kind, EventKind::Pre, "history must open with pre");
    for e in history {
        assert!(
            (q_min..=q_max).contains(&e.charge),
            "charge {} escaped [{q_min}, {q_max}]",
            e.charge
        );
        assert!(e.length.is_finite() && e.length >= 0.0);
    }
    for pair in history.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(
            b.length >= a.length,
            "length decreased from {} to {}",
            a.length,
            b.length
        );
        match b.kind {
            EventKind::Plus | EventKind::Minus => {
                assert!(!a.kind.is_terminal(), "transition after a terminal event");
                assert_eq!(b.charge, a.charge + b.kind.charge_delta());
            }
            EventKind::Pre => {
                assert!(a.kind.is_terminal(), "pre must follow a terminal event");
                assert_eq!(b.charge, a.charge);
                assert_eq!(b.length, a.length);
                assert_eq!(b.zp, None, "zp belongs to the first event only");
            }
            EventKind::Post => assert_eq!(b.charge, a.charge),
            EventKind::Ignored => assert_eq!(a.kind, EventKind::Pre),
        }
    }
}

/// Fraction of histories ending in each charge state.
pub fn final_charge_fractions(histories: &[History]) -> BTreeMap<i32, f64> {
    let mut counts: BTreeMap<i32, f64> = BTreeMap::new();
    for h in histories {
        if let Some(last) = h.last() {
            *counts.entry(last.charge).or_insert(0.0) += 1.0;
        }
    }
    let n = histories.len() as f64;
    counts.values_mut().for_each(|c| *c /= n);
    counts
}
