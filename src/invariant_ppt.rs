//! Runtime invariants with contract-test support
//!
//! `assert_invariant!` panics when a recording invariant is broken and also
//! records, per thread, that the invariant was evaluated. Contract tests then
//! drive the coordinator and call [`contract_test`] to prove the checks they
//! rely on actually ran.
//!
//! ```rust,ignore
//! use crabrecord::invariant_ppt::contract_test;
//!
//! // drive a cycle on this thread, then:
//! contract_test("session anchor", &[
//!     "Session anchor is written once per cycle",
//!     "No sample is appended before the session anchor",
//! ]);
//! ```

use std::cell::RefCell;
use std::collections::BTreeSet;

thread_local! {
    static CHECKED: RefCell<BTreeSet<String>> = const { RefCell::new(BTreeSet::new()) };
}

/// Assert an invariant and note that it was checked on this thread.
///
/// Panics with the message (and optional context) when `condition` is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    CHECKED.with(|checked| {
        checked.borrow_mut().insert(message.to_string());
    });

    if !condition {
        panic!(
            "INVARIANT VIOLATION [{}]: {}",
            context.unwrap_or("unknown"),
            message
        );
    }
}

/// Invariants checked on this thread since the last clear, sorted
pub fn invariants_checked() -> Vec<String> {
    CHECKED.with(|checked| checked.borrow().iter().cloned().collect())
}

/// Panic unless every one of `required_invariants` was checked on this thread
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let missing: Vec<&str> = CHECKED.with(|checked| {
        let checked = checked.borrow();
        required_invariants
            .iter()
            .copied()
            .filter(|invariant| !checked.contains(*invariant))
            .collect()
    });

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Forget every invariant recorded on this thread
pub fn clear_invariant_log() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_invariants_are_recorded() {
        clear_invariant_log();
        crate::assert_invariant!(true, "holds", "tests");
        assert_eq!(invariants_checked(), vec!["holds".to_string()]);
        contract_test("recorded", &["holds"]);
    }

    #[test]
    #[should_panic(expected = "INVARIANT VIOLATION [tests]: broken")]
    fn test_violation_panics() {
        crate::assert_invariant!(false, "broken", "tests");
    }

    #[test]
    #[should_panic(expected = "CONTRACT FAILURE [missing]")]
    fn test_contract_reports_unchecked() {
        clear_invariant_log();
        contract_test("missing", &["never evaluated"]);
    }
}
