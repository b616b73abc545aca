use crate::error::{self, Result};
use log::{debug, error};
use std::fmt::{Debug, Display};

/// Collects the outcome of the non-fatal checks of a scenario so that one run reports every
/// mismatch instead of stopping at the first.
#[derive(Debug, Default)]
pub struct Checks {
    passed: usize,
    failures: Vec<String>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a check. Returns `ok` so callers can skip dependent checks.
    pub fn check<D: Display>(&mut self, ok: bool, what: D) -> bool {
        if ok {
            debug!("Passed: {}", what);
            self.passed += 1;
        } else {
            error!("Failed: {}", what);
            self.failures.push(what.to_string());
        }
        ok
    }

    pub fn equal<T>(&mut self, what: &str, expected: T, actual: T) -> bool
    where
        T: Debug + PartialEq,
    {
        let ok = expected == actual;
        self.check(
            ok,
            format!("{}: expected {:?}, got {:?}", what, expected, actual),
        )
    }

    pub fn not_empty(&mut self, what: &str, value: &str) -> bool {
        self.check(!value.is_empty(), format!("{} is not empty", what))
    }

    pub fn contains(&mut self, what: &str, value: &str, part: &str) -> bool {
        self.check(
            value.contains(part),
            format!("{}: '{}' contains '{}'", what, value, part),
        )
    }

    /// Compares two lists ignoring their order.
    pub fn same_elements<S>(&mut self, what: &str, expected: &[S], actual: &[S]) -> bool
    where
        S: AsRef<str>,
    {
        let mut expected: Vec<&str> = expected.iter().map(AsRef::as_ref).collect();
        let mut actual: Vec<&str> = actual.iter().map(AsRef::as_ref).collect();
        expected.sort_unstable();
        actual.sort_unstable();
        self.equal(what, expected, actual)
    }

    /// Record a fallible step as a check. The value is returned when the step succeeded.
    pub fn ok<T, E>(&mut self, what: &str, result: std::result::Result<T, E>) -> Option<T>
    where
        E: Display,
    {
        match result {
            Ok(value) => {
                self.check(true, what);
                Some(value)
            }
            Err(e) => {
                self.check(false, format!("{}: {}", what, e));
                None
            }
        }
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Fails with every recorded mismatch if any check failed.
    pub fn into_result(self) -> Result<usize> {
        if self.failures.is_empty() {
            Ok(self.passed)
        } else {
            error::ChecksFailedSnafu {
                passed: self.passed,
                failures: self.failures,
            }
            .fail()
        }
    }
}
