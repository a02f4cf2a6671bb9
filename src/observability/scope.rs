//! Begin/complete logging around one unit of work
//!
//! `{NAME}_BEGIN` is logged on creation, `{NAME}_COMPLETE` (with a
//! `duration_ms` field) or `{NAME}_FAILED` when the scope is closed, and
//! `{NAME}_INCOMPLETE` if it is dropped without either.

use std::cell::Cell;
use std::time::Instant;

use super::logger::Logger;

/// # Usage
///
/// ```ignore
/// let scope = ObservationScope::new("COMPILE");
/// match work() {
///     Ok(n) => scope.complete_with_fields(&[("classes", &n.to_string())]),
///     Err(e) => scope.fail_fatal(&e.to_string()),
/// }
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    started: Instant,
    completed: Cell<bool>,
}

impl<'a> ObservationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        Logger::info(&format!("{}_BEGIN", name), &[]);

        Self {
            name,
            started: Instant::now(),
            completed: Cell::new(false),
        }
    }

    pub fn complete_with_fields(self, fields: &[(&str, &str)]) {
        self.completed.set(true);
        let duration = self.elapsed_ms();

        let mut all_fields: Vec<(&str, &str)> = fields.to_vec();
        all_fields.push(("duration_ms", &duration));

        Logger::info(&format!("{}_COMPLETE", self.name), &all_fields);
    }

    /// Logs `{name}_FAILED` at FATAL level.
    pub fn fail_fatal(self, reason: &str) {
        self.completed.set(true);
        Logger::fatal(&format!("{}_FAILED", self.name), &[("reason", reason)]);
    }

    /// Milliseconds since the scope opened
    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}
