//! Observability subsystem
//!
//! Structured JSON logs, one line per event, with deterministic key order.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on compilation or validation
//! 3. No async or background threads
//! 4. Logs carry class and property names, never record values
//!
//! # Usage
//!
//! ```ignore
//! use metamodel::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::DefinitionsLoaded, &[("classes", "42")]);
//!
//! let scope = ObservationScope::new("COMPILE");
//! // ... do work ...
//! scope.complete_with_fields(&[("classes", "42")]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    match event.severity() {
        Severity::Error | Severity::Fatal => Logger::log_stderr(event.severity(), event.as_str(), fields),
        severity => Logger::log(severity, event.as_str(), fields),
    }
}
