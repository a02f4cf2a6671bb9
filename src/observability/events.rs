//! Observable events of the metamodel compiler
//!
//! Events are explicit and typed. Compilation begin/complete/failed lines come
//! from `ObservationScope::new("COMPILE")` and share the `COMPILE_` prefix.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration file loaded and validated
    ConfigLoaded,
    /// One definition set read from disk
    DefinitionsLoaded,

    // Compilation
    /// One class linked (ancestry and properties composed)
    ClassLinked,
    /// Two unrelated ancestors declare the same property
    AmbiguousInheritance,
    /// Permission mask properties added to the carrier class
    PermissionsCarrierSynthesized,

    // Validation
    /// A record failed validation
    RecordRejected,
}

impl Event {
    /// Returns the event name as logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::DefinitionsLoaded => "DEFINITIONS_LOADED",
            Event::ClassLinked => "CLASS_LINKED",
            Event::AmbiguousInheritance => "AMBIGUOUS_INHERITANCE",
            Event::PermissionsCarrierSynthesized => "PERMISSIONS_CARRIER_SYNTHESIZED",
            Event::RecordRejected => "RECORD_REJECTED",
        }
    }

    /// Severity the event is normally logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ClassLinked | Event::PermissionsCarrierSynthesized => Severity::Trace,
            Event::AmbiguousInheritance => Severity::Warn,
            Event::ConfigLoaded | Event::DefinitionsLoaded | Event::RecordRejected => {
                Severity::Info
            }
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severities() {
        assert_eq!(Event::AmbiguousInheritance.severity(), Severity::Warn);
        assert_eq!(Event::ClassLinked.severity(), Severity::Trace);
        assert_eq!(Event::PermissionsCarrierSynthesized.severity(), Severity::Trace);
        assert_eq!(Event::RecordRejected.severity(), Severity::Info);
    }

    #[test]
    fn test_names_are_screaming_snake_case() {
        for event in [
            Event::ConfigLoaded,
            Event::DefinitionsLoaded,
            Event::ClassLinked,
            Event::AmbiguousInheritance,
            Event::PermissionsCarrierSynthesized,
            Event::RecordRejected,
        ] {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'), "{name}");
            assert_eq!(event.to_string(), name);
        }
    }
}
