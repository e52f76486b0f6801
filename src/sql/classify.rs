//! Execution-error classification for the repair loop.

use serde::{Deserialize, Serialize};

/// Whether a database execution failure is worth a repair round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionErrorClass {
    /// The query disagrees with the live schema (missing column/relation).
    /// A regenerated query with the error in context can fix this.
    SchemaMismatch,
    /// Timeout, cost rejection, connectivity, or anything else. Retrying the
    /// generator with the same inputs is not expected to help.
    NonRepairable,
}

/// Classify a database error message.
///
/// The rule is a substring heuristic inherited from the reference system:
/// messages containing "does not exist", "column" or "relation" are treated
/// as schema mismatches. It can over-match (a timeout message mentioning a
/// column name would be misclassified), which is accepted as a known
/// limitation of the rule rather than silently tightened.
pub fn classify_execution_error(message: &str) -> ExecutionErrorClass {
    let lowered = message.to_lowercase();
    const SCHEMA_MARKERS: [&str; 3] = ["does not exist", "column", "relation"];

    if SCHEMA_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ExecutionErrorClass::SchemaMismatch
    } else {
        ExecutionErrorClass::NonRepairable
    }
}
