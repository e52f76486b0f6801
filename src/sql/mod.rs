//! SQL safety validation, governance and error classification.

pub mod classify;
pub mod governor;
pub mod safety;

pub use classify::{classify_execution_error, ExecutionErrorClass};
pub use governor::{Governor, QueryOutput};
pub use safety::validate;
