//! Fatal conditions which abort assembly of the constraint system.
//!
//! Build functions return [`anyhow::Result`]; the variants here are the root causes callers may
//! want to distinguish, retrievable with `err.downcast_ref::<BuildError>()`.
use thiserror::Error;

/// A reason for refusing to build the constraint system
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    /// Inconsistent generator characteristics
    #[error("Invalid configuration for generator {generator}: {message}")]
    Configuration {
        /// The offending generator
        generator: String,
        /// What is wrong with it
        message: String,
    },
    /// A linked horizon needs boundary values which were never supplied
    #[error("Missing linked boundary data for generator {generator} at linked timepoint {linked_index}")]
    MissingBoundaryData {
        /// The generator whose history is needed
        generator: String,
        /// Index of the linked timepoint (0 is the one immediately preceding the subproblem)
        linked_index: i32,
    },
    /// The temporal index is inconsistent
    #[error("Invalid temporal index: {0}")]
    InvalidTemporalIndex(String),
}

impl BuildError {
    /// Construct a [`BuildError::Configuration`]
    pub fn configuration(generator: impl ToString, message: impl Into<String>) -> Self {
        Self::Configuration {
            generator: generator.to_string(),
            message: message.into(),
        }
    }
}
