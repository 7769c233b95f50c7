//! Error types for codec operations

use thiserror::Error;

/// Error type for codec operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("bit count {0} outside of [1, 32]")]
    InvalidBitRange(u32),
    #[error("writer already finalized")]
    AlreadyFinalized,
    #[error("bit budget exceeded: {requested} > {budget}")]
    BudgetExceeded { requested: usize, budget: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("invalid tag format: {0}")]
    InvalidTagFormat(String),
    #[error("ordering number {0} outside of accepted range")]
    OutOfRangeOrdering(i32),
    #[error("ordering number {0} used more than once")]
    DuplicateOrdering(i32),
    #[error("unsupported type: {0}")]
    UnsupportedType(&'static str),
    #[error("unknown ordering number: {0}")]
    UnknownOrdering(i32),
    #[error("extra data found: {0} bits")]
    ExtraData(usize),
    #[error("field={name}: {source}")]
    Field {
        name: &'static str,
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps this error with the name of the field being processed.
    pub fn in_field(self, name: &'static str) -> Self {
        Self::Field {
            name,
            source: Box::new(self),
        }
    }

    /// Returns the innermost cause, skipping any field context.
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Self::Field { source, .. } = err {
            err = source;
        }
        err
    }

    /// Returns the field names leading to the innermost cause, outermost first.
    pub fn path(&self) -> Vec<&'static str> {
        let mut path = Vec::new();
        let mut err = self;
        while let Self::Field { name, source } = err {
            path.push(*name);
            err = source;
        }
        path
    }
}
