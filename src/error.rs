use std::fmt::{Display, Formatter, Write};

use serde_json_bytes::Value as JsonValue;

/// One segment of a response path, as it would appear in a GraphQL error's `path` array.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{name}"),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// A single failure, scoped to one place in the composed schema or one delegated
/// sub-request. Mirrors the shape of a GraphQL error, plus a `path` we can still
/// relocate (see [`PathSegment`]) before it is handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SingleStitchError {
    #[error("duplicate schema definition for type `{type_name}`")]
    DuplicateSchemaDefinition { type_name: String },

    #[error("resolver configured for unknown type `{type_name}`")]
    UnknownTypeInResolvers { type_name: String },

    #[error("invalid argument for @{directive} on `{target}`: {message}")]
    InvalidDirectiveArgument {
        directive: String,
        target: String,
        message: String,
    },

    #[error("conflicting @canonical declarations for `{type_name}`")]
    ConflictingCanonicalDeclaration { type_name: String },

    #[error("subschema `{subschema}` is not configured for merge type handling it claims")]
    UnsupportedMergeConfig { subschema: String, message: String },

    #[error("delegation to subschema `{subschema}` failed: {message}")]
    DelegationTransportError {
        subschema: String,
        message: String,
        path: Vec<PathSegment>,
    },

    #[error("{message}")]
    SubschemaFieldError {
        message: String,
        path: Vec<PathSegment>,
        extensions: Option<JsonValue>,
    },

    #[error("{message}")]
    UnpathedError {
        message: String,
        extensions: Option<JsonValue>,
    },

    #[error("no subschema can resolve `{response_key}` on `{type_name}` given the fields already fetched")]
    PlannerDeadEnd {
        type_name: String,
        response_key: String,
    },
}

impl SingleStitchError {
    /// Returns a copy of this error relocated to `path`, used when an
    /// [`Self::UnpathedError`] is finally attached to the field that triggered it
    /// (invariant 4 in the data model).
    pub fn relocate(self, path: Vec<PathSegment>) -> Self {
        match self {
            SingleStitchError::UnpathedError {
                message,
                extensions,
            } => SingleStitchError::SubschemaFieldError {
                message,
                path,
                extensions,
            },
            other => other,
        }
    }

    pub fn path(&self) -> Option<&[PathSegment]> {
        match self {
            SingleStitchError::DelegationTransportError { path, .. } => Some(path),
            SingleStitchError::SubschemaFieldError { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Several [`SingleStitchError`]s collected together, e.g. during composition where
/// many subschemas may each contribute an independent failure.
#[derive(Debug)]
pub struct StitchErrors {
    pub causes: Vec<SingleStitchError>,
}

impl StitchErrors {
    pub fn new(causes: Vec<SingleStitchError>) -> Self {
        Self { causes }
    }
}

impl Display for StitchErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s) while composing schema:", self.causes.len())?;
        for error in &self.causes {
            write!(f, "\n\n  - ")?;
            for c in error.to_string().chars() {
                if c == '\n' {
                    write!(f, "\n    ")?;
                } else {
                    f.write_char(c)?;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for StitchErrors {}

/// The top-level error type returned from this crate's public API. A thin
/// `#[error(transparent)]` wrapper, matching the umbrella/single split the rest
/// of this codebase uses for layered error reporting.
#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error(transparent)]
    Single(#[from] SingleStitchError),
    #[error(transparent)]
    Aggregate(#[from] StitchErrors),
    #[error("failed to parse schema or operation: {0}")]
    Parse(String),
}

impl StitchError {
    pub fn configuration(message: impl Into<String>) -> StitchError {
        StitchError::Single(SingleStitchError::UnsupportedMergeConfig {
            subschema: String::new(),
            message: message.into(),
        })
    }
}

pub type StitchResult<T> = Result<T, StitchError>;
