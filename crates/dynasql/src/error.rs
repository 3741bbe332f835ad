//! Error types for the dynamic-SQL core.

use thiserror::Error;

/// Result type alias for mapper operations.
pub type MapperResult<T> = Result<T, MapperError>;

/// Error kinds raised by the dynamic-SQL tree, the method-signature analyzer,
/// command resolution, and the mapper-method dispatcher.
#[derive(Debug, Error)]
pub enum MapperError {
    /// No statement id matches the declared method, after walking every
    /// super-interface of its declaring trait.
    #[error("Missing statement: {0}")]
    MissingStatement(String),

    /// The statement registry returned a statement whose kind is `Unknown`.
    #[error("Statement '{0}' has an unknown statement kind")]
    UnknownStatementKind(String),

    /// Unknown template element, malformed `choose`, multiple `otherwise`,
    /// duplicate paging/result-handler parameters, or an invalid attribute.
    #[error("Build error: {0}")]
    Build(String),

    /// A name lookup in the strict parameter map failed.
    #[error("Missing parameter '{name}'; available parameters: [{available}]")]
    MissingParameter { name: String, available: String },

    /// A DML method's return type is not void/integer/long/boolean, or a
    /// SELECT method returned null into a primitive non-void return.
    #[error("Unsupported return type: {0}")]
    UnsupportedReturnType(String),

    /// Expression evaluation failed: missing property, type mismatch in a
    /// test, or a malformed expression string.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// An error surfaced by the session facade, forwarded unwrapped.
    #[error("Session error: {0}")]
    Session(String),
}

impl MapperError {
    /// Create a missing-statement error for a fully-qualified statement id.
    pub fn missing_statement(id: impl Into<String>) -> Self {
        Self::MissingStatement(id.into())
    }

    /// Create a build error with a free-form message.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Create a missing-parameter error, enumerating the names that *were*
    /// available so the caller can fix the call site without guessing.
    pub fn missing_parameter(name: impl Into<String>, available: &[impl AsRef<str>]) -> Self {
        Self::MissingParameter {
            name: name.into(),
            available: available
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Create an unsupported-return-type error.
    pub fn unsupported_return_type(message: impl Into<String>) -> Self {
        Self::UnsupportedReturnType(message.into())
    }

    /// Create an expression-evaluation error.
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    /// Wrap an error surfaced by the session facade.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// `true` for errors that spec §7 designates fatal at configuration/
    /// analysis time, as opposed to propagating to the interface-method caller.
    pub fn is_build_time(&self) -> bool {
        matches!(
            self,
            Self::Build(_) | Self::MissingStatement(_) | Self::UnknownStatementKind(_)
        )
    }
}
