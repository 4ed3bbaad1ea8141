//! Error types for the loader.

use crate::runner::namespace::Namespace;

/// Why a single resource could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The channel answered, but outside the 2xx range (after status normalization).
    #[error("unexpected status {0}")]
    Status(u16),

    /// The channel itself failed (I/O, connection, ...).
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors surfaced by the loader to callers and error callbacks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoaderError {
    /// `require` had nothing left to wait for but no callback to run.
    #[error("require({names}) is already satisfied but no callback was provided")]
    MissingCallback { names: String },

    /// A required resource could not be fetched.
    #[error("failed to load {namespace} from {url}: {source}")]
    FetchFailure {
        namespace: Namespace,
        url: String,
        #[source]
        source: FetchError,
    },

    /// A fetched module script failed to parse or execute.
    #[error("script error in {url}: {message}")]
    Script { url: String, message: String },

    /// A pending request outlived its deadline.
    #[error("timed out after {waited_ms}ms waiting for {pending}")]
    Timeout { pending: String, waited_ms: u64 },

    /// A namespace segment is occupied by a truthy scalar.
    #[error("cannot define {path}: segment '{segment}' holds a value")]
    NamespaceConflict { path: String, segment: String },

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl LoaderError {
    /// The namespace whose failure caused this error, if any.
    pub fn namespace(&self) -> Option<&Namespace> {
        match self {
            LoaderError::FetchFailure { namespace, .. } => Some(namespace),
            _ => None,
        }
    }
}

/// Joins namespace names for error messages.
pub(crate) fn join_names(names: &[Namespace]) -> String {
    names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
