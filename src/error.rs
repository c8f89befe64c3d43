use thiserror::Error;

/// Failure while locating, compiling, or initializing a script.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The name does not follow the script-file naming convention. Raised
    /// before any filesystem or interpreter work happens.
    #[error("invalid script name '{name}': expected a name ending in '{suffix}'")]
    BadName { name: String, suffix: String },

    /// The source could not be read or compiled.
    #[error("failed to load script '{name}': {reason}")]
    NotFound { name: String, reason: String },

    /// The script's top-level body raised while running its one-time setup.
    #[error("script '{name}' raised during initialization: {message}")]
    InitFailed { name: String, message: String },
}

/// An entry-point call raised during an update cycle. Fatal to the whole
/// pool: there is no per-object isolation of failures.
#[derive(Debug, Error)]
#[error("error while calling '{entry_point}': {message}")]
pub struct InvocationError {
    pub entry_point: String,
    pub message: String,
}

/// Everything that can take a worker down. The supervisor treats any variant
/// as fatal to the run; a softer policy would pattern-match here instead.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}
