//! Error types for fluentsql

use thiserror::Error;

/// Result type alias for builder operations
pub type BuilderResult<T> = Result<T, BuilderError>;

/// Error types for query building and execution
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Bad or unsupported connection configuration. Fatal at initialization.
    #[error("Config error: {0}")]
    Config(String),

    /// The IR cannot be lowered to SQL (e.g. no target table). Programmer error.
    #[error("Compile error: {0}")]
    Compile(String),

    /// A prepare/execute failure reported by the driver.
    ///
    /// Carries the compiled SQL and its bindings so the failing statement can
    /// be reproduced from the error alone.
    #[error("Driver error: {message}; sql: {sql}; bindings: {bindings:?}")]
    Driver {
        sql: String,
        bindings: Vec<String>,
        message: String,
    },
}

impl BuilderError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a compile error
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    /// Create a driver error for a compiled statement
    pub fn driver(
        sql: impl Into<String>,
        bindings: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Driver {
            sql: sql.into(),
            bindings,
            message: message.into(),
        }
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a compile error
    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile(_))
    }

    /// Check if this is a driver error
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver { .. })
    }
}

impl From<serde_yaml::Error> for BuilderError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}
