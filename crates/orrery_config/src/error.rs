//! # Configuration Error Types
//!
//! All errors that can occur while loading or resolving a manifest.

use thiserror::Error;

/// Errors that can occur in configuration handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The manifest is not valid TOML or does not match the manifest schema.
    #[error("manifest parse error: {0}")]
    Parse(String),

    /// The manifest could not be serialised.
    #[error("manifest serialise error: {0}")]
    Serialize(String),

    /// The manifest file could not be read or written.
    #[error("manifest I/O error at {path}: {message}")]
    Io {
        /// Path of the manifest.
        path: String,
        /// Underlying error message.
        message: String,
    },

    /// A name in the manifest has no catalog registration.
    #[error("unknown type in manifest: {0}")]
    UnknownType(String),

    /// A name appears twice in one manifest section.
    #[error("type {name} listed more than once in [{section}]")]
    DuplicateType {
        /// The duplicated name.
        name: String,
        /// The manifest section.
        section: &'static str,
    },

    /// A name is registered twice in a catalog.
    #[error("type name {0} is already registered in the catalog")]
    DuplicateRegistration(String),

    /// A `[[services]]` entry names a type that is not a service.
    #[error("{0} is registered but is not a service type")]
    NotAService(String),

    /// A service preset does not deserialise into its service type.
    #[error("invalid preset for {name}: {message}")]
    InvalidPreset {
        /// The service name.
        name: String,
        /// Deserialisation error message.
        message: String,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialize(error.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
