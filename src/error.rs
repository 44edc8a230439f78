//! Synthesis and resolution error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning configuration and parameters into a template.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("{label} is not defined, use: --parameters {name}={example}")]
    MissingParameter {
        label: String,
        name: String,
        example: String,
    },

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("malformed parameter '{0}', expected KEY=VALUE")]
    MalformedParameter(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("template JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("template YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),
}

pub type SynthResult<T> = Result<T, SynthError>;

/// Errors raised while evaluating intrinsic functions against provisioned values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unresolved reference: {0}")]
    Unresolved(String),

    #[error("unresolved attribute: {logical_id}.{attribute}")]
    UnresolvedAttribute {
        logical_id: String,
        attribute: String,
    },

    #[error("Fn::Select index {index} out of range for list of {len}")]
    SelectOutOfRange { index: usize, len: usize },

    #[error("malformed intrinsic function: {0}")]
    MalformedIntrinsic(String),
}
