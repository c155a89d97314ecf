use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Errors surfaced by a [`crate::PersistenceSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{entity} {key} rejected by sink: {reason}")]
    Rejected {
        entity: &'static str,
        key: String,
        reason: String,
    },

    #[error("unknown {entity} {key}")]
    UnknownKey { entity: &'static str, key: String },
}
