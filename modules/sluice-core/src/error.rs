use thiserror::Error;

/// Configuration errors. Surfaced at construction time, never at dispatch.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("invalid action pattern {0:?}: no action names")]
    EmptyPattern(String),

    #[error("invalid action pattern {pattern:?}: {source}")]
    PatternRegex {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid logic module: {0}")]
    InvalidLogic(String),
}
