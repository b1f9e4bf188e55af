//! Domain error types.

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum TradesimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("invalid data at row {row}: {reason}")]
    DataRow { row: usize, reason: String },

    #[error("no bars supplied")]
    EmptyInput,

    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientBars { bars: usize, minimum: usize },

    #[error("length mismatch: {bars} bars but {signals} signals")]
    LengthMismatch { bars: usize, signals: usize },

    #[error("signal at bar {index} is directional but has no {level}")]
    MissingSignalLevel { index: usize, level: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradesimError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TradesimError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TradesimError> for std::process::ExitCode {
    fn from(err: &TradesimError) -> Self {
        let code: u8 = match err {
            TradesimError::Io(_) => 1,
            TradesimError::ConfigParse { .. }
            | TradesimError::ConfigMissing { .. }
            | TradesimError::ConfigInvalid { .. } => 2,
            TradesimError::DataSource { .. } | TradesimError::DataRow { .. } => 3,
            TradesimError::EmptyInput
            | TradesimError::InsufficientBars { .. }
            | TradesimError::LengthMismatch { .. }
            | TradesimError::MissingSignalLevel { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
