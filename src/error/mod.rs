use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// The error type for flow loading and execution
///
/// Every variant aborts the whole flow run. Later steps usually depend on
/// earlier ones through the variable store, so nothing is skipped or retried.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("[E{code:04}] variable '{name}' is not defined", code = ErrorCode::VAR_UNDEFINED)]
    UndefinedVariable { name: String },

    #[error("[E{code:04}] variable '{name}' has no elements left to pop", code = ErrorCode::VAR_EXHAUSTED)]
    VariableExhausted { name: String },

    #[error(
        "[E{code:04}] type mismatch for {context}: expected {expected}, found {found}",
        code = ErrorCode::VAR_TYPE_MISMATCH
    )]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("[E{code:04}] '{entry}' not found in variable '{name}'", code = ErrorCode::VAR_ENTRY_NOT_FOUND)]
    EntryNotFound { name: String, entry: String },

    #[error("[E{code:04}] marker {marker} not found in document", code = ErrorCode::DOC_MARKER_NOT_FOUND)]
    MarkerNotFound { marker: String },

    #[error(
        "[E{code:04}] column '{column}' refers to branch element {index}, but the branch has {len} elements",
        code = ErrorCode::TABLE_COLUMN_INDEX
    )]
    ColumnIndexOutOfRange {
        column: String,
        index: usize,
        len: usize,
    },

    #[error("[E{code:04}] <{node_type}> is not tabular markup", code = ErrorCode::DOC_NOT_TABULAR)]
    NotTabular { node_type: String },

    #[error(
        "[E{code:04}] action '{action}' is missing required parameter '{parameter}'",
        code = ErrorCode::FLOW_MISSING_PARAMETER
    )]
    MissingRequiredParameter { action: String, parameter: String },

    #[error(
        "[E{code:04}] action '{action}' has invalid parameter '{parameter}': {reason}",
        code = ErrorCode::FLOW_INVALID_PARAMETER
    )]
    InvalidParameter {
        action: String,
        parameter: String,
        reason: String,
    },

    #[error(
        "[E{code:04}] action '{action}' found no <{node_type}> matching {filter}",
        code = ErrorCode::DOC_EMPTY_QUERY
    )]
    EmptyQueryResult {
        action: String,
        node_type: String,
        filter: String,
    },

    #[error("[E{code:04}] unknown action '{name}'", code = ErrorCode::FLOW_UNKNOWN_ACTION)]
    UnknownAction { name: String },

    #[error("[E{code:04}] failed to write {}", .path.display(), code = ErrorCode::PERSIST_IO)]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("[E{code:04}] invalid flow definition: {message}", code = ErrorCode::FLOW_INVALID_SYNTAX)]
    FlowDefinition {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FlowError {
    /// Create a type mismatch error
    pub fn type_mismatch(
        context: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a missing parameter error
    pub fn missing_parameter(action: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::MissingRequiredParameter {
            action: action.into(),
            parameter: parameter.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        action: impl Into<String>,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            action: action.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Create a flow definition error without a source
    pub fn definition(message: impl Into<String>) -> Self {
        Self::FlowDefinition {
            message: message.into(),
            source: None,
        }
    }

    /// Create a persistence error for a target path
    pub fn persistence(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// True for errors caused by reading a variable that has no value to give
    ///
    /// Covers both never-declared names and lists exhausted by `$name.pop`.
    pub fn is_undefined_variable(&self) -> bool {
        matches!(
            self,
            Self::UndefinedVariable { .. } | Self::VariableExhausted { .. }
        )
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::UndefinedVariable { .. } => ErrorCode::VAR_UNDEFINED,
            Self::VariableExhausted { .. } => ErrorCode::VAR_EXHAUSTED,
            Self::TypeMismatch { .. } => ErrorCode::VAR_TYPE_MISMATCH,
            Self::EntryNotFound { .. } => ErrorCode::VAR_ENTRY_NOT_FOUND,
            Self::MarkerNotFound { .. } => ErrorCode::DOC_MARKER_NOT_FOUND,
            Self::ColumnIndexOutOfRange { .. } => ErrorCode::TABLE_COLUMN_INDEX,
            Self::NotTabular { .. } => ErrorCode::DOC_NOT_TABULAR,
            Self::MissingRequiredParameter { .. } => ErrorCode::FLOW_MISSING_PARAMETER,
            Self::InvalidParameter { .. } => ErrorCode::FLOW_INVALID_PARAMETER,
            Self::EmptyQueryResult { .. } => ErrorCode::DOC_EMPTY_QUERY,
            Self::UnknownAction { .. } => ErrorCode::FLOW_UNKNOWN_ACTION,
            Self::Persistence { .. } => ErrorCode::PERSIST_IO,
            Self::FlowDefinition { .. } => ErrorCode::FLOW_INVALID_SYNTAX,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.code() {
            2000..=2999 => 2,
            3000..=3999 => 3,
            4000..=4999 => 4,
            5000..=5999 => 5,
            6000..=6999 => 6,
            _ => 1,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        let category = describe_error_code(self.code());
        match self {
            Self::Persistence { path, source } => {
                format!("{} ({}): {}", category, path.display(), source)
            }
            _ => format!("{}: {}", category, self),
        }
    }

    /// Get a developer-friendly error message with full chain
    pub fn developer_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }
        message
    }
}

/// Errors raised while reading a `scrapeflow.toml` file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("[E{code:04}] cannot read config file {}", .path.display(), code = ErrorCode::CONFIG_NOT_FOUND)]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[E{code:04}] invalid config file {}", .path.display(), code = ErrorCode::CONFIG_INVALID_TOML)]
    InvalidToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => ErrorCode::CONFIG_NOT_FOUND,
            Self::InvalidToml { .. } => ErrorCode::CONFIG_INVALID_TOML,
        }
    }

    /// Configuration problems share the generic failure status
    pub fn exit_code(&self) -> i32 {
        1
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { source, .. } => {
                format!("{}: {}: {}", describe_error_code(self.code()), self, source)
            }
            Self::InvalidToml { source, .. } => {
                format!("{}: {}\n{}", describe_error_code(self.code()), self, source)
            }
        }
    }
}

/// Type alias for Results using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

impl From<serde_yaml::Error> for FlowError {
    fn from(err: serde_yaml::Error) -> Self {
        FlowError::FlowDefinition {
            message: "invalid YAML syntax".to_string(),
            source: Some(Box::new(err)),
        }
    }
}
