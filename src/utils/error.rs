use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnhancerError {
    // ---- 聚合 / 驗證 ----
    #[error("Column '{column}' is already configured")]
    AlreadyConfigured { column: String },

    #[error("Column '{column}' has not been added to the configuration")]
    UnknownColumn { column: String },

    #[error("Invalid row count {rows}: rows to generate cannot be negative")]
    InvalidRowCount { rows: i64 },

    #[error("Invalid column name '{name}': {reason}")]
    InvalidColumnName { name: String, reason: String },

    #[error("Transformation config is invalid: {}", .violations.join("; "))]
    InvalidTransformation { violations: Vec<String> },

    #[error("Per-column maps disagree on their keys: {}", .mismatches.join("; "))]
    WireKeyMismatch { mismatches: Vec<String> },

    // ---- 提交政策 ----
    #[error("Nothing to process: configure at least one column or set rows to generate")]
    NothingToProcess,

    #[error("No dataset has been uploaded yet")]
    NoDataset,

    #[error("A processing request is already in flight")]
    SubmissionInFlight,

    #[error("Instruction cannot be empty")]
    EmptyInstruction,

    // ---- 外部服務 ----
    #[error("Upload rejected: {message}")]
    UploadRejected { message: String },

    #[error("Configuration generation failed{}", detail_suffix(.detail))]
    GenerationFailed { detail: Option<String> },

    #[error("Processing failed{}", detail_suffix(.detail))]
    ProcessingFailed { detail: Option<String> },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    // ---- 系統 / 設定 ----
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 聚合不變量被違反（多半可在本地修正）
    Validation,
    /// 提交時的政策檢查未通過
    Policy,
    /// 上傳 / 產生 / 處理 / 下載服務失敗
    Collaborator,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EnhancerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EnhancerError::AlreadyConfigured { .. }
            | EnhancerError::UnknownColumn { .. }
            | EnhancerError::InvalidRowCount { .. }
            | EnhancerError::InvalidColumnName { .. }
            | EnhancerError::InvalidTransformation { .. }
            | EnhancerError::WireKeyMismatch { .. } => ErrorCategory::Validation,

            EnhancerError::NothingToProcess
            | EnhancerError::NoDataset
            | EnhancerError::SubmissionInFlight
            | EnhancerError::EmptyInstruction => ErrorCategory::Policy,

            EnhancerError::UploadRejected { .. }
            | EnhancerError::GenerationFailed { .. }
            | EnhancerError::ProcessingFailed { .. }
            | EnhancerError::NotFound { .. }
            | EnhancerError::ApiError(_) => ErrorCategory::Collaborator,

            EnhancerError::ConfigError { .. }
            | EnhancerError::ConfigValidationError { .. }
            | EnhancerError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,

            EnhancerError::IoError(_) | EnhancerError::SerializationError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation => match self {
                // 欄位早已設定好，等同已完成
                EnhancerError::AlreadyConfigured { .. } => ErrorSeverity::Low,
                _ => ErrorSeverity::Medium,
            },
            ErrorCategory::Policy => ErrorSeverity::Medium,
            ErrorCategory::Collaborator => match self {
                // 結果檔尚未產生，稍後再下載即可
                EnhancerError::NotFound { .. } => ErrorSeverity::Medium,
                _ => ErrorSeverity::High,
            },
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EnhancerError::GenerationFailed { detail } => detail
                .clone()
                .unwrap_or_else(|| "Error generating configuration".to_string()),
            EnhancerError::ProcessingFailed { detail } => detail
                .clone()
                .unwrap_or_else(|| "Error processing file".to_string()),
            EnhancerError::UploadRejected { message } => format!("Upload rejected: {}", message),
            EnhancerError::NotFound { resource } => {
                format!("'{}' is not available (yet)", resource)
            }
            EnhancerError::NothingToProcess => {
                "Please configure at least one column or set the number of rows to generate"
                    .to_string()
            }
            EnhancerError::NoDataset => "Please upload a CSV file first".to_string(),
            EnhancerError::SubmissionInFlight => {
                "The file is already being processed, please wait".to_string()
            }
            EnhancerError::EmptyInstruction => {
                "Please enter a description of what you want to do".to_string()
            }
            EnhancerError::ApiError(_) => {
                "Could not reach the processing service".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EnhancerError::AlreadyConfigured { .. } => {
                "Edit the existing column configuration instead of adding it again"
            }
            EnhancerError::UnknownColumn { .. } => "Add the column before updating it",
            EnhancerError::InvalidRowCount { .. } => "Use zero or a positive number of rows",
            EnhancerError::InvalidColumnName { .. } => {
                "Choose a non-empty name that is not already a dataset column"
            }
            EnhancerError::InvalidTransformation { .. } | EnhancerError::WireKeyMismatch { .. } => {
                "Regenerate the configuration or fix the listed columns manually"
            }
            EnhancerError::NothingToProcess => {
                "Configure a column or request generated rows before submitting"
            }
            EnhancerError::NoDataset => "Upload a CSV file first",
            EnhancerError::SubmissionInFlight => "Wait for the current processing request to finish",
            EnhancerError::EmptyInstruction => "Describe the transformation you want in plain words",
            EnhancerError::UploadRejected { .. } => "Make sure the file is a readable CSV with a header row",
            EnhancerError::GenerationFailed { .. } => {
                "Rephrase the instruction and try again, or configure the columns manually"
            }
            EnhancerError::ProcessingFailed { .. } => "Check the service logs and submit again",
            EnhancerError::NotFound { .. } => "Try downloading the result again in a little while",
            EnhancerError::ApiError(_) => "Check the service URL and your network connection",
            EnhancerError::IoError(_) => "Check file paths and permissions",
            EnhancerError::SerializationError(_) => "Check that the JSON file is well formed",
            EnhancerError::ConfigError { .. }
            | EnhancerError::ConfigValidationError { .. }
            | EnhancerError::InvalidConfigValueError { .. } => "Fix the configuration file or CLI flags",
        }
    }
}

pub type Result<T> = std::result::Result<T, EnhancerError>;
