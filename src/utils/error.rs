use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP client error: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Transient failure during {operation}: {message}")]
    TransientFetchError { operation: String, message: String },

    #[error("{operation} failed after {attempts} attempt(s): {message}")]
    FetchError {
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("Could not parse record {record}: {message}")]
    ParseError { record: String, message: String },

    #[error("Failed to persist sync state to {path}: {message}")]
    PersistenceError { path: String, message: String },

    #[error("Output sink error on section '{section}': {message}")]
    SinkError { section: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::ValidationError { .. } => ErrorCategory::Configuration,
            EtlError::ApiError(_)
            | EtlError::TransientFetchError { .. }
            | EtlError::FetchError { .. } => ErrorCategory::Network,
            EtlError::SerializationError(_) | EtlError::ParseError { .. } => ErrorCategory::Data,
            EtlError::CsvError(_)
            | EtlError::IoError(_)
            | EtlError::PersistenceError { .. }
            | EtlError::SinkError { .. } => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::ParseError { .. } => ErrorSeverity::Low,
            EtlError::TransientFetchError { .. } | EtlError::FetchError { .. } => {
                ErrorSeverity::Medium
            }
            // 狀態沒寫回去，下次執行會重複處理同一批資料
            EtlError::PersistenceError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 重試策略的判斷依據：只有暫時性錯誤才值得再試一次
    pub fn is_transient(&self) -> bool {
        match self {
            EtlError::TransientFetchError { .. } => true,
            EtlError::ApiError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => {
                "Check the settings file and the environment variables it references"
            }
            EtlError::ValidationError { .. } => {
                "Make sure every tracked author has at least a given name and a surname"
            }
            EtlError::ApiError(_)
            | EtlError::TransientFetchError { .. }
            | EtlError::FetchError { .. } => {
                "Check network connectivity and NCBI availability, then re-run; set NCBI_API_KEY for higher rate limits"
            }
            EtlError::ParseError { .. } | EtlError::SerializationError(_) => {
                "The upstream response was malformed; the record was skipped and will not block the run"
            }
            EtlError::PersistenceError { .. } => {
                "Fix permissions or disk space for the state file before the next run, otherwise records will be re-processed"
            }
            EtlError::SinkError { .. } => {
                "Check the output sink location; the audit CSV was still written"
            }
            EtlError::CsvError(_) | EtlError::IoError(_) => {
                "Check that the output directories exist and are writable"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not reach the bibliographic service: {}", self),
            ErrorCategory::Data => format!("Received data that could not be read: {}", self),
            ErrorCategory::Storage => format!("Could not write results: {}", self),
        }
    }

    /// 依嚴重程度決定程序結束碼
    pub fn exit_code(&self) -> i32 {
        severity_exit_code(self.severity())
    }
}

pub fn severity_exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 部分失敗
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
