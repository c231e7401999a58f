use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ChiResult<T> = Result<T, ChiError>;
pub type ProviderResult<T> = ChiResult<T>;

/// Failure classes surfaced to callers; each maps to one process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChiErrorCategory {
    ConfigurationError,
    InputValidationError,
    InsufficientDataError,
    ProviderError,
    InternalError,
}

impl ChiErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::ConfigurationError | Self::InputValidationError => 2,
            Self::ProviderError => 3,
            Self::InsufficientDataError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigurationError => "ConfigurationError",
            Self::InputValidationError => "InputValidationError",
            Self::InsufficientDataError => "InsufficientDataError",
            Self::ProviderError => "ProviderError",
            Self::InternalError => "InternalError",
        }
    }
}

impl Display for ChiErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// An aggregation failure: its category, a stable `AREA.REASON` placeholder
/// and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChiError {
    category: ChiErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl ChiError {
    pub fn new(
        category: ChiErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn configuration(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ChiErrorCategory::ConfigurationError, placeholder, message)
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ChiErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn insufficient_data(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ChiErrorCategory::InsufficientDataError, placeholder, message)
    }

    pub fn provider(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ChiErrorCategory::ProviderError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ChiErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> ChiErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// `ERROR: [PLACEHOLDER] message`, the line printed on stderr.
    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}

impl Display for ChiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.category, self.placeholder, self.message)
    }
}

impl Error for ChiError {}

impl From<rusqlite::Error> for ChiError {
    fn from(source: rusqlite::Error) -> Self {
        Self::provider("PROVIDER.SQLITE", source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ChiError, ChiErrorCategory};

    #[test]
    fn categories_share_exit_codes_only_for_caller_mistakes() {
        assert_eq!(ChiErrorCategory::ConfigurationError.exit_code(), 2);
        assert_eq!(ChiErrorCategory::InputValidationError.exit_code(), 2);
        assert_eq!(ChiErrorCategory::ProviderError.exit_code(), 3);
        assert_eq!(ChiErrorCategory::InsufficientDataError.exit_code(), 4);
        assert_eq!(ChiErrorCategory::InternalError.exit_code(), 5);
    }

    #[test]
    fn diagnostic_line_carries_placeholder_and_message() {
        let error = ChiError::configuration("CONFIG.K_STEP", "k_step must be > 0, got -0.05");
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [CONFIG.K_STEP] k_step must be > 0, got -0.05"
        );
        assert_eq!(
            error.to_string(),
            "ConfigurationError [CONFIG.K_STEP] k_step must be > 0, got -0.05"
        );
    }

    #[test]
    fn sqlite_errors_become_provider_errors() {
        let error: ChiError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(error.category(), ChiErrorCategory::ProviderError);
        assert_eq!(error.placeholder(), "PROVIDER.SQLITE");
        assert_eq!(error.exit_code(), 3);
    }
}
