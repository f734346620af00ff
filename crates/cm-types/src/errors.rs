use thiserror::Error;

/// Main error type for the call monitor
#[derive(Error, Debug)]
pub enum CmError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Data-related errors
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data source not found: {0}")]
    SourceNotFound(String),

    #[error("Symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Data corruption detected at line {line}: {message}")]
    Corruption { line: usize, message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },
}

/// Pricing-model input errors
#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Spot price must be positive, got {spot}")]
    NonPositiveSpot { spot: f64 },

    #[error("Strike price must be positive, got {strike}")]
    NonPositiveStrike { strike: f64 },

    #[error("Non-finite pricing input: {field} = {value}")]
    NonFinite { field: &'static str, value: f64 },
}

/// Result type alias for call monitor operations
pub type CmResult<T> = Result<T, CmError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::CmError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::CmError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DataError::Corruption {
            line: 7,
            message: "unparseable timestamp".to_string(),
        };

        assert!(error.to_string().contains("line 7"));
        assert!(error.to_string().contains("unparseable timestamp"));
    }

    #[test]
    fn test_error_conversion() {
        let pricing_error = PricingError::NonPositiveStrike { strike: -1.0 };
        let cm_error: CmError = pricing_error.into();

        match cm_error {
            CmError::Pricing(_) => (),
            _ => panic!("Expected Pricing error"),
        }
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert!(validation_err.to_string().contains("42"));
        let config_err = config_error!("Missing required field: {}", "contracts");
        assert!(matches!(config_err, CmError::Config(_)));
    }
}
