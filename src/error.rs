use crate::config::ConfigError;
use crate::orchestration::AnalysisError;
use crate::report::ReportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: AppError = ConfigError::MissingEnv("DATABASE_PATH".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required environment variable: DATABASE_PATH"
        );
    }
}
