use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read hours config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed hours config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid hours {hours} for subject {subject:?} in program {program:?}")]
    InvalidHours {
        program: String,
        subject: String,
        hours: f64,
    },

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read attendance export {path}: {source}")]
    Read { path: PathBuf, source: csv::Error },

    #[error("attendance row {line} does not match the expected columns: {source}")]
    Row { line: u64, source: csv::Error },
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("history schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
