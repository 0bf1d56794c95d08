use hazard_common::HazardError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A row that cannot be mapped back into a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<StoreError> for HazardError {
    fn from(err: StoreError) -> Self {
        HazardError::Store(err.to_string())
    }
}
