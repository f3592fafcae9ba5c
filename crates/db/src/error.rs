/// Errors surfaced by [`Store`](crate::store::Store) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The write would violate an ownership or uniqueness rule.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The input violates a row invariant (e.g. expiry before creation).
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// The underlying database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
