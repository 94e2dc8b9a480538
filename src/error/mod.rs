use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Conversation error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors from a query or metrics call against the SIRA backend.
///
/// Classification order matters: transport conditions (no response,
/// client-side abort) are checked before the HTTP body is consulted.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Client-enforced abort at the configured wall-clock ceiling.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Request was sent but no HTTP response was obtained.
    #[error("No response from server: {message}")]
    NetworkUnreachable { message: String },

    /// An HTTP response arrived carrying an application-level error.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The backend replied 2xx but the body did not match the wire contract.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

/// Local rejections resolved before any network call is made.
///
/// These are not failures of an in-flight request; `begin_submit` refuses
/// to start one at all and leaves every piece of state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("Query is empty or whitespace-only")]
    EmptyQuery,

    #[error("A submission is already in flight")]
    InFlight,
}

/// Conversation store contract violations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store is already bound to a session and a different id was offered.
    #[error("Session already bound to {bound}, refusing rebind to {offered}")]
    SessionRebound { bound: String, offered: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for backend calls
pub type QueryResult<T> = Result<T, QueryError>;
