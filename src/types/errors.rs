use thiserror::Error;

// === TabError ===

/// Errors related to tab-state storage operations.
#[derive(Debug, Error)]
pub enum TabError {
    /// Tab with the given ID was not found.
    #[error("Tab not found: {0}")]
    NotFound(String),
    /// A tab with the given ID already exists.
    #[error("Tab already exists: {0}")]
    AlreadyExists(String),
    /// The tab is frozen and cannot leave its canonical path.
    #[error("Tab is frozen: {0}")]
    Frozen(String),
}

// === ViewError ===

/// Errors reported by an embedded view when executing a command.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The view (or its content host) has been torn down.
    #[error("View destroyed")]
    Destroyed,
    /// Script evaluation failed inside the hosted page.
    #[error("Script error: {0}")]
    Script(String),
    /// The platform backend refused the command.
    #[error("View backend error: {0}")]
    Backend(String),
}

// === FetchError ===

/// Errors raised while fetching entities or pages from the network.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure: connection refused, DNS, timeout.
    #[error("Network error: {0}")]
    Network(String),
    /// The remote API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
    /// The local entity cache failed.
    #[error("Cache error: {0}")]
    Cache(String),
}

impl FetchError {
    /// Whether this failure is transient and should be retried later
    /// rather than surfaced to the user.
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            FetchError::Network(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            FetchError::Decode(e.to_string())
        }
    }
}

impl From<rusqlite::Error> for FetchError {
    fn from(e: rusqlite::Error) -> Self {
        FetchError::Cache(e.to_string())
    }
}

// === ResolveError ===

/// Errors raised while resolving display data for a tab.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to fetch tab data")]
    Fetch(#[from] FetchError),
    /// The resolved data was malformed.
    #[error("Invalid tab data: {0}")]
    InvalidData(String),
}

impl ResolveError {
    pub fn is_network(&self) -> bool {
        matches!(self, ResolveError::Fetch(e) if e.is_network())
    }

    /// Multi-line rendering of the error and every source below it,
    /// shown in the toast tab as technical detail.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

// === SessionError ===

/// Errors related to tab snapshot persistence.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Failed to serialize or deserialize snapshot data.
    #[error("Session serialization error: {0}")]
    SerializationError(String),
    /// Database operation failed.
    #[error("Session database error: {0}")]
    DatabaseError(String),
}

// === SettingsError ===

/// Errors related to engine settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The key does not name a setting.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === ChannelError ===

/// Errors parsing a request on the internal pseudo-protocol.
#[derive(Debug, Error, PartialEq)]
pub enum ChannelError {
    #[error("Malformed internal request: {0}")]
    Malformed(String),
    #[error("Missing parameter: {0}")]
    MissingParam(&'static str),
}
