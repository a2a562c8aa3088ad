//! Error types for tracking operations.
//!
//! Two layers of error exist:
//!
//! - [`FetchError`]: the raw failure a fetch operation reports. It is whatever
//!   the data source could tell us, a code, a message or an I/O error.
//! - [`TrackingError`]: the classified form the controller stores and
//!   publishes. It carries an [`ErrorCode`] and a retryability flag derived
//!   from that code.
//!
//! Conversion from the first to the second happens in [`crate::classify`].

use std::fmt;

use tokio::time::Instant;

/// Classification of a tracking failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ErrorCode {
    /// The fetch did not complete within the configured timeout.
    Timeout,
    /// Transient transport failure (connection lost, source unavailable).
    Network,
    /// The data source refused access. Retrying will not help.
    Permission,
    /// The retry budget is exhausted.
    MaxRetries,
    /// Anything the classifier did not recognize.
    Unknown,
}

impl ErrorCode {
    /// Whether errors with this code are eligible for automatic retry.
    ///
    /// Unrecognized failures are treated as transient.
    ///
    /// ```rust
    /// use livetrack::ErrorCode;
    ///
    /// assert!(ErrorCode::Timeout.is_retryable());
    /// assert!(ErrorCode::Unknown.is_retryable());
    /// assert!(!ErrorCode::Permission.is_retryable());
    /// assert!(!ErrorCode::MaxRetries.is_retryable());
    /// ```
    pub fn is_retryable(self) -> bool {
        match self {
            ErrorCode::Timeout | ErrorCode::Network | ErrorCode::Unknown => true,
            ErrorCode::Permission | ErrorCode::MaxRetries => false,
        }
    }

    /// Stable upper-case name, used in log output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Network => "NETWORK",
            ErrorCode::Permission => "PERMISSION",
            ErrorCode::MaxRetries => "MAX_RETRIES",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified tracking failure.
///
/// Immutable once constructed; the controller replaces it wholesale when a
/// newer failure arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingError {
    code: ErrorCode,
    message: String,
    occurred_at: Instant,
    retryable: bool,
}

impl TrackingError {
    /// Create an error stamped with the current time.
    ///
    /// Retryability follows [`ErrorCode::is_retryable`].
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            occurred_at: Instant::now(),
            retryable: code.is_retryable(),
        }
    }

    /// The terminal error emitted once `retries` consecutive failures used
    /// up the budget.
    pub fn max_retries(retries: u32) -> Self {
        Self::new(
            ErrorCode::MaxRetries,
            format!("maximum retry attempts ({}) exceeded", retries),
        )
    }

    /// The error emitted when a fetch outlives its timeout.
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("location request timed out after {:?}", after),
        )
    }

    /// The failure classification.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable description, suitable for display.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// When the failure was observed.
    pub fn occurred_at(&self) -> Instant {
        self.occurred_at
    }

    /// Whether the scheduler may retry automatically.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for TrackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for TrackingError {}

/// A raw failure reported by a fetch operation.
///
/// Data sources report whatever they know; the classifier turns it into a
/// [`TrackingError`].
#[derive(Debug)]
pub enum FetchError {
    /// The source itself gave up waiting.
    Timeout,
    /// Transport-level failure.
    Network(String),
    /// Access to the source was refused.
    PermissionDenied(String),
    /// A numeric failure code, using the Geolocation API numbering
    /// (1 = permission denied, 2 = position unavailable, 3 = timeout).
    Code {
        /// The numeric code.
        code: u16,
        /// Accompanying message.
        message: String,
    },
    /// Free-form failure text.
    Message(String),
    /// An I/O error from the underlying transport.
    Io(std::io::Error),
}

impl FetchError {
    /// Build a free-text failure.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Build a coded failure.
    pub fn code(code: u16, message: impl Into<String>) -> Self {
        Self::Code {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::Network(msg) => write!(f, "network error: {}", msg),
            FetchError::PermissionDenied(msg) => write!(f, "permission denied: {}", msg),
            FetchError::Code { code, message } => write!(f, "error {}: {}", code, message),
            FetchError::Message(msg) => write!(f, "{}", msg),
            FetchError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Io(e)
    }
}
