//! Classify raw fetch failures into tracking error codes.

use std::io;

use crate::error::{ErrorCode, FetchError, TrackingError};

/// Classify a raw failure into a [`TrackingError`].
///
/// ```rust
/// use livetrack::{classify, ErrorCode, FetchError};
///
/// let err = classify(&FetchError::message("User denied Geolocation"));
/// assert_eq!(err.code(), ErrorCode::Permission);
/// assert!(!err.is_retryable());
/// ```
pub fn classify(raw: &FetchError) -> TrackingError {
    let code = classify_code(raw);
    tracing::debug!(code = %code, error = %raw, "classified fetch failure");
    TrackingError::new(code, raw.to_string())
}

/// The [`ErrorCode`] a raw failure maps to.
pub fn classify_code(raw: &FetchError) -> ErrorCode {
    match raw {
        FetchError::Timeout => ErrorCode::Timeout,
        FetchError::Network(_) => ErrorCode::Network,
        FetchError::PermissionDenied(_) => ErrorCode::Permission,
        FetchError::Code { code, .. } => classify_numeric(*code),
        FetchError::Message(msg) => classify_message(msg),
        FetchError::Io(e) => classify_io(e),
    }
}

/// Classify a Geolocation API style numeric code.
pub fn classify_numeric(code: u16) -> ErrorCode {
    match code {
        1 => ErrorCode::Permission,
        2 => ErrorCode::Network,
        3 => ErrorCode::Timeout,
        _ => ErrorCode::Unknown,
    }
}

/// Classify a free-text failure message.
///
/// Matching is case-insensitive. Permission wording wins over timeout
/// wording, which wins over network wording.
pub fn classify_message(message: &str) -> ErrorCode {
    let lower = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["permission", "denied", "unauthorized", "forbidden"]) {
        ErrorCode::Permission
    } else if has(&["timeout", "timed out"]) {
        ErrorCode::Timeout
    } else if has(&[
        "network",
        "connection",
        "offline",
        "unreachable",
        "unavailable",
        "fetch",
    ]) {
        ErrorCode::Network
    } else {
        ErrorCode::Unknown
    }
}

/// Classify an I/O error by kind.
pub fn classify_io(e: &io::Error) -> ErrorCode {
    match e.kind() {
        io::ErrorKind::TimedOut => ErrorCode::Timeout,
        io::ErrorKind::PermissionDenied => ErrorCode::Permission,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::UnexpectedEof => ErrorCode::Network,
        _ => ErrorCode::Unknown,
    }
}
