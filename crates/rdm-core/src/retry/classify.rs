//! Classify transfer errors and HTTP statuses into retry policy error kinds.

use crate::error::TransferError;
use crate::retry::policy::ErrorKind;

/// Classify an HTTP status code that is neither 200 nor 206.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        408 | 429 => ErrorKind::Transient,
        500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Protocol,
    }
}

/// Classify a transfer error into an ErrorKind.
pub fn classify(e: &TransferError) -> ErrorKind {
    match e {
        TransferError::Transport(ce) => {
            if ce.is_write_error() {
                ErrorKind::Resource
            } else {
                ErrorKind::Transient
            }
        }
        TransferError::Http(code) => classify_http_status(*code),
        TransferError::Incomplete { .. } => ErrorKind::Transient,
        TransferError::RangeNotSatisfiable | TransferError::InvalidUrl(_) => ErrorKind::Protocol,
        TransferError::Storage(_) | TransferError::WorkerPanicked => ErrorKind::Resource,
        TransferError::Cancelled => ErrorKind::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_and_5xx_transient() {
        assert_eq!(classify_http_status(429), ErrorKind::Transient);
        assert_eq!(classify_http_status(503), ErrorKind::Transient);
        assert_eq!(classify_http_status(500), ErrorKind::Transient);
    }

    #[test]
    fn http_4xx_protocol() {
        assert_eq!(classify_http_status(404), ErrorKind::Protocol);
        assert_eq!(classify_http_status(403), ErrorKind::Protocol);
    }

    #[test]
    fn storage_is_resource() {
        let e = TransferError::Storage(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(classify(&e), ErrorKind::Resource);
        assert_eq!(classify(&TransferError::WorkerPanicked), ErrorKind::Resource);
    }

    #[test]
    fn truncated_body_is_transient() {
        let e = TransferError::Incomplete {
            expected: 10,
            received: 4,
        };
        assert_eq!(classify(&e), ErrorKind::Transient);
        assert_eq!(classify(&TransferError::Cancelled), ErrorKind::Cancelled);
        assert_eq!(classify(&TransferError::RangeNotSatisfiable), ErrorKind::Protocol);
    }
}
