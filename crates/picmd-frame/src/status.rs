//! Reply status codes.
//!
//! `0x00` means success. `0x01` and `0x02` are reserved by the protocol.
//! The remaining values `0x03..=0xff` are free for handler-declared domain
//! errors.

/// The command completed and `data` carries its result.
pub const NO_ERROR: u8 = 0x00;

/// The declared parity did not match; the handler was not invoked.
pub const INVALID_PARITY_ERROR: u8 = 0x01;

/// The handler failed without a well-formed domain error.
pub const COMMAND_FAIL_ERROR: u8 = 0x02;

/// First status value not reserved by the protocol.
pub const DOMAIN_STATUS_START: u8 = 0x03;

/// Returns a human-readable name for a status code.
pub fn status_name(status: u8) -> &'static str {
    match status {
        NO_ERROR => "NO_ERROR",
        INVALID_PARITY_ERROR => "INVALID_PARITY_ERROR",
        COMMAND_FAIL_ERROR => "COMMAND_FAIL_ERROR",
        _ => "DOMAIN_ERROR",
    }
}

/// Returns true if the status code is reserved by the protocol.
pub fn is_reserved(status: u8) -> bool {
    status < DOMAIN_STATUS_START
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(status_name(NO_ERROR), "NO_ERROR");
        assert_eq!(status_name(INVALID_PARITY_ERROR), "INVALID_PARITY_ERROR");
        assert_eq!(status_name(COMMAND_FAIL_ERROR), "COMMAND_FAIL_ERROR");
        assert_eq!(status_name(0xff), "DOMAIN_ERROR");
    }

    #[test]
    fn reserved_range() {
        assert!(is_reserved(NO_ERROR));
        assert!(is_reserved(COMMAND_FAIL_ERROR));
        assert!(!is_reserved(DOMAIN_STATUS_START));
        assert!(!is_reserved(0xff));
    }
}
