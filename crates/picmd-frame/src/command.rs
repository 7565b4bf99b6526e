use bytes::Bytes;

use crate::codec::checked_size;
use crate::error::Result;
use crate::status::NO_ERROR;

/// XOR-fold of the command id, both bytes of the little-endian size, and
/// every payload byte.
///
/// For sizes below 256 this is `id ^ size ^ payload[0] ^ ... ^ payload[n-1]`.
pub fn parity(id: u8, size: u16, payload: &[u8]) -> u8 {
    let [lo, hi] = size.to_le_bytes();
    payload.iter().fold(id ^ lo ^ hi, |acc, byte| acc ^ byte)
}

/// A decoded command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Handler selector.
    pub id: u8,
    /// Payload length as declared in the frame header.
    pub size: u16,
    /// The payload bytes.
    pub payload: Bytes,
    /// Parity byte as declared by the sender.
    pub parity: u8,
}

/// Dispatcher input. Identical to [`Command`]; lets callers build requests
/// without going through the wire codec.
pub type CommandRequest = Command;

impl Command {
    /// Create a command from its raw fields.
    ///
    /// No validation is performed here; the dispatcher rejects a command
    /// whose `size` disagrees with its payload as a parity failure.
    pub fn new(id: u8, size: u16, payload: impl Into<Bytes>, parity: u8) -> Self {
        Self {
            id,
            size,
            payload: payload.into(),
            parity,
        }
    }

    /// Create a command with the size and parity derived from `payload`.
    ///
    /// Payloads longer than 65535 bytes don't fit the size field and fail
    /// with [`FrameError::PayloadTooLarge`](crate::FrameError::PayloadTooLarge).
    pub fn with_parity(id: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload: Bytes = payload.into();
        let size = checked_size(&payload)?;
        let parity = parity(id, size, &payload);
        Ok(Self {
            id,
            size,
            payload,
            parity,
        })
    }

    /// Whether the declared size matches the payload length.
    pub fn size_ok(&self) -> bool {
        usize::from(self.size) == self.payload.len()
    }

    /// The parity this command should carry.
    pub fn expected_parity(&self) -> u8 {
        parity(self.id, self.size, &self.payload)
    }

    /// Whether the declared parity matches the contents.
    pub fn parity_ok(&self) -> bool {
        self.parity == self.expected_parity()
    }
}

/// The outcome of one command, ready to be encoded as a reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// `0` on success, otherwise a reserved or domain status code.
    pub status: u8,
    /// Encoded result on success, error description otherwise.
    pub data: Bytes,
}

impl Response {
    /// A successful response carrying `data`.
    pub fn ok(data: impl Into<Bytes>) -> Self {
        Self {
            status: NO_ERROR,
            data: data.into(),
        }
    }

    /// A failed response with no description.
    pub fn error(status: u8) -> Self {
        Self {
            status,
            data: Bytes::new(),
        }
    }

    /// A failed response with a description.
    pub fn error_with(status: u8, description: impl Into<Bytes>) -> Self {
        Self {
            status,
            data: description.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == NO_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;
    use crate::status::COMMAND_FAIL_ERROR;

    #[test]
    fn parity_folds_id_size_and_payload() {
        assert_eq!(parity(0x01, 1, &[0x01]), 0x01);
        assert_eq!(parity(0x01, 1, &[0x02]), 0x02);
        assert_eq!(parity(0x04, 0, &[]), 0x04);
        assert_eq!(parity(0x01, 8, &[0x03, 0, 0, 0, 0, 0, 0, 0]), 0x0a);
    }

    #[test]
    fn parity_includes_high_size_byte() {
        let payload = vec![0u8; 0x0102];
        assert_eq!(parity(0x00, 0x0102, &payload), 0x02 ^ 0x01);
    }

    #[test]
    fn with_parity_builds_consistent_command() {
        let cmd = Command::with_parity(0x10, &b"abc"[..]).unwrap();
        assert_eq!(cmd.size, 3);
        assert!(cmd.parity_ok());
        assert_eq!(cmd.parity, 0x10 ^ 3 ^ b'a' ^ b'b' ^ b'c');
    }

    #[test]
    fn with_parity_rejects_oversized_payload() {
        let err = Command::with_parity(0x01, vec![0u8; 70_000]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 70_000,
                max: 65_535
            }
        ));

        let cmd = Command::with_parity(0x01, vec![0u8; 65_535]).unwrap();
        assert_eq!(cmd.size, 65_535);
        assert!(cmd.size_ok());
    }

    #[test]
    fn size_mismatch_detected() {
        let cmd = Command::new(0x01, 2, &b"\x01"[..], 0x02);
        assert!(!cmd.size_ok());
    }

    #[test]
    fn declared_parity_mismatch_detected() {
        let cmd = Command::new(0x01, 0, Bytes::new(), 0x02);
        assert!(!cmd.parity_ok());
        assert_eq!(cmd.expected_parity(), 0x01);
    }

    #[test]
    fn response_constructors() {
        assert!(Response::ok(&b"x"[..]).is_success());
        let failed = Response::error(COMMAND_FAIL_ERROR);
        assert!(!failed.is_success());
        assert!(failed.data.is_empty());
        let domain = Response::error_with(0xff, "domain error");
        assert_eq!(domain.data.as_ref(), b"domain error");
    }
}
