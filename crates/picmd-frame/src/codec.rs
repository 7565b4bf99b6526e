use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::{parity, Command, Response};
use crate::error::{FrameError, Result};
use crate::status::NO_ERROR;

/// Request frame prefix.
pub const COMMAND_PREFIX: &[u8] = b"AT*PIC=";

/// Reply frame prefix.
pub const REPLY_PREFIX: &[u8] = b"*PIC:";

/// Frame terminator.
pub const TERMINATOR: &[u8] = b"\r\n";

/// Acknowledgement line following a successful reply.
pub const ACK_OK: &[u8] = b"OK\r\n";

/// Start of the acknowledgement line following a failed reply.
/// The decimal status code and a terminator follow.
///
/// This line is a picmd extension. Hosts that expect a plain AT
/// acknowledgement see a final result code they do not recognise, so peers
/// must both speak picmd to interpret a failed reply.
pub const ACK_ERROR_PREFIX: &[u8] = b"ERROR:";

/// Largest payload the 2-byte length field can describe.
pub const MAX_DATA_LENGTH: usize = 0xffff;

/// Default maximum accepted payload size.
pub const DEFAULT_MAX_PAYLOAD: usize = MAX_DATA_LENGTH;

/// How the id, length, payload and parity fields are laid out on the wire.
///
/// Prefixes, terminators and acknowledgement lines are literal in both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldEncoding {
    /// One wire byte per field byte.
    #[default]
    Binary,
    /// Two ASCII hex digits per field byte.
    HexAscii,
}

impl FieldEncoding {
    /// Wire width of a field holding `bytes` bytes.
    pub const fn width(self, bytes: usize) -> usize {
        match self {
            FieldEncoding::Binary => bytes,
            FieldEncoding::HexAscii => bytes * 2,
        }
    }

    /// Size of a request header: prefix, id and length.
    pub const fn header_len(self) -> usize {
        COMMAND_PREFIX.len() + self.width(1) + self.width(2)
    }

    /// Total size of a request frame carrying `size` payload bytes.
    pub const fn frame_len(self, size: u16) -> usize {
        self.header_len() + self.width(size as usize) + self.width(1) + TERMINATOR.len()
    }

    /// Size of a reply header: prefix, id and length.
    pub const fn reply_header_len(self) -> usize {
        REPLY_PREFIX.len() + self.width(1) + self.width(2)
    }

    fn decode_into(self, field: &[u8], out: &mut [u8], name: &str) -> Result<()> {
        match self {
            FieldEncoding::Binary => {
                if field.len() != out.len() {
                    return Err(FrameError::Format(format!(
                        "{name} field is {} bytes, expected {}",
                        field.len(),
                        out.len()
                    )));
                }
                out.copy_from_slice(field);
                Ok(())
            }
            FieldEncoding::HexAscii => hex::decode_to_slice(field, out)
                .map_err(|err| FrameError::Format(format!("{name} field: {err}"))),
        }
    }

    fn decode_bytes(self, field: &[u8], name: &str) -> Result<Bytes> {
        match self {
            FieldEncoding::Binary => Ok(Bytes::copy_from_slice(field)),
            FieldEncoding::HexAscii => hex::decode(field)
                .map(Bytes::from)
                .map_err(|err| FrameError::Format(format!("{name} field: {err}"))),
        }
    }

    fn decode_u8(self, field: &[u8], name: &str) -> Result<u8> {
        let mut out = [0u8; 1];
        self.decode_into(field, &mut out, name)?;
        Ok(out[0])
    }

    fn decode_u16_le(self, field: &[u8], name: &str) -> Result<u16> {
        let mut out = [0u8; 2];
        self.decode_into(field, &mut out, name)?;
        Ok(u16::from_le_bytes(out))
    }

    fn put(self, bytes: &[u8], dst: &mut BytesMut) {
        match self {
            FieldEncoding::Binary => dst.put_slice(bytes),
            FieldEncoding::HexAscii => dst.put_slice(hex::encode(bytes).as_bytes()),
        }
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Field layout. Default: [`FieldEncoding::Binary`].
    pub encoding: FieldEncoding,
    /// Maximum accepted payload size in bytes. Default: 65535.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            encoding: FieldEncoding::Binary,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// A decoded reply, as seen by the host side of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    /// Echoed command id.
    pub id: u8,
    /// Status taken from the acknowledgement line.
    pub status: u8,
    /// Reply payload.
    pub data: Bytes,
    /// Checksum carried by the reply (already verified).
    pub checksum: u8,
}

/// Parse the payload length out of a request header.
///
/// `header` starts at the prefix and holds at least
/// [`FieldEncoding::header_len`] bytes.
pub fn decode_header(header: &[u8], config: &FrameConfig) -> Result<u16> {
    let encoding = config.encoding;
    let header_len = encoding.header_len();
    if header.len() < header_len {
        return Err(FrameError::Format(format!(
            "truncated header ({} bytes, need {header_len})",
            header.len()
        )));
    }
    if !header.starts_with(COMMAND_PREFIX) {
        return Err(FrameError::Format("missing frame prefix".to_string()));
    }

    let length_start = COMMAND_PREFIX.len() + encoding.width(1);
    let size = encoding.decode_u16_le(&header[length_start..header_len], "length")?;

    if usize::from(size) > config.max_payload_size {
        return Err(FrameError::Format(format!(
            "declared length {size} exceeds maximum {}",
            config.max_payload_size
        )));
    }

    Ok(size)
}

/// Decode one complete request frame whose header declared `size`.
///
/// Fields are located by offset from the header and declared length; the
/// terminator is checked where the length puts it, never searched for.
pub fn decode_frame(frame: &[u8], size: u16, encoding: FieldEncoding) -> Result<Command> {
    let frame_len = encoding.frame_len(size);
    if frame.len() != frame_len {
        return Err(FrameError::Length { frame_len });
    }

    let data_start = encoding.header_len();
    let data_end = data_start + encoding.width(usize::from(size));
    let parity_end = data_end + encoding.width(1);

    if &frame[parity_end..] != TERMINATOR {
        return Err(FrameError::Length { frame_len });
    }

    let id_start = COMMAND_PREFIX.len();
    let id = encoding.decode_u8(&frame[id_start..id_start + encoding.width(1)], "id")?;
    let payload = encoding.decode_bytes(&frame[data_start..data_end], "payload")?;
    let declared_parity = encoding.decode_u8(&frame[data_end..parity_end], "parity")?;

    Ok(Command {
        id,
        size,
        payload,
        parity: declared_parity,
    })
}

/// Encode a reply to command `id`, followed by its acknowledgement line.
///
/// Wire format (binary field encoding):
/// ```text
/// ┌──────────┬──────┬──────────┬──────────┬──────────┬──────┬───────────────┐
/// │ "*PIC:"  │ id   │ length   │ data     │ checksum │ \r\n │ OK\r\n or     │
/// │          │ (1B) │ (2B LE)  │ (length) │ (1B)     │      │ ERROR:<n>\r\n │
/// └──────────┴──────┴──────────┴──────────┴──────────┴──────┴───────────────┘
/// ```
///
/// The `ERROR:<n>` line is picmd's own (see [`ACK_ERROR_PREFIX`]); a success
/// is acknowledged with the conventional `OK`.
pub fn encode_response(
    id: u8,
    response: &Response,
    encoding: FieldEncoding,
    dst: &mut BytesMut,
) -> Result<()> {
    let size = checked_size(&response.data)?;
    let checksum = parity(id, size, &response.data);

    dst.reserve(REPLY_PREFIX.len() + encoding.width(response.data.len() + 4) + 16);
    dst.put_slice(REPLY_PREFIX);
    encoding.put(&[id], dst);
    encoding.put(&size.to_le_bytes(), dst);
    encoding.put(&response.data, dst);
    encoding.put(&[checksum], dst);
    dst.put_slice(TERMINATOR);

    if response.status == NO_ERROR {
        dst.put_slice(ACK_OK);
    } else {
        dst.put_slice(ACK_ERROR_PREFIX);
        dst.put_slice(response.status.to_string().as_bytes());
        dst.put_slice(TERMINATOR);
    }
    Ok(())
}

/// Encode a request frame with its parity computed from the contents.
pub fn encode_command(
    id: u8,
    payload: &[u8],
    encoding: FieldEncoding,
    dst: &mut BytesMut,
) -> Result<()> {
    let size = checked_size(payload)?;

    dst.reserve(encoding.frame_len(size));
    dst.put_slice(COMMAND_PREFIX);
    encoding.put(&[id], dst);
    encoding.put(&size.to_le_bytes(), dst);
    encoding.put(payload, dst);
    encoding.put(&[parity(id, size, payload)], dst);
    dst.put_slice(TERMINATOR);
    Ok(())
}

/// Decode a reply frame and its acknowledgement line from a buffer.
///
/// Bytes before the reply prefix are discarded. Returns `Ok(None)` if the
/// buffer doesn't hold a complete reply yet. Once a complete reply is
/// present its bytes are consumed before validation.
pub fn decode_reply(src: &mut BytesMut, encoding: FieldEncoding) -> Result<Option<ReplyFrame>> {
    let Some(start) = find(src, REPLY_PREFIX) else {
        return Ok(None);
    };
    src.advance(start);

    let header_len = encoding.reply_header_len();
    if src.len() < header_len {
        return Ok(None);
    }

    let length_start = REPLY_PREFIX.len() + encoding.width(1);
    let size = match encoding.decode_u16_le(&src[length_start..header_len], "length") {
        Ok(size) => size,
        Err(err) => {
            src.advance(header_len);
            return Err(err);
        }
    };

    let data_end = header_len + encoding.width(usize::from(size));
    let checksum_end = data_end + encoding.width(1);
    let frame_end = checksum_end + TERMINATOR.len();
    if src.len() < frame_end {
        return Ok(None);
    }
    let Some(ack_len) = find(&src[frame_end..], TERMINATOR).map(|pos| pos + TERMINATOR.len())
    else {
        return Ok(None);
    };

    let reply = src.split_to(frame_end + ack_len).freeze();

    if &reply[checksum_end..frame_end] != TERMINATOR {
        return Err(FrameError::Length {
            frame_len: frame_end,
        });
    }

    let id_start = REPLY_PREFIX.len();
    let id = encoding.decode_u8(&reply[id_start..id_start + encoding.width(1)], "id")?;
    let data = encoding.decode_bytes(&reply[header_len..data_end], "data")?;
    let checksum = encoding.decode_u8(&reply[data_end..checksum_end], "checksum")?;

    let expected = parity(id, size, &data);
    if checksum != expected {
        return Err(FrameError::Format(format!(
            "reply checksum {checksum:#04x} does not match {expected:#04x}"
        )));
    }

    let status = parse_ack(&reply[frame_end..])?;

    Ok(Some(ReplyFrame {
        id,
        status,
        data,
        checksum,
    }))
}

fn parse_ack(line: &[u8]) -> Result<u8> {
    if line == ACK_OK {
        return Ok(NO_ERROR);
    }

    let body = line
        .strip_prefix(ACK_ERROR_PREFIX)
        .and_then(|rest| rest.strip_suffix(TERMINATOR))
        .ok_or_else(|| {
            FrameError::Format(format!(
                "unexpected acknowledgement line {:?}",
                String::from_utf8_lossy(line)
            ))
        })?;

    std::str::from_utf8(body)
        .ok()
        .and_then(|text| text.parse::<u8>().ok())
        .filter(|status| *status != NO_ERROR)
        .ok_or_else(|| {
            FrameError::Format(format!(
                "invalid status in acknowledgement line {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

pub(crate) fn checked_size(data: &[u8]) -> Result<u16> {
    u16::try_from(data.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: data.len(),
        max: MAX_DATA_LENGTH,
    })
}

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{COMMAND_FAIL_ERROR, INVALID_PARITY_ERROR};

    #[test]
    fn decode_reference_request() {
        let wire = b"AT*PIC=\x01\x01\x00\x02\x02\r\n";
        let config = FrameConfig::default();

        let size = decode_header(wire, &config).unwrap();
        assert_eq!(size, 1);

        let cmd = decode_frame(wire, size, FieldEncoding::Binary).unwrap();
        assert_eq!(cmd, Command::new(0x01, 1, &b"\x02"[..], 0x02));
        assert!(cmd.parity_ok());
    }

    #[test]
    fn encode_reference_reply() {
        let mut buf = BytesMut::new();
        let response = Response::ok(&b"\x01\x00\x00\x00\x00\x00\x00\x00"[..]);
        encode_response(0x01, &response, FieldEncoding::Binary, &mut buf).unwrap();

        assert_eq!(
            buf.as_ref(),
            b"*PIC:\x01\x08\x00\x01\x00\x00\x00\x00\x00\x00\x00\x08\r\nOK\r\n"
        );
    }

    #[test]
    fn encode_error_reply_carries_status_line() {
        let mut buf = BytesMut::new();
        let response = Response::error(INVALID_PARITY_ERROR);
        encode_response(0x07, &response, FieldEncoding::Binary, &mut buf).unwrap();

        assert_eq!(buf.as_ref(), b"*PIC:\x07\x00\x00\x07\r\nERROR:1\r\n");
    }

    #[test]
    fn failed_reply_differs_only_in_ack_line() {
        let data = &b"late"[..];
        let mut ok = BytesMut::new();
        encode_response(0x05, &Response::ok(data), FieldEncoding::Binary, &mut ok).unwrap();
        let mut failed = BytesMut::new();
        encode_response(
            0x05,
            &Response::error_with(200, data),
            FieldEncoding::Binary,
            &mut failed,
        )
        .unwrap();

        let frame_len = ok.len() - ACK_OK.len();
        assert_eq!(&ok[..frame_len], &failed[..frame_len]);
        assert_eq!(&ok[frame_len..], ACK_OK);
        assert_eq!(&failed[frame_len..], b"ERROR:200\r\n");
    }

    #[test]
    fn encode_command_matches_reference() {
        let mut buf = BytesMut::new();
        encode_command(0x01, b"\x02", FieldEncoding::Binary, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"AT*PIC=\x01\x01\x00\x02\x02\r\n");
    }

    #[test]
    fn hex_encoding_layout() {
        let mut buf = BytesMut::new();
        encode_command(0x01, b"\xab", FieldEncoding::HexAscii, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"AT*PIC=010100abab\r\n");

        let config = FrameConfig {
            encoding: FieldEncoding::HexAscii,
            ..FrameConfig::default()
        };
        let size = decode_header(&buf, &config).unwrap();
        let cmd = decode_frame(&buf, size, FieldEncoding::HexAscii).unwrap();
        assert_eq!(cmd.id, 0x01);
        assert_eq!(cmd.payload.as_ref(), b"\xab");
        assert!(cmd.parity_ok());
    }

    #[test]
    fn encode_decode_preserves_fields() {
        for encoding in [FieldEncoding::Binary, FieldEncoding::HexAscii] {
            for payload in [Vec::new(), b"\r\n".to_vec(), vec![0x5a; 300]] {
                let mut buf = BytesMut::new();
                encode_command(0x42, &payload, encoding, &mut buf).unwrap();
                assert_eq!(buf.len(), encoding.frame_len(payload.len() as u16));

                let config = FrameConfig {
                    encoding,
                    ..FrameConfig::default()
                };
                let size = decode_header(&buf, &config).unwrap();
                let cmd = decode_frame(&buf, size, encoding).unwrap();
                assert_eq!(cmd.id, 0x42);
                assert_eq!(usize::from(cmd.size), payload.len());
                assert_eq!(cmd.payload.as_ref(), payload.as_slice());
                assert!(cmd.parity_ok());
            }
        }
    }

    #[test]
    fn non_hex_length_is_format_error() {
        let config = FrameConfig {
            encoding: FieldEncoding::HexAscii,
            ..FrameConfig::default()
        };
        let result = decode_header(b"AT*PIC=01zz00", &config);
        assert!(matches!(result, Err(FrameError::Format(_))));
    }

    #[test]
    fn oversized_declared_length_is_format_error() {
        let config = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let result = decode_header(b"AT*PIC=\x01\x10\x00", &config);
        assert!(matches!(result, Err(FrameError::Format(_))));
    }

    #[test]
    fn terminator_mismatch_is_length_error() {
        let wire = b"AT*PIC=\x01\x01\x00\x02\x02XX";
        let result = decode_frame(wire, 1, FieldEncoding::Binary);
        assert!(matches!(result, Err(FrameError::Length { frame_len: 14 })));
    }

    #[test]
    fn malformed_hex_payload_is_format_error() {
        let wire = b"AT*PIC=010100zz01\r\n";
        let result = decode_frame(wire, 1, FieldEncoding::HexAscii);
        assert!(matches!(result, Err(FrameError::Format(_))));
    }

    #[test]
    fn oversized_response_rejected() {
        let mut buf = BytesMut::new();
        let response = Response::ok(vec![0u8; MAX_DATA_LENGTH + 1]);
        let result = encode_response(0x01, &response, FieldEncoding::Binary, &mut buf);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_reply_roundtrip_with_noise() {
        let mut buf = BytesMut::from(&b"garbage"[..]);
        encode_response(
            0x03,
            &Response::error_with(0xff, "domain error"),
            FieldEncoding::Binary,
            &mut buf,
        )
        .unwrap();

        let reply = decode_reply(&mut buf, FieldEncoding::Binary)
            .unwrap()
            .unwrap();
        assert_eq!(reply.id, 0x03);
        assert_eq!(reply.status, 0xff);
        assert_eq!(reply.data.as_ref(), b"domain error");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_reply_waits_for_ack_line() {
        let mut full = BytesMut::new();
        encode_response(
            0x01,
            &Response::error(COMMAND_FAIL_ERROR),
            FieldEncoding::HexAscii,
            &mut full,
        )
        .unwrap();

        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert!(decode_reply(&mut partial, FieldEncoding::HexAscii)
            .unwrap()
            .is_none());

        let reply = decode_reply(&mut full, FieldEncoding::HexAscii)
            .unwrap()
            .unwrap();
        assert_eq!(reply.status, COMMAND_FAIL_ERROR);
        assert!(reply.data.is_empty());
    }

    #[test]
    fn decode_reply_rejects_bad_checksum() {
        let mut buf = BytesMut::from(&b"*PIC:\x01\x00\x00\x7f\r\nOK\r\n"[..]);
        let result = decode_reply(&mut buf, FieldEncoding::Binary);
        assert!(matches!(result, Err(FrameError::Format(_))));
        assert!(buf.is_empty());
    }
}
