//! Framing logic for the MaazDB wire protocol.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

/// Size of a packet header: 1 byte packet code + 4 byte payload length.
pub const HEADER_LEN: usize = 5;

/// The fixed string identifying this client implementation, sent as the last
/// field of the handshake payload.
///
/// The server's auth handler checks the signature verbatim, so it is kept
/// wire-compatible with the reference driver.
pub const DRIVER_SIGNATURE: &str = "maazdb-nodejs-driver-v1";

/// MaazDB packets are framed by a 1 byte packet code, followed by a u32
/// big-endian integer delineating the byte length of the payload, followed
/// by the payload itself (UTF-8 text).
///
/// The packet code identifies the type of message; the payload is opaque
/// text in both directions.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketCode(u8);

impl PacketCode {
    pub const MESSAGE: Self = Self(0x02);
    pub const DATA: Self = Self(0x03);
    pub const HANDSHAKE: Self = Self(0x10);
    pub const AUTH_OK: Self = Self(0x11);
    pub const AUTH_ERR: Self = Self(0x12);
    pub const QUERY: Self = Self(0x20);

    /// Appends a packet with this code and the given payload text to `buf`.
    ///
    /// Fails with [`Error::PayloadTooLarge`] when the payload's UTF-8 byte
    /// length does not fit the 4 byte length field; the payload is never
    /// truncated.
    pub fn frame(self, buf: &mut BytesMut, payload: impl AsRef<str>) -> Result<()> {
        let payload = payload.as_ref().as_bytes();
        let Ok(len) = u32::try_from(payload.len()) else {
            return Err(Error::PayloadTooLarge);
        };

        buf.reserve(HEADER_LEN + payload.len());
        buf.put_u8(self.0);
        buf.put_u32(len);
        buf.put_slice(payload);
        Ok(())
    }
}

impl From<u8> for PacketCode {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<PacketCode> for u8 {
    fn from(value: PacketCode) -> Self {
        value.0
    }
}

impl PartialEq<u8> for PacketCode {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

impl PartialEq<PacketCode> for u8 {
    fn eq(&self, other: &PacketCode) -> bool {
        *self == other.0
    }
}

impl std::fmt::Display for PacketCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            PacketCode::MESSAGE => "Message",
            PacketCode::DATA => "Data",
            PacketCode::HANDSHAKE => "Handshake",
            PacketCode::AUTH_OK => "AuthOk",
            PacketCode::AUTH_ERR => "AuthErr",
            PacketCode::QUERY => "Query",
            _ => "Unknown",
        };
        write!(f, "{name}(0x{:02x})", self.0)
    }
}

impl std::fmt::Debug for PacketCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PacketCode(0x{:02x})", self.0)
    }
}

/// One framed unit of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub code: PacketCode,
    pub text: String,
}

impl Packet {
    pub fn new(code: impl Into<PacketCode>, text: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.code, self.text)
    }
}

/// Drains all complete packets from the front of `buf`.
///
/// Runs to exhaustion so that several packets arriving in one transport read
/// are all returned, in order. A trailing partial packet (or a bare header)
/// stays in the buffer untouched until more bytes arrive. Payload bytes are
/// decoded as UTF-8, lossily.
pub fn decode(buf: &mut BytesMut) -> Vec<Packet> {
    let mut packets = Vec::new();

    loop {
        if buf.len() < HEADER_LEN {
            break;
        }

        let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        if buf.len() < HEADER_LEN + len {
            break;
        }

        let header = buf.split_to(HEADER_LEN);
        let body = buf.split_to(len);
        packets.push(Packet {
            code: header[0].into(),
            text: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    packets
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};

    use super::{HEADER_LEN, Packet, PacketCode, decode};

    fn encoded(code: PacketCode, text: &str) -> BytesMut {
        let mut buf = BytesMut::new();
        code.frame(&mut buf, text).unwrap();
        buf
    }

    #[test]
    fn test_frame_query() {
        let buf = encoded(PacketCode::QUERY, "SELECT 1");

        let mut expected = BytesMut::new();
        expected.put_u8(0x20);
        expected.put_u32(8);
        expected.put(&b"SELECT 1"[..]);

        assert_eq!(&buf, &expected);
    }

    #[test]
    fn test_frame_empty_payload() {
        let buf = encoded(PacketCode::AUTH_OK, "");
        assert_eq!(&buf[..], &[0x11, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_round_trip() {
        for code in [
            PacketCode::MESSAGE,
            PacketCode::DATA,
            PacketCode::HANDSHAKE,
            PacketCode::AUTH_OK,
            PacketCode::AUTH_ERR,
            PacketCode::QUERY,
        ] {
            for text in ["", "SELECT 1;", "héllo wörld", "データベース"] {
                let mut buf = encoded(code, text);
                let packets = decode(&mut buf);

                assert_eq!(packets, vec![Packet::new(code, text)]);
                assert!(buf.is_empty());
            }
        }
    }

    #[test]
    fn test_decode_batched_packets() {
        let mut buf = encoded(PacketCode::MESSAGE, "one");
        buf.extend_from_slice(&encoded(PacketCode::DATA, "two"));
        buf.extend_from_slice(&encoded(PacketCode::MESSAGE, ""));

        let packets = decode(&mut buf);

        assert_eq!(
            packets,
            vec![
                Packet::new(PacketCode::MESSAGE, "one"),
                Packet::new(PacketCode::DATA, "two"),
                Packet::new(PacketCode::MESSAGE, ""),
            ]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_any_fragmentation() {
        let whole = encoded(PacketCode::DATA, "[[1],[2],[3]]");

        for split in 1..whole.len() {
            let mut buf = BytesMut::from(&whole[..split]);

            let packets = decode(&mut buf);
            assert!(packets.is_empty(), "split at {split} produced a packet");
            assert_eq!(buf.len(), split, "split at {split} consumed bytes");

            buf.extend_from_slice(&whole[split..]);
            let packets = decode(&mut buf);
            assert_eq!(packets, vec![Packet::new(PacketCode::DATA, "[[1],[2],[3]]")]);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_decode_partial_header_untouched() {
        let mut buf = BytesMut::from(&[0x02, 0, 0][..]);
        assert!(decode(&mut buf).is_empty());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_unknown_code_passes_through() {
        let mut buf = encoded(PacketCode::from(0x99), "?");
        let packets = decode(&mut buf);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].code, 0x99u8);
    }

    #[test]
    fn test_header_len() {
        let buf = encoded(PacketCode::MESSAGE, "x");
        assert_eq!(buf.len(), HEADER_LEN + 1);
    }

    #[test]
    fn test_code_display_names_unknown_value() {
        assert_eq!(PacketCode::from(0x99).to_string(), "Unknown(0x99)");
        assert_eq!(PacketCode::QUERY.to_string(), "Query(0x20)");
    }
}
