//! Message bundles
//!
//! A bundle is the unit sent over the transport:
//!
//! ```text
//! u16 version | u16 headerCount | header* | u16 messageCount | message*
//!
//! header  = AMF0-string name | u8 mustUnderstand | u32 length | value
//! message = AMF0-string targetUri | AMF0-string responseUri | u32 length | value
//! ```
//!
//! Lengths are advisory and ignored on decode; values are always decoded
//! structurally. Each message body is its own reference-table scope.
//!
//! Decoding accepts requests and responses. Encoding only builds outgoing
//! call requests: header values are not written and every body is wrapped
//! in a one-element AMF0 array holding a single AMF3 value.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::amf::amf0::{
    self, ensure, Amf0Decoder, MARKER_AVMPLUS, MARKER_OBJECT_END, MARKER_STRICT_ARRAY,
};
use crate::amf::{Amf3Encoder, DecodeWarning, TypeRegistry, Value};
use crate::error::{RemotingError, Result};

use super::constants::*;

/// Outcome named by a response's target URI suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// `/onResult`
    Result,
    /// `/onStatus`
    Status,
    /// `/onDebugEvents`
    DebugEvents,
}

impl ResponseStatus {
    const ALL: [ResponseStatus; 3] = [
        ResponseStatus::Result,
        ResponseStatus::Status,
        ResponseStatus::DebugEvents,
    ];

    /// Target URI suffix for this status
    pub fn suffix(self) -> &'static str {
        match self {
            ResponseStatus::Result => SUFFIX_RESULT,
            ResponseStatus::Status => SUFFIX_STATUS,
            ResponseStatus::DebugEvents => SUFFIX_DEBUG_EVENTS,
        }
    }

    /// Match a target URI against the status suffixes
    ///
    /// Returns the status and the URI with the suffix removed, or `None`
    /// for a request.
    pub fn classify(target_uri: &str) -> Option<(ResponseStatus, &str)> {
        Self::ALL.iter().find_map(|status| {
            target_uri
                .strip_suffix(status.suffix())
                .map(|prefix| (*status, prefix))
        })
    }
}

/// Envelope header
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub name: String,
    pub must_understand: bool,
    pub value: Value,
}

/// One message in a bundle
#[derive(Debug, Clone, PartialEq)]
pub struct AmfMessage {
    pub target_uri: String,
    pub response_uri: String,
    pub body: Value,
    /// Set on decoded responses; `None` for requests
    pub status: Option<ResponseStatus>,
}

impl AmfMessage {
    /// Request message
    pub fn new(target_uri: impl Into<String>, response_uri: impl Into<String>, body: Value) -> Self {
        Self {
            target_uri: target_uri.into(),
            response_uri: response_uri.into(),
            body,
            status: None,
        }
    }

    /// Whether this message was classified as a response
    pub fn is_response(&self) -> bool {
        self.status.is_some()
    }
}

/// Version, headers and messages of one request or response
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBundle {
    pub version: u16,
    pub headers: Vec<Header>,
    pub messages: Vec<AmfMessage>,
}

impl MessageBundle {
    /// Bundle with the default envelope version and no headers
    pub fn new(messages: Vec<AmfMessage>) -> Self {
        Self {
            version: DEFAULT_AMF_VERSION,
            headers: Vec::new(),
            messages,
        }
    }
}

/// Bundle decoder
///
/// Keeps the warnings of the last decode for inspection.
pub struct BundleDecoder {
    decoder: Amf0Decoder,
    warnings: Vec<DecodeWarning>,
}

impl BundleDecoder {
    /// Create a decoder that materializes typed objects against `registry`
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            decoder: Amf0Decoder::with_registry(registry),
            warnings: Vec::new(),
        }
    }

    /// Warnings recorded by the last `decode`
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// Decode a complete bundle, request or response
    pub fn decode(&mut self, data: &[u8]) -> Result<MessageBundle> {
        let mut buf = Bytes::copy_from_slice(data);
        self.decoder.reset();
        self.decoder.take_warnings();
        self.warnings.clear();

        ensure(&buf, 2)?;
        let version = buf.get_u16();
        if version > MAX_AMF_VERSION {
            return Err(RemotingError::UnsupportedVersion(version).into());
        }

        ensure(&buf, 2)?;
        let header_count = buf.get_u16() as usize;
        let mut headers = Vec::with_capacity(header_count);
        for _ in 0..header_count {
            let name = amf0::read_utf8(&mut buf)?;
            ensure(&buf, 5)?;
            let must_understand = buf.get_u8() != 0;
            let _length = buf.get_u32();
            let value = self.decoder.decode(&mut buf)?;
            headers.push(Header {
                name,
                must_understand,
                value,
            });
        }

        ensure(&buf, 2)?;
        let message_count = buf.get_u16() as usize;
        let mut messages = Vec::with_capacity(message_count);
        for _ in 0..message_count {
            self.decoder.reset();
            messages.push(self.decode_message(&mut buf)?);
        }

        self.warnings.extend(self.decoder.take_warnings());
        if buf.has_remaining() {
            tracing::debug!(trailing = buf.remaining(), "Ignoring bytes after last message");
        }
        tracing::debug!(
            version = version,
            headers = headers.len(),
            messages = messages.len(),
            "Decoded message bundle"
        );

        Ok(MessageBundle {
            version,
            headers,
            messages,
        })
    }

    fn decode_message(&mut self, buf: &mut Bytes) -> Result<AmfMessage> {
        let target_uri = amf0::read_utf8(buf)?;
        let response_uri = amf0::read_utf8(buf)?;
        ensure(buf, 4)?;
        let _length = buf.get_u32();

        let classified = ResponseStatus::classify(&target_uri)
            .map(|(status, prefix)| (status, prefix.to_string()));

        let Some((status, target_uri)) = classified else {
            let body = self.decode_arguments(buf)?;
            return Ok(AmfMessage {
                target_uri,
                response_uri,
                body,
                status: None,
            });
        };

        let body = self.decoder.decode(buf)?;
        Ok(AmfMessage {
            target_uri,
            response_uri,
            body,
            status: Some(status),
        })
    }

    /// Request arguments: an array marker and a raw 32-bit count
    ///
    /// The array is not registered in the reference table.
    fn decode_arguments(&mut self, buf: &mut Bytes) -> Result<Value> {
        ensure(buf, 1)?;
        let marker = buf.get_u8();
        if marker != MARKER_OBJECT_END && marker != MARKER_STRICT_ARRAY {
            return Err(RemotingError::ExpectedArgumentArray(marker).into());
        }

        ensure(buf, 4)?;
        let count = buf.get_u32() as usize;
        let mut args = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            args.push(self.decoder.decode(buf)?);
        }
        Ok(Value::Array(args))
    }
}

/// Decode a request or response bundle
pub fn decode_any_bundle(data: &[u8], registry: Arc<TypeRegistry>) -> Result<MessageBundle> {
    BundleDecoder::new(registry).decode(data)
}

/// Encode a bundle of outgoing call requests
///
/// Only header names and flags are written. Each body is written as
/// `0x0A, count 1, 0x11` followed by its AMF3 encoding, with fresh reference
/// tables per message.
pub fn encode_request_bundle(bundle: &MessageBundle) -> Result<Bytes> {
    let header_count = checked_count("headers", bundle.headers.len())?;
    let message_count = checked_count("messages", bundle.messages.len())?;

    let mut buf = BytesMut::with_capacity(256);
    buf.put_u16(bundle.version);

    buf.put_u16(header_count);
    for header in &bundle.headers {
        write_envelope_str(&mut buf, "header name", &header.name)?;
        buf.put_u8(header.must_understand as u8);
    }

    buf.put_u16(message_count);
    let mut encoder = Amf3Encoder::new();
    for message in &bundle.messages {
        write_envelope_str(&mut buf, "target URI", &message.target_uri)?;
        write_envelope_str(&mut buf, "response URI", &message.response_uri)?;
        buf.put_u32(0);

        buf.put_u8(MARKER_STRICT_ARRAY);
        buf.put_u32(1);
        buf.put_u8(MARKER_AVMPLUS);
        encoder.reset();
        encoder.encode(&message.body)?;
        buf.put_slice(&encoder.finish());
    }

    tracing::debug!(
        version = bundle.version,
        messages = bundle.messages.len(),
        bytes = buf.len(),
        "Encoded request bundle"
    );
    Ok(buf.freeze())
}

/// Envelope strings carry a u16 length and are never truncated
fn write_envelope_str(buf: &mut BytesMut, what: &'static str, s: &str) -> Result<()> {
    if s.len() > u16::MAX as usize {
        return Err(RemotingError::StringTooLong { what, len: s.len() }.into());
    }
    amf0::write_utf8(buf, s)?;
    Ok(())
}

fn checked_count(what: &'static str, count: usize) -> Result<u16> {
    u16::try_from(count).map_err(|_| RemotingError::TooMany { what, count }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::amf3;
    use crate::error::{AmfError, Error};

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry::new())
    }

    fn response_bytes(target: &str, body: &Value) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u16(3);
        buf.put_u16(0);
        buf.put_u16(1);
        amf0::write_utf8(&mut buf, target).unwrap();
        amf0::write_utf8(&mut buf, "null").unwrap();
        buf.put_u32(0);
        buf.put_u8(MARKER_AVMPLUS);
        buf.put_slice(&amf3::encode(body).unwrap());
        buf.to_vec()
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            ResponseStatus::classify("/1/onResult"),
            Some((ResponseStatus::Result, "/1"))
        );
        assert_eq!(
            ResponseStatus::classify("client/onStatus"),
            Some((ResponseStatus::Status, "client"))
        );
        assert_eq!(
            ResponseStatus::classify("x/onDebugEvents"),
            Some((ResponseStatus::DebugEvents, "x"))
        );
        assert_eq!(ResponseStatus::classify("null"), None);
        assert_eq!(ResponseStatus::classify("/onResultX"), None);
    }

    #[test]
    fn test_request_roundtrip() {
        let body = Value::from(vec![Value::from("a"), Value::from(2)]);
        let bundle = MessageBundle::new(vec![
            AmfMessage::new("null", "/1", body.clone()),
            AmfMessage::new("null", "/2", Value::from("second")),
        ]);

        let encoded = encode_request_bundle(&bundle).unwrap();
        let decoded = decode_any_bundle(&encoded, registry()).unwrap();

        assert_eq!(decoded.version, 3);
        assert!(decoded.headers.is_empty());
        assert_eq!(decoded.messages.len(), 2);
        assert_eq!(decoded.messages[0].body, Value::Array(vec![body]));
        assert_eq!(decoded.messages[0].response_uri, "/1");
        assert_eq!(
            decoded.messages[1].body,
            Value::Array(vec![Value::from("second")])
        );
        assert!(!decoded.messages[1].is_response());
    }

    #[test]
    fn test_request_body_framing() {
        let bundle = MessageBundle::new(vec![AmfMessage::new("t", "/1", Value::Null)]);
        let encoded = encode_request_bundle(&bundle).unwrap();
        let expected: &[u8] = &[
            0x00, 0x03, // version
            0x00, 0x00, // headers
            0x00, 0x01, // messages
            0x00, 0x01, b't', 0x00, 0x02, b'/', b'1', // uris
            0x00, 0x00, 0x00, 0x00, // length placeholder
            0x0A, 0x00, 0x00, 0x00, 0x01, 0x11, 0x01,
        ];
        assert_eq!(&encoded[..], expected);
    }

    #[test]
    fn test_header_values_not_written() {
        let mut bundle = MessageBundle::new(Vec::new());
        bundle.headers.push(Header {
            name: "h".into(),
            must_understand: true,
            value: Value::from("ignored"),
        });
        let encoded = encode_request_bundle(&bundle).unwrap();
        assert_eq!(&encoded[..], &[0, 3, 0, 1, 0, 1, b'h', 1, 0, 0]);
    }

    #[test]
    fn test_oversized_envelope_strings_rejected() {
        let long = "u".repeat(70000);
        let bundle = MessageBundle::new(vec![AmfMessage::new(long.as_str(), "/1", Value::Null)]);
        let err = encode_request_bundle(&bundle).unwrap_err();
        assert!(matches!(
            err,
            Error::Remoting(RemotingError::StringTooLong {
                what: "target URI",
                len: 70000
            })
        ));

        let bundle = MessageBundle::new(vec![AmfMessage::new("null", long.as_str(), Value::Null)]);
        assert!(matches!(
            encode_request_bundle(&bundle),
            Err(Error::Remoting(RemotingError::StringTooLong {
                what: "response URI",
                ..
            }))
        ));

        let mut bundle = MessageBundle::new(Vec::new());
        bundle.headers.push(Header {
            name: long.clone(),
            must_understand: false,
            value: Value::Null,
        });
        assert!(matches!(
            encode_request_bundle(&bundle),
            Err(Error::Remoting(RemotingError::StringTooLong {
                what: "header name",
                ..
            }))
        ));

        // Exactly u16::MAX bytes still fits
        let edge = "e".repeat(0xFFFF);
        let bundle = MessageBundle::new(vec![AmfMessage::new(edge.as_str(), "/1", Value::Null)]);
        let encoded = encode_request_bundle(&bundle).unwrap();
        let decoded = decode_any_bundle(&encoded, registry()).unwrap();
        assert_eq!(decoded.messages[0].target_uri, edge);
    }

    #[test]
    fn test_response_body_single_value() {
        let body = Value::from(vec![Value::from(1), Value::from(2)]);
        let data = response_bytes("client/onStatus", &body);
        let decoded = decode_any_bundle(&data, registry()).unwrap();

        let message = &decoded.messages[0];
        assert_eq!(message.target_uri, "client");
        assert_eq!(message.status, Some(ResponseStatus::Status));
        assert_eq!(message.body, body);
    }

    #[test]
    fn test_headers_decoded() {
        let mut buf = BytesMut::new();
        buf.put_u16(0);
        buf.put_u16(1);
        amf0::write_utf8(&mut buf, "Credentials").unwrap();
        buf.put_u8(1);
        buf.put_u32(u32::MAX);
        buf.put_slice(&amf0::encode(&Value::from("secret")).unwrap());
        buf.put_u16(0);

        let decoded = decode_any_bundle(&buf, registry()).unwrap();
        assert_eq!(
            decoded.headers,
            vec![Header {
                name: "Credentials".into(),
                must_understand: true,
                value: Value::from("secret"),
            }]
        );
        assert!(decoded.messages.is_empty());
    }

    #[test]
    fn test_unsupported_version() {
        for version in [0x0Au16, 0x0B, 0xFFFF] {
            let data = [(version >> 8) as u8, version as u8, 0, 0, 0, 0];
            let err = decode_any_bundle(&data, registry()).unwrap_err();
            assert!(matches!(
                err,
                Error::Remoting(RemotingError::UnsupportedVersion(v)) if v == version
            ));
        }
        assert!(decode_any_bundle(&[0, 9, 0, 0, 0, 0], registry()).is_ok());
    }

    #[test]
    fn test_request_without_array_marker() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0, 3, 0, 0, 0, 1]);
        amf0::write_utf8(&mut buf, "null").unwrap();
        amf0::write_utf8(&mut buf, "/1").unwrap();
        buf.put_u32(0);
        buf.put_u8(0x03);

        let err = decode_any_bundle(&buf, registry()).unwrap_err();
        assert!(matches!(
            err,
            Error::Remoting(RemotingError::ExpectedArgumentArray(0x03))
        ));
    }

    #[test]
    fn test_legacy_object_end_array_marker() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0, 3, 0, 0, 0, 1]);
        amf0::write_utf8(&mut buf, "svc.op").unwrap();
        amf0::write_utf8(&mut buf, "/1").unwrap();
        buf.put_u32(0);
        buf.put_u8(MARKER_OBJECT_END);
        buf.put_u32(2);
        buf.put_slice(&amf0::encode_all(&[Value::from("a"), Value::Null]).unwrap());

        let decoded = decode_any_bundle(&buf, registry()).unwrap();
        assert_eq!(
            decoded.messages[0].body,
            Value::Array(vec![Value::from("a"), Value::Null])
        );
    }

    #[test]
    fn test_truncated_stream() {
        let data = response_bytes("/1/onResult", &Value::from("payload"));
        for len in 0..data.len() {
            let err = decode_any_bundle(&data[..len], registry()).unwrap_err();
            assert!(
                matches!(err, Error::Amf(AmfError::UnexpectedEof)),
                "len {} gave {:?}",
                len,
                err
            );
        }
    }

    #[test]
    fn test_reference_tables_reset_per_message() {
        // Second body references string 0 which only exists in the first body
        let mut buf = BytesMut::new();
        buf.put_slice(&[0, 3, 0, 0, 0, 2]);
        for body in [&[0x11, 0x06, 0x03, b'a'][..], &[0x11, 0x06, 0x00][..]] {
            amf0::write_utf8(&mut buf, "/1/onResult").unwrap();
            amf0::write_utf8(&mut buf, "").unwrap();
            buf.put_u32(0);
            buf.put_slice(body);
        }

        let err = decode_any_bundle(&buf, registry()).unwrap_err();
        assert!(matches!(
            err,
            Error::Amf(AmfError::InvalidReference { index: 0, .. })
        ));
    }
}
