//! AMF0 encoder and decoder
//!
//! AMF0 is the original Action Message Format used by Flash remoting.
//! Reference: AMF0 File Format Specification (amf0-file-format-specification.pdf)
//!
//! Type Markers:
//! ```text
//! 0x00 - Number (IEEE 754 double)
//! 0x01 - Boolean
//! 0x02 - String (UTF-8, 16-bit length prefix)
//! 0x03 - Object (key-value pairs until 0x000009)
//! 0x04 - MovieClip (reserved, not supported)
//! 0x05 - Null
//! 0x06 - Undefined
//! 0x07 - Reference (16-bit index)
//! 0x08 - ECMA Array (associative array)
//! 0x09 - Object End (0x000009 sequence)
//! 0x0A - Strict Array (dense array)
//! 0x0B - Date (double + timezone)
//! 0x0C - Long String (UTF-8, 32-bit length prefix)
//! 0x0D - Unsupported
//! 0x0E - RecordSet (reserved, not supported)
//! 0x0F - XML Document
//! 0x10 - Typed Object (class name + properties)
//! 0x11 - AVM+ (switch to AMF3)
//! ```
//!
//! Once a 0x11 marker has been seen the decoder stays in AMF3 mode until it
//! is reset. Flash Player 9 tags the envelope as version 3 whatever the body
//! encoding, so the marker is the only reliable switch.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::amf3::{Amf3Decoder, Amf3Encoder};
use super::reference::ObjectTable;
use super::registry::{DecodeWarning, TypeRegistry};
use super::value::{AmfObject, Fields, Value};
use crate::error::AmfError;

// AMF0 type markers
const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOLEAN: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_MOVIE_CLIP: u8 = 0x04;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_REFERENCE: u8 = 0x07;
const MARKER_ECMA_ARRAY: u8 = 0x08;
pub(crate) const MARKER_OBJECT_END: u8 = 0x09;
pub(crate) const MARKER_STRICT_ARRAY: u8 = 0x0A;
const MARKER_DATE: u8 = 0x0B;
const MARKER_LONG_STRING: u8 = 0x0C;
const MARKER_UNSUPPORTED: u8 = 0x0D;
const MARKER_RECORD_SET: u8 = 0x0E;
const MARKER_XML_DOCUMENT: u8 = 0x0F;
const MARKER_TYPED_OBJECT: u8 = 0x10;
pub(crate) const MARKER_AVMPLUS: u8 = 0x11;

/// Maximum nesting depth for objects/arrays (prevent stack overflow)
const MAX_NESTING_DEPTH: usize = 64;

/// AMF0 decoder with embedded AMF3 support
pub struct Amf0Decoder {
    /// Reference table for complex values (objects, arrays)
    references: ObjectTable,
    /// Decoder for values behind the AVM+ marker
    amf3: Amf3Decoder,
    /// Set once an AVM+ marker was seen
    amf3_mode: bool,
    /// Current nesting depth
    depth: usize,
}

impl Amf0Decoder {
    /// Create a new decoder with an empty type registry
    pub fn new() -> Self {
        Self::with_registry(Arc::new(TypeRegistry::new()))
    }

    /// Create a decoder that materializes typed objects against `registry`
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            references: ObjectTable::new(),
            amf3: Amf3Decoder::with_registry(registry),
            amf3_mode: false,
            depth: 0,
        }
    }

    /// Reset decoder state (call between message bodies)
    ///
    /// Clears the AMF0 and AMF3 reference tables and leaves AMF3 mode.
    pub fn reset(&mut self) {
        self.references.clear();
        self.amf3.reset();
        self.amf3_mode = false;
        self.depth = 0;
    }

    /// Whether an AVM+ marker switched this decoder to AMF3
    pub fn is_amf3(&self) -> bool {
        self.amf3_mode
    }

    /// Warnings recorded since the last call
    pub fn take_warnings(&mut self) -> Vec<DecodeWarning> {
        self.amf3.take_warnings()
    }

    /// Decode a single value from the buffer
    pub fn decode(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        if self.amf3_mode {
            return self.amf3.decode(buf);
        }
        if buf.is_empty() {
            return Err(AmfError::UnexpectedEof);
        }

        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(AmfError::NestingTooDeep);
        }

        let marker = buf.get_u8();
        let result = self.decode_value(marker, buf);
        self.depth -= 1;
        result
    }

    /// Decode all values from buffer until exhausted
    pub fn decode_all(&mut self, buf: &mut Bytes) -> Result<Vec<Value>, AmfError> {
        let mut values = Vec::new();
        while buf.has_remaining() {
            values.push(self.decode(buf)?);
        }
        Ok(values)
    }

    fn decode_value(&mut self, marker: u8, buf: &mut Bytes) -> Result<Value, AmfError> {
        match marker {
            MARKER_NUMBER => {
                ensure(buf, 8)?;
                Ok(Value::Number(buf.get_f64()))
            }
            MARKER_BOOLEAN => {
                ensure(buf, 1)?;
                Ok(Value::Boolean(buf.get_u8() != 0))
            }
            MARKER_STRING => Ok(Value::String(read_utf8(buf)?)),
            MARKER_OBJECT => self.decode_object(buf),
            MARKER_NULL => Ok(Value::Null),
            MARKER_UNDEFINED => Ok(Value::Undefined),
            MARKER_REFERENCE => {
                ensure(buf, 2)?;
                self.references.resolve(buf.get_u16() as usize)
            }
            MARKER_ECMA_ARRAY => self.decode_ecma_array(buf),
            MARKER_STRICT_ARRAY => self.decode_strict_array(buf),
            MARKER_DATE => self.decode_date(buf),
            MARKER_LONG_STRING => Ok(Value::String(read_utf8_long(buf)?)),
            MARKER_UNSUPPORTED => {
                self.amf3.warn(DecodeWarning::UnsupportedType {
                    marker,
                    name: "Unsupported",
                });
                Ok(Value::Undefined)
            }
            MARKER_XML_DOCUMENT => Ok(Value::Xml(read_utf8_long(buf)?)),
            MARKER_TYPED_OBJECT => self.decode_typed_object(buf),
            MARKER_AVMPLUS => {
                self.amf3_mode = true;
                self.amf3.decode(buf)
            }
            MARKER_MOVIE_CLIP => Err(AmfError::UnsupportedType("MovieClip")),
            MARKER_RECORD_SET => Err(AmfError::UnsupportedType("RecordSet")),
            _ => Err(AmfError::UnknownMarker(marker)),
        }
    }

    /// Name/value pairs until the empty name followed by 0x09
    fn decode_properties(&mut self, buf: &mut Bytes) -> Result<Fields, AmfError> {
        let mut properties = Fields::new();
        loop {
            let key = read_utf8(buf)?;
            if key.is_empty() {
                ensure(buf, 1)?;
                if buf.get_u8() != MARKER_OBJECT_END {
                    return Err(AmfError::InvalidObjectEnd);
                }
                return Ok(properties);
            }
            let value = self.decode(buf)?;
            properties.insert(key, value);
        }
    }

    fn decode_object(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        let slot = self.references.reserve();
        let properties = self.decode_properties(buf)?;
        let obj = Value::object(AmfObject::anonymous(properties));
        self.references.fill(slot, obj.clone());
        Ok(obj)
    }

    fn decode_ecma_array(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        ensure(buf, 4)?;
        // Count hint, not always accurate
        let _count = buf.get_u32();

        let slot = self.references.reserve();
        let properties = self.decode_properties(buf)?;
        let arr = Value::AssociativeArray(properties);
        self.references.fill(slot, arr.clone());
        Ok(arr)
    }

    fn decode_strict_array(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        ensure(buf, 4)?;
        let count = buf.get_u32() as usize;

        let slot = self.references.reserve();
        let mut elements = Vec::with_capacity(count.min(1024)); // Cap initial allocation
        for _ in 0..count {
            elements.push(self.decode(buf)?);
        }

        let arr = Value::Array(elements);
        self.references.fill(slot, arr.clone());
        Ok(arr)
    }

    fn decode_date(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        ensure(buf, 10)?;
        let millis = buf.get_f64();
        let timezone = buf.get_i16();
        if timezone != 0 {
            tracing::debug!(timezone = timezone, "AMF0 date with non-zero timezone offset");
        }
        Ok(Value::Date { millis, timezone })
    }

    fn decode_typed_object(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        let class_name = read_utf8(buf)?;
        let slot = self.references.reserve();
        let properties = self.decode_properties(buf)?;

        let (obj, mismatch) = self
            .amf3
            .registry()
            .materialize(AmfObject::typed(class_name, properties));
        if let Some(mismatch) = mismatch {
            self.amf3.warn(DecodeWarning::ShapeMismatch(mismatch));
        }

        let obj = Value::object(obj);
        self.references.fill(slot, obj.clone());
        Ok(obj)
    }
}

impl Default for Amf0Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// AMF0 encoder
///
/// Byte arrays have no AMF0 form and are written behind an AVM+ marker.
/// Like the decoder, the switch is sticky: every value after it is AMF3
/// until `finish`.
pub struct Amf0Encoder {
    buf: BytesMut,
    amf3: Amf3Encoder,
    amf3_mode: bool,
}

impl Amf0Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create encoder with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            amf3: Amf3Encoder::new(),
            amf3_mode: false,
        }
    }

    /// Get the encoded bytes and reset encoder
    pub fn finish(&mut self) -> Bytes {
        self.amf3.reset();
        self.amf3_mode = false;
        self.buf.split().freeze()
    }

    /// Check if the AVM+ switch has been written
    pub fn is_amf3_mode(&self) -> bool {
        self.amf3_mode
    }

    /// Get current encoded length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if encoder is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a single AMF0 value
    pub fn encode(&mut self, value: &Value) -> Result<(), AmfError> {
        if self.amf3_mode {
            return self.encode_amf3(value);
        }

        match value {
            Value::Null => {
                self.buf.put_u8(MARKER_NULL);
            }
            Value::Undefined => {
                self.buf.put_u8(MARKER_UNDEFINED);
            }
            Value::Boolean(b) => {
                self.buf.put_u8(MARKER_BOOLEAN);
                self.buf.put_u8(if *b { 1 } else { 0 });
            }
            Value::Number(n) => {
                self.buf.put_u8(MARKER_NUMBER);
                self.buf.put_f64(*n);
            }
            Value::Integer(i) => {
                // AMF0 has no integer type
                self.buf.put_u8(MARKER_NUMBER);
                self.buf.put_f64(*i as f64);
            }
            Value::String(s) => {
                if s.len() > 0xFFFF {
                    let len = wire_u32("long string", s.len())?;
                    self.buf.put_u8(MARKER_LONG_STRING);
                    self.buf.put_u32(len);
                } else {
                    self.buf.put_u8(MARKER_STRING);
                    self.buf.put_u16(s.len() as u16);
                }
                self.buf.put_slice(s.as_bytes());
            }
            Value::Object(obj) => {
                match obj.class_name() {
                    Some(class_name) => {
                        self.buf.put_u8(MARKER_TYPED_OBJECT);
                        write_utf8(&mut self.buf, class_name)?;
                    }
                    None => self.buf.put_u8(MARKER_OBJECT),
                }
                self.encode_properties(obj.fields())?;
            }
            Value::AssociativeArray(props) => {
                let count = wire_u32("ECMA array", props.len())?;
                self.buf.put_u8(MARKER_ECMA_ARRAY);
                self.buf.put_u32(count);
                self.encode_properties(props.iter())?;
            }
            Value::Array(elements) => {
                let count = wire_u32("strict array", elements.len())?;
                self.buf.put_u8(MARKER_STRICT_ARRAY);
                self.buf.put_u32(count);
                for elem in elements {
                    self.encode(elem)?;
                }
            }
            Value::Date { millis, .. } => {
                self.buf.put_u8(MARKER_DATE);
                self.buf.put_f64(*millis);
                self.buf.put_i16(0); // Timezone, always written as zero
            }
            Value::Xml(s) => {
                let len = wire_u32("XML document", s.len())?;
                self.buf.put_u8(MARKER_XML_DOCUMENT);
                self.buf.put_u32(len);
                self.buf.put_slice(s.as_bytes());
            }
            Value::ByteArray(_) => {
                self.buf.put_u8(MARKER_AVMPLUS);
                self.amf3_mode = true;
                tracing::trace!("Switched encoder to AMF3 for a byte array");
                self.encode_amf3(value)?;
            }
        }
        Ok(())
    }

    /// Write one value through the AMF3 encoder; its tables live until `finish`
    fn encode_amf3(&mut self, value: &Value) -> Result<(), AmfError> {
        self.amf3.encode(value)?;
        let encoded = self.amf3.finish();
        self.buf.put_slice(&encoded);
        Ok(())
    }

    /// Encode multiple values
    pub fn encode_all(&mut self, values: &[Value]) -> Result<(), AmfError> {
        for value in values {
            self.encode(value)?;
        }
        Ok(())
    }

    /// Keys and the end marker stay AMF0 even after the switch
    fn encode_properties<'a>(
        &mut self,
        props: impl Iterator<Item = (&'a String, &'a Value)>,
    ) -> Result<(), AmfError> {
        for (key, val) in props {
            if key.is_empty() {
                tracing::warn!("Skipping property with empty name, it would end the object");
                continue;
            }
            write_utf8(&mut self.buf, key)?;
            self.encode(val)?;
        }
        // Object end marker
        self.buf.put_u16(0); // Empty key
        self.buf.put_u8(MARKER_OBJECT_END);
        Ok(())
    }
}

fn wire_u32(what: &'static str, len: usize) -> Result<u32, AmfError> {
    u32::try_from(len).map_err(|_| AmfError::LengthOverflow { what, len })
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn ensure(buf: &Bytes, len: usize) -> Result<(), AmfError> {
    if buf.remaining() < len {
        return Err(AmfError::UnexpectedEof);
    }
    Ok(())
}

/// Read UTF-8 string with 16-bit length prefix (no type marker)
pub fn read_utf8(buf: &mut Bytes) -> Result<String, AmfError> {
    ensure(buf, 2)?;
    let len = buf.get_u16() as usize;
    ensure(buf, len)?;

    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)
}

/// Read UTF-8 string with 32-bit length prefix (no type marker)
pub fn read_utf8_long(buf: &mut Bytes) -> Result<String, AmfError> {
    ensure(buf, 4)?;
    let len = buf.get_u32() as usize;
    ensure(buf, len)?;

    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)
}

/// Write UTF-8 string with 16-bit length prefix (no type marker)
///
/// Strings longer than 65535 bytes are rejected and nothing is written.
pub fn write_utf8(buf: &mut BytesMut, s: &str) -> Result<(), AmfError> {
    let len = u16::try_from(s.len()).map_err(|_| AmfError::LengthOverflow {
        what: "UTF-8 string",
        len: s.len(),
    })?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Convenience function to encode a single value
pub fn encode(value: &Value) -> Result<Bytes, AmfError> {
    let mut encoder = Amf0Encoder::new();
    encoder.encode(value)?;
    Ok(encoder.finish())
}

/// Convenience function to encode multiple values
pub fn encode_all(values: &[Value]) -> Result<Bytes, AmfError> {
    let mut encoder = Amf0Encoder::new();
    encoder.encode_all(values)?;
    Ok(encoder.finish())
}

/// Convenience function to decode a single value
pub fn decode(data: &[u8]) -> Result<Value, AmfError> {
    let mut decoder = Amf0Decoder::new();
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode(&mut buf)
}

/// Convenience function to decode all values
pub fn decode_all(data: &[u8]) -> Result<Vec<Value>, AmfError> {
    let mut decoder = Amf0Decoder::new();
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode_all(&mut buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::registry::ClassShape;

    #[test]
    fn test_number_roundtrip() {
        let value = Value::Number(42.5);
        let encoded = encode(&value).unwrap();
        assert_eq!(decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_string_roundtrip() {
        let value = Value::String("hello world".into());
        let encoded = encode(&value).unwrap();
        assert_eq!(&encoded[..3], &[MARKER_STRING, 0x00, 0x0B]);
        assert_eq!(decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_object_roundtrip_keeps_order() {
        let mut props = Fields::new();
        props.insert("name".to_string(), Value::String("test".into()));
        props.insert("value".to_string(), Value::Number(123.0));
        props.insert("alpha".to_string(), Value::Boolean(false));
        let value = Value::object(AmfObject::anonymous(props));

        let decoded = decode(&encode(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
        let keys: Vec<_> = decoded.as_object().unwrap().fields().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["name", "value", "alpha"]);
    }

    #[test]
    fn test_typed_object_roundtrip() {
        let mut props = Fields::new();
        props.insert("x".to_string(), Value::Number(1.0));
        let value = Value::object(AmfObject::typed("com.example.Point", props));

        let encoded = encode(&value).unwrap();
        assert_eq!(encoded[0], MARKER_TYPED_OBJECT);
        assert_eq!(decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_typed_object_materialized() {
        let mut registry = TypeRegistry::new();
        registry.register(ClassShape::new("P", ["x", "y"]));
        let mut decoder = Amf0Decoder::with_registry(Arc::new(registry));

        let mut props = Fields::new();
        props.insert("y".to_string(), Value::Number(2.0));
        props.insert("x".to_string(), Value::Number(1.0));
        let mut buf = encode(&Value::object(AmfObject::typed("P", props))).unwrap();

        let decoded = decoder.decode(&mut buf).unwrap();
        let obj = decoded.as_object().unwrap();
        assert_eq!(obj.traits.members, vec!["x", "y"]);
        assert!(decoder.take_warnings().is_empty());
    }

    #[test]
    fn test_array_roundtrip() {
        let value = Value::Array(vec![
            Value::Number(1.0),
            Value::String("two".into()),
            Value::Boolean(true),
        ]);
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn test_ecma_array_roundtrip() {
        let mut props = Fields::new();
        props.insert("duration".into(), Value::Number(0.0));
        props.insert("width".into(), Value::Number(1280.0));
        let value = Value::AssociativeArray(props);
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn test_date_timezone_kept_on_decode() {
        let mut data = vec![MARKER_DATE];
        data.extend_from_slice(&1000.0f64.to_be_bytes());
        data.extend_from_slice(&(-60i16).to_be_bytes());
        assert_eq!(
            decode(&data).unwrap(),
            Value::Date {
                millis: 1000.0,
                timezone: -60
            }
        );

        // Encoder always writes a zero offset
        let encoded = encode(&Value::Date {
            millis: 1000.0,
            timezone: -60,
        })
        .unwrap();
        assert_eq!(&encoded[9..], &[0, 0]);
    }

    #[test]
    fn test_reference_resolves_earlier_object() {
        let mut data = vec![MARKER_STRICT_ARRAY, 0, 0, 0, 2];
        data.extend_from_slice(&[MARKER_OBJECT, 0, 1, b'a', MARKER_NULL, 0, 0, MARKER_OBJECT_END]);
        data.extend_from_slice(&[MARKER_REFERENCE, 0, 1]);

        let value = decode(&data).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items[0], items[1]);
    }

    #[test]
    fn test_reference_out_of_range() {
        assert!(matches!(
            decode(&[MARKER_REFERENCE, 0, 3]),
            Err(AmfError::InvalidReference { index: 3, .. })
        ));
    }

    #[test]
    fn test_missing_object_end() {
        let data = [MARKER_OBJECT, 0, 0, 0x42];
        assert_eq!(decode(&data), Err(AmfError::InvalidObjectEnd));
        let data = [MARKER_OBJECT, 0, 0];
        assert_eq!(decode(&data), Err(AmfError::UnexpectedEof));
    }

    #[test]
    fn test_legacy_markers() {
        let mut decoder = Amf0Decoder::new();
        let mut buf = Bytes::from_static(&[MARKER_UNSUPPORTED]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), Value::Undefined);
        assert_eq!(decoder.take_warnings().len(), 1);

        assert_eq!(
            decode(&[MARKER_RECORD_SET]),
            Err(AmfError::UnsupportedType("RecordSet"))
        );
        assert_eq!(
            decode(&[MARKER_MOVIE_CLIP]),
            Err(AmfError::UnsupportedType("MovieClip"))
        );
        assert_eq!(decode(&[0x20]), Err(AmfError::UnknownMarker(0x20)));
    }

    #[test]
    fn test_avmplus_switch_is_sticky() {
        // 0x11 then AMF3 integer 5, then AMF3 true without a second switch
        let mut decoder = Amf0Decoder::new();
        let mut buf = Bytes::from_static(&[MARKER_AVMPLUS, 0x04, 0x05, 0x03]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), Value::Integer(5));
        assert!(decoder.is_amf3());
        assert_eq!(decoder.decode(&mut buf).unwrap(), Value::Boolean(true));

        decoder.reset();
        assert!(!decoder.is_amf3());
    }

    #[test]
    fn test_byte_array_through_avmplus() {
        let value = Value::bytes(vec![1, 2, 3]);
        let encoded = encode(&value).unwrap();
        assert_eq!(encoded[0], MARKER_AVMPLUS);
        assert_eq!(decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_values_after_byte_array_stay_amf3() {
        let value = Value::Array(vec![Value::bytes(vec![1, 2]), Value::Number(1.0)]);
        let encoded = encode(&value).unwrap();
        // strict array header, switch, AMF3 byte array, AMF3 double
        assert_eq!(
            &encoded[..9],
            &[MARKER_STRICT_ARRAY, 0, 0, 0, 2, MARKER_AVMPLUS, 0x0C, 0x05, 1]
        );
        assert_eq!(encoded[10], 0x05);
        assert_eq!(decode(&encoded).unwrap(), value);

        let mut props = Fields::new();
        props.insert("blob".to_string(), Value::bytes(vec![9]));
        props.insert("name".to_string(), Value::String("after".into()));
        props.insert("count".to_string(), Value::Integer(3));
        let value = Value::object(AmfObject::anonymous(props));
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn test_encoder_switch_lasts_until_finish() {
        let values = vec![
            Value::String("before".into()),
            Value::bytes(vec![7]),
            Value::String("after".into()),
            Value::Null,
        ];
        let mut encoder = Amf0Encoder::new();
        encoder.encode_all(&values).unwrap();
        assert!(encoder.is_amf3_mode());
        let encoded = encoder.finish();
        assert!(!encoder.is_amf3_mode());
        assert_eq!(decode_all(&encoded).unwrap(), values);

        // A fresh scope starts in AMF0 again
        encoder.encode(&Value::Null).unwrap();
        assert_eq!(&encoder.finish()[..], &[MARKER_NULL]);
    }

    #[test]
    fn test_write_utf8_rejects_oversized() {
        let mut buf = BytesMut::new();
        let long = "y".repeat(0x1_0000);
        assert_eq!(
            write_utf8(&mut buf, &long),
            Err(AmfError::LengthOverflow {
                what: "UTF-8 string",
                len: 0x1_0000
            })
        );
        assert!(buf.is_empty());

        write_utf8(&mut buf, &long[1..]).unwrap();
        assert_eq!(buf.len(), 2 + 0xFFFF);
    }

    #[test]
    fn test_oversized_property_name_fails() {
        let mut props = Fields::new();
        props.insert("k".repeat(70000), Value::Null);
        let err = encode(&Value::object(AmfObject::anonymous(props))).unwrap_err();
        assert!(matches!(err, AmfError::LengthOverflow { len: 70000, .. }));
    }

    #[test]
    fn test_reference_budget_applies() {
        // strict array of 2000 nulls, then a strict array referencing it 1000 times
        let mut data = vec![MARKER_STRICT_ARRAY, 0, 0, 0, 2];
        data.extend_from_slice(&[MARKER_STRICT_ARRAY, 0, 0, 0x07, 0xD0]);
        data.extend(std::iter::repeat(MARKER_NULL).take(2000));
        data.extend_from_slice(&[MARKER_STRICT_ARRAY, 0, 0, 0x03, 0xE8]);
        for _ in 0..1000 {
            data.extend_from_slice(&[MARKER_REFERENCE, 0, 1]);
        }
        assert!(matches!(
            decode(&data),
            Err(AmfError::ReferenceExpansion { .. })
        ));
    }

    #[test]
    fn test_multiple_values() {
        let values = vec![
            Value::String("getX".into()),
            Value::Number(1.0),
            Value::Null,
        ];
        let encoded = encode_all(&values).unwrap();
        assert_eq!(decode_all(&encoded).unwrap(), values);
    }

    #[test]
    fn test_long_string() {
        let long_str = "x".repeat(70000);
        let value = Value::String(long_str.clone());
        let encoded = encode(&value).unwrap();
        assert_eq!(encoded[0], MARKER_LONG_STRING);
        assert_eq!(decode(&encoded).unwrap(), Value::String(long_str));
    }
}
