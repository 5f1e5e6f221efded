//! AMF3 encoder and decoder
//!
//! AMF3 is the ActionScript 3.0 serialization format. Compared to AMF0 it
//! adds variable-length integers and three reference tables (strings,
//! objects, traits) so repeated values are sent once.
//! Reference: AMF3 Specification (amf3_spec_121207.pdf)
//!
//! Type Markers:
//! ```text
//! 0x00 - Undefined
//! 0x01 - Null
//! 0x02 - False
//! 0x03 - True
//! 0x04 - Integer (29-bit signed, U29 encoded)
//! 0x05 - Double (IEEE 754)
//! 0x06 - String (U29 length/reference header)
//! 0x07 - XMLDocument (legacy)
//! 0x08 - Date
//! 0x09 - Array (named part, then dense part)
//! 0x0A - Object (traits + members)
//! 0x0B - XML (E4X)
//! 0x0C - ByteArray
//! 0x0D-0x10 - Vector int/uint/double/object (not supported)
//! 0x11 - Dictionary (not supported)
//! ```
//!
//! U29 header layout: up to four bytes, seven payload bits each with the
//! high bit as continuation, except the fourth byte which carries eight.
//! For strings, arrays, objects, XML, dates and byte arrays the low bit of
//! the header says whether the rest is a table index (0) or a length (1).

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::reference::{DecodeTables, EncodeTables, Lookup};
use super::registry::{DecodeWarning, TypeRegistry};
use super::value::{AmfObject, Fields, Traits, Value, INTEGER_MAX, INTEGER_MIN};
use crate::error::AmfError;

const MARKER_UNDEFINED: u8 = 0x00;
const MARKER_NULL: u8 = 0x01;
const MARKER_FALSE: u8 = 0x02;
const MARKER_TRUE: u8 = 0x03;
const MARKER_INTEGER: u8 = 0x04;
const MARKER_DOUBLE: u8 = 0x05;
const MARKER_STRING: u8 = 0x06;
const MARKER_XML_DOC: u8 = 0x07;
const MARKER_DATE: u8 = 0x08;
const MARKER_ARRAY: u8 = 0x09;
const MARKER_OBJECT: u8 = 0x0A;
const MARKER_XML: u8 = 0x0B;
const MARKER_BYTE_ARRAY: u8 = 0x0C;
const MARKER_VECTOR_INT: u8 = 0x0D;
const MARKER_VECTOR_UINT: u8 = 0x0E;
const MARKER_VECTOR_DOUBLE: u8 = 0x0F;
const MARKER_VECTOR_OBJECT: u8 = 0x10;
const MARKER_DICTIONARY: u8 = 0x11;

/// Traits header flag: traits are inline, not a reference
const TRAITS_INLINE: u32 = 0x02;
/// Traits header flag: object is externalizable
const TRAITS_EXTERNALIZABLE: u32 = 0x04;
/// Traits header flag: object is dynamic
const TRAITS_DYNAMIC: u32 = 0x08;

/// Maximum nesting depth for objects/arrays (prevent stack overflow)
const MAX_NESTING_DEPTH: usize = 64;

/// Largest value a U29 can carry
const U29_MAX: u32 = 0x1FFF_FFFF;

/// AMF3 decoder
pub struct Amf3Decoder {
    tables: DecodeTables,
    registry: Arc<TypeRegistry>,
    warnings: Vec<DecodeWarning>,
    depth: usize,
}

impl Amf3Decoder {
    /// Create a decoder with an empty type registry
    pub fn new() -> Self {
        Self::with_registry(Arc::new(TypeRegistry::new()))
    }

    /// Create a decoder that materializes typed objects against `registry`
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            tables: DecodeTables::new(),
            registry,
            warnings: Vec::new(),
            depth: 0,
        }
    }

    /// Reset reference tables (call between message bodies)
    pub fn reset(&mut self) {
        self.tables.reset();
        self.depth = 0;
    }

    /// Registry used for typed objects
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Warnings recorded since the last call
    pub fn take_warnings(&mut self) -> Vec<DecodeWarning> {
        std::mem::take(&mut self.warnings)
    }

    pub(crate) fn warn(&mut self, warning: DecodeWarning) {
        tracing::warn!(warning = %warning, "AMF decode warning");
        self.warnings.push(warning);
    }

    /// Decode a single AMF3 value from the buffer
    pub fn decode(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
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

    fn decode_value(&mut self, marker: u8, buf: &mut Bytes) -> Result<Value, AmfError> {
        match marker {
            MARKER_UNDEFINED => Ok(Value::Undefined),
            MARKER_NULL => Ok(Value::Null),
            MARKER_FALSE => Ok(Value::Boolean(false)),
            MARKER_TRUE => Ok(Value::Boolean(true)),
            MARKER_INTEGER => Ok(Value::Integer(read_i29(buf)?)),
            MARKER_DOUBLE => {
                ensure(buf, 8)?;
                Ok(Value::Number(buf.get_f64()))
            }
            MARKER_STRING => Ok(Value::String(self.read_string(buf)?)),
            MARKER_XML_DOC | MARKER_XML => self.decode_xml(buf),
            MARKER_DATE => self.decode_date(buf),
            MARKER_ARRAY => self.decode_array(buf),
            MARKER_OBJECT => self.decode_object(buf),
            MARKER_BYTE_ARRAY => self.decode_byte_array(buf),
            MARKER_VECTOR_INT | MARKER_VECTOR_UINT | MARKER_VECTOR_DOUBLE
            | MARKER_VECTOR_OBJECT => Err(AmfError::UnsupportedType("Vector")),
            MARKER_DICTIONARY => Err(AmfError::UnsupportedType("Dictionary")),
            _ => Err(AmfError::UnknownMarker(marker)),
        }
    }

    /// Read a string with U29 header, resolving string references
    pub fn read_string(&mut self, buf: &mut Bytes) -> Result<String, AmfError> {
        let header = read_u29(buf)?;
        if header & 1 == 0 {
            return self.tables.string((header >> 1) as usize);
        }

        let len = (header >> 1) as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let s = read_utf8(buf, len)?;
        self.tables.add_string(&s);
        Ok(s)
    }

    /// Read a U29 header; `Err(value)` carries a resolved object reference
    fn read_object_header(&mut self, buf: &mut Bytes) -> Result<Result<u32, Value>, AmfError> {
        let header = read_u29(buf)?;
        if header & 1 == 0 {
            return Ok(Err(self.tables.object((header >> 1) as usize)?));
        }
        Ok(Ok(header >> 1))
    }

    fn decode_xml(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        let len = match self.read_object_header(buf)? {
            Ok(len) => len as usize,
            Err(value) => return Ok(value),
        };
        let value = Value::Xml(read_utf8(buf, len)?);
        self.tables.objects().push(value.clone());
        Ok(value)
    }

    fn decode_date(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        if let Err(value) = self.read_object_header(buf)? {
            return Ok(value);
        }
        ensure(buf, 8)?;
        let value = Value::date(buf.get_f64());
        self.tables.objects().push(value.clone());
        Ok(value)
    }

    fn decode_byte_array(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        let len = match self.read_object_header(buf)? {
            Ok(len) => len as usize,
            Err(value) => return Ok(value),
        };
        ensure(buf, len)?;
        let value = Value::ByteArray(buf.copy_to_bytes(len).to_vec());
        self.tables.objects().push(value.clone());
        Ok(value)
    }

    fn decode_array(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        let dense_len = match self.read_object_header(buf)? {
            Ok(len) => len as usize,
            Err(value) => return Ok(value),
        };
        let slot = self.tables.objects().reserve();

        let mut named = Fields::new();
        loop {
            let key = self.read_string(buf)?;
            if key.is_empty() {
                break;
            }
            let value = self.decode(buf)?;
            named.insert(key, value);
        }

        // Cap initial allocation, the length comes from the wire
        let mut dense = Vec::with_capacity(dense_len.min(1024));
        for _ in 0..dense_len {
            dense.push(self.decode(buf)?);
        }

        let value = if named.is_empty() {
            Value::Array(dense)
        } else {
            for (i, item) in dense.into_iter().enumerate() {
                named.insert(i.to_string(), item);
            }
            Value::AssociativeArray(named)
        };
        self.tables.objects().fill(slot, value.clone());
        Ok(value)
    }

    fn decode_object(&mut self, buf: &mut Bytes) -> Result<Value, AmfError> {
        let header = match self.read_object_header(buf)? {
            Ok(header) => header,
            Err(value) => return Ok(value),
        };
        // read_object_header already dropped the reference bit
        let header = (header << 1) | 1;
        let traits = self.read_traits(header, buf)?;
        let slot = self.tables.objects().reserve();

        let mut static_fields = Fields::with_capacity(traits.members.len());
        for member in &traits.members {
            let value = self.decode(buf)?;
            static_fields.insert(member.clone(), value);
        }

        let mut dynamic_fields = Fields::new();
        if traits.dynamic {
            loop {
                let key = self.read_string(buf)?;
                if key.is_empty() {
                    break;
                }
                let value = self.decode(buf)?;
                dynamic_fields.insert(key, value);
            }
        }

        let obj = AmfObject {
            traits,
            static_fields,
            dynamic_fields,
        };
        let (obj, mismatch) = self.registry.materialize(obj);
        if let Some(mismatch) = mismatch {
            self.warn(DecodeWarning::ShapeMismatch(mismatch));
        }

        let value = Value::object(obj);
        self.tables.objects().fill(slot, value.clone());
        Ok(value)
    }

    fn read_traits(&mut self, header: u32, buf: &mut Bytes) -> Result<Arc<Traits>, AmfError> {
        if header & TRAITS_INLINE == 0 {
            return self.tables.traits((header >> 2) as usize);
        }

        if header & TRAITS_EXTERNALIZABLE != 0 {
            let class_name = self.read_string(buf)?;
            return Err(AmfError::Externalizable(class_name));
        }

        let dynamic = header & TRAITS_DYNAMIC != 0;
        let count = (header >> 4) as usize;
        let class_name = self.read_string(buf)?;

        let mut members = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            members.push(self.read_string(buf)?);
        }

        let traits = Arc::new(Traits {
            class_name: (!class_name.is_empty()).then_some(class_name),
            members,
            dynamic,
        });
        self.tables.add_traits(Arc::clone(&traits));
        Ok(traits)
    }
}

impl Default for Amf3Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// AMF3 encoder
pub struct Amf3Encoder {
    buf: BytesMut,
    tables: EncodeTables,
    compact_numbers: bool,
}

impl Amf3Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            tables: EncodeTables::new(),
            compact_numbers: false,
        }
    }

    /// Write integral `Number`s inside the 29-bit range as AMF3 integers
    ///
    /// Off by default so a decoded `Number` keeps its variant.
    pub fn compact_numbers(mut self, enabled: bool) -> Self {
        self.compact_numbers = enabled;
        self
    }

    /// Reset reference tables (call between message bodies)
    pub fn reset(&mut self) {
        self.tables.reset();
    }

    /// Get the encoded bytes and reset the buffer
    ///
    /// Reference tables are kept; call `reset` to start a new scope.
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Get current encoded length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if encoder is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a single AMF3 value
    ///
    /// Fails only when a length does not fit its U29 header.
    pub fn encode(&mut self, value: &Value) -> Result<(), AmfError> {
        match value {
            Value::Undefined => self.buf.put_u8(MARKER_UNDEFINED),
            Value::Null => self.buf.put_u8(MARKER_NULL),
            Value::Boolean(false) => self.buf.put_u8(MARKER_FALSE),
            Value::Boolean(true) => self.buf.put_u8(MARKER_TRUE),
            Value::Integer(i) => {
                if (INTEGER_MIN..=INTEGER_MAX).contains(i) {
                    self.buf.put_u8(MARKER_INTEGER);
                    write_u29(&mut self.buf, (*i as u32) & U29_MAX);
                } else {
                    self.buf.put_u8(MARKER_DOUBLE);
                    self.buf.put_f64(*i as f64);
                }
            }
            Value::Number(n) => match self.compact_integer(*n) {
                Some(i) => {
                    self.buf.put_u8(MARKER_INTEGER);
                    write_u29(&mut self.buf, (i as u32) & U29_MAX);
                }
                None => {
                    self.buf.put_u8(MARKER_DOUBLE);
                    self.buf.put_f64(*n);
                }
            },
            Value::String(s) => {
                self.buf.put_u8(MARKER_STRING);
                self.write_string(s)?;
            }
            Value::Xml(s) => {
                let header = length_header("XML", s.len())?;
                self.buf.put_u8(MARKER_XML);
                self.tables.reserve_object();
                write_u29(&mut self.buf, header);
                self.buf.put_slice(s.as_bytes());
            }
            Value::Date { millis, .. } => {
                self.buf.put_u8(MARKER_DATE);
                self.tables.reserve_object();
                write_u29(&mut self.buf, 1);
                self.buf.put_f64(*millis);
            }
            Value::ByteArray(data) => {
                let header = length_header("byte array", data.len())?;
                self.buf.put_u8(MARKER_BYTE_ARRAY);
                self.tables.reserve_object();
                write_u29(&mut self.buf, header);
                self.buf.put_slice(data);
            }
            Value::Array(items) => {
                let header = length_header("array", items.len())?;
                self.buf.put_u8(MARKER_ARRAY);
                self.tables.reserve_object();
                write_u29(&mut self.buf, header);
                self.write_string("")?;
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::AssociativeArray(fields) => {
                // No dense part; an empty one reads back as an empty Array
                self.buf.put_u8(MARKER_ARRAY);
                self.tables.reserve_object();
                write_u29(&mut self.buf, 1);
                self.write_dynamic_fields(fields)?;
            }
            Value::Object(obj) => {
                self.buf.put_u8(MARKER_OBJECT);
                self.encode_object(obj)?;
            }
        }
        Ok(())
    }

    fn compact_integer(&self, n: f64) -> Option<i32> {
        let in_range = n >= INTEGER_MIN as f64 && n <= INTEGER_MAX as f64;
        let negative_zero = n == 0.0 && n.is_sign_negative();
        (self.compact_numbers && in_range && n.fract() == 0.0 && !negative_zero)
            .then_some(n as i32)
    }

    fn encode_object(&mut self, obj: &Arc<AmfObject>) -> Result<(), AmfError> {
        if let Lookup::Reference(index) = self.tables.intern_object(obj) {
            write_u29(&mut self.buf, (index as u32) << 1);
            return Ok(());
        }

        // Dynamic fields on sealed traits would be lost on the wire
        let widened;
        let traits: &Traits = if !obj.traits.dynamic && !obj.dynamic_fields.is_empty() {
            widened = Traits {
                dynamic: true,
                ..(*obj.traits).clone()
            };
            &widened
        } else {
            obj.traits.as_ref()
        };

        match self.tables.intern_traits(traits) {
            Lookup::Reference(index) => {
                write_u29(&mut self.buf, ((index as u32) << 2) | 0x01);
            }
            Lookup::New(_) => {
                if traits.members.len() > (U29_MAX >> 4) as usize {
                    return Err(AmfError::LengthOverflow {
                        what: "traits member list",
                        len: traits.members.len(),
                    });
                }
                let mut header = ((traits.members.len() as u32) << 4) | TRAITS_INLINE | 0x01;
                if traits.dynamic {
                    header |= TRAITS_DYNAMIC;
                }
                write_u29(&mut self.buf, header);
                self.write_string(traits.class_name.as_deref().unwrap_or(""))?;
                for member in &traits.members {
                    self.write_string(member)?;
                }
            }
        }

        for member in &traits.members {
            match obj.static_fields.get(member) {
                Some(value) => self.encode(value)?,
                None => self.encode(&Value::Undefined)?,
            }
        }

        if traits.dynamic {
            self.write_dynamic_fields(&obj.dynamic_fields)?;
        }
        Ok(())
    }

    /// Name/value pairs closed by the empty string
    fn write_dynamic_fields(&mut self, fields: &Fields) -> Result<(), AmfError> {
        for (key, value) in fields {
            if key.is_empty() {
                tracing::warn!("Skipping field with empty name, it would end the member list");
                continue;
            }
            self.write_string(key)?;
            self.encode(value)?;
        }
        self.write_string("")
    }

    /// Write a string with U29 header, using a reference when possible
    pub fn write_string(&mut self, s: &str) -> Result<(), AmfError> {
        match self.tables.intern_string(s) {
            None => write_u29(&mut self.buf, 0x01),
            Some(Lookup::Reference(index)) => write_u29(&mut self.buf, (index as u32) << 1),
            Some(Lookup::New(_)) => {
                write_u29(&mut self.buf, length_header("string", s.len())?);
                self.buf.put_slice(s.as_bytes());
            }
        }
        Ok(())
    }
}

impl Default for Amf3Encoder {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure(buf: &Bytes, len: usize) -> Result<(), AmfError> {
    if buf.remaining() < len {
        return Err(AmfError::UnexpectedEof);
    }
    Ok(())
}

fn read_utf8(buf: &mut Bytes, len: usize) -> Result<String, AmfError> {
    ensure(buf, len)?;
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)
}

/// Read an unsigned 29-bit variable-length integer
pub fn read_u29(buf: &mut Bytes) -> Result<u32, AmfError> {
    let mut result: u32 = 0;
    for _ in 0..3 {
        ensure(buf, 1)?;
        let b = buf.get_u8();
        result = (result << 7) | (b & 0x7F) as u32;
        if b & 0x80 == 0 {
            return Ok(result);
        }
    }
    ensure(buf, 1)?;
    Ok((result << 8) | buf.get_u8() as u32)
}

/// Read a signed 29-bit integer
pub fn read_i29(buf: &mut Bytes) -> Result<i32, AmfError> {
    let raw = read_u29(buf)?;
    if raw & 0x1000_0000 != 0 {
        Ok(raw as i32 - (1 << 29))
    } else {
        Ok(raw as i32)
    }
}

/// By-value length header `(len << 1) | 1`; lengths must stay below 2^28
fn length_header(what: &'static str, len: usize) -> Result<u32, AmfError> {
    if len > (U29_MAX >> 1) as usize {
        return Err(AmfError::LengthOverflow { what, len });
    }
    Ok(((len as u32) << 1) | 1)
}

/// Write an unsigned 29-bit variable-length integer; higher bits are dropped
pub fn write_u29(buf: &mut BytesMut, value: u32) {
    let v = value & U29_MAX;
    if v < 0x80 {
        buf.put_u8(v as u8);
    } else if v < 0x4000 {
        buf.put_u8(((v >> 7) & 0x7F) as u8 | 0x80);
        buf.put_u8((v & 0x7F) as u8);
    } else if v < 0x20_0000 {
        buf.put_u8(((v >> 14) & 0x7F) as u8 | 0x80);
        buf.put_u8(((v >> 7) & 0x7F) as u8 | 0x80);
        buf.put_u8((v & 0x7F) as u8);
    } else {
        buf.put_u8(((v >> 22) & 0x7F) as u8 | 0x80);
        buf.put_u8(((v >> 15) & 0x7F) as u8 | 0x80);
        buf.put_u8(((v >> 8) & 0x7F) as u8 | 0x80);
        buf.put_u8((v & 0xFF) as u8);
    }
}

/// Convenience function to encode a single value in its own reference scope
pub fn encode(value: &Value) -> Result<Bytes, AmfError> {
    let mut encoder = Amf3Encoder::new();
    encoder.encode(value)?;
    Ok(encoder.finish())
}

/// Convenience function to decode a single value in its own reference scope
pub fn decode(data: &[u8]) -> Result<Value, AmfError> {
    let mut decoder = Amf3Decoder::new();
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode(&mut buf)
}
