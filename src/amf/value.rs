//! AMF value types
//!
//! AMF0 and AMF3 share one value representation. Objects carry their traits
//! (class alias, sealed member names, dynamic flag) so a decoded typed object
//! can be written back with the same shape.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// Smallest value representable by the AMF3 29-bit integer type
pub const INTEGER_MIN: i32 = -(1 << 28);

/// Largest value representable by the AMF3 29-bit integer type
pub const INTEGER_MAX: i32 = (1 << 28) - 1;

/// Ordered name/value mapping. Insertion order is wire order.
pub type Fields = IndexMap<String, Value>;

/// Unified AMF value representation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value (AMF0: 0x05, AMF3: 0x01)
    Null,

    /// Undefined value (AMF0: 0x06, AMF3: 0x00)
    Undefined,

    /// Boolean value (AMF0: 0x01, AMF3: 0x02/0x03)
    Boolean(bool),

    /// IEEE 754 double-precision floating point (AMF0: 0x00, AMF3: 0x05)
    Number(f64),

    /// Integer (AMF3 only: 0x04, 29-bit signed)
    Integer(i32),

    /// UTF-8 string (AMF0: 0x02/0x0C, AMF3: 0x06)
    String(String),

    /// Date as milliseconds since the Unix epoch
    /// (AMF0: 0x0B, AMF3: 0x08). Only AMF0 carries a timezone offset.
    Date { millis: f64, timezone: i16 },

    /// Raw byte array (AMF3 only: 0x0C)
    ByteArray(Vec<u8>),

    /// XML document text (AMF0: 0x0F, AMF3: 0x07/0x0B)
    Xml(String),

    /// Dense, index-ordered array (AMF0: 0x0A, AMF3: 0x09 without named part)
    Array(Vec<Value>),

    /// Associative array (AMF0: 0x08 ECMA array, AMF3: 0x09 with named part)
    AssociativeArray(Fields),

    /// Anonymous or typed object (AMF0: 0x03/0x10, AMF3: 0x0A)
    Object(Arc<AmfObject>),
}

/// Type descriptor of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Traits {
    /// Class alias; `None` for anonymous objects
    pub class_name: Option<String>,
    /// Sealed member names, in wire order
    pub members: Vec<String>,
    /// Whether the object may carry fields beyond `members`
    pub dynamic: bool,
}

impl Traits {
    /// Traits of an anonymous dynamic object (`{}` in ActionScript)
    pub fn anonymous() -> Self {
        Self {
            class_name: None,
            members: Vec::new(),
            dynamic: true,
        }
    }

    /// Traits of a sealed, typed object
    pub fn sealed<I, S>(class_name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class_name: Some(class_name.into()),
            members: members.into_iter().map(Into::into).collect(),
            dynamic: false,
        }
    }

    /// Whether this describes an anonymous object
    pub fn is_anonymous(&self) -> bool {
        self.class_name.as_deref().map_or(true, str::is_empty)
    }
}

/// An object instance: traits plus sealed and dynamic fields
///
/// `static_fields` holds exactly one entry per name in `traits.members`,
/// in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct AmfObject {
    pub traits: Arc<Traits>,
    pub static_fields: Fields,
    pub dynamic_fields: Fields,
}

impl AmfObject {
    /// Anonymous dynamic object holding `fields`
    pub fn anonymous(fields: Fields) -> Self {
        Self {
            traits: Arc::new(Traits::anonymous()),
            static_fields: Fields::new(),
            dynamic_fields: fields,
        }
    }

    /// Sealed typed object; every field becomes a declared member
    pub fn typed(class_name: impl Into<String>, fields: Fields) -> Self {
        let traits = Traits::sealed(class_name, fields.keys().cloned());
        Self {
            traits: Arc::new(traits),
            static_fields: fields,
            dynamic_fields: Fields::new(),
        }
    }

    /// Class alias, if the object is typed
    pub fn class_name(&self) -> Option<&str> {
        self.traits.class_name.as_deref().filter(|s| !s.is_empty())
    }

    /// Look up a field, sealed members first
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.static_fields
            .get(name)
            .or_else(|| self.dynamic_fields.get(name))
    }

    /// All fields in wire order: sealed members, then dynamic ones
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.static_fields.iter().chain(self.dynamic_fields.iter())
    }

    /// Number of fields, sealed and dynamic
    pub fn len(&self) -> usize {
        self.static_fields.len() + self.dynamic_fields.len()
    }

    /// Check if the object has no fields at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Value {
    /// Wrap an object
    pub fn object(obj: AmfObject) -> Self {
        Value::Object(Arc::new(obj))
    }

    /// Date with a zero timezone offset
    pub fn date(millis: f64) -> Self {
        Value::Date { millis, timezone: 0 }
    }

    /// Byte array value
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::ByteArray(data.into())
    }

    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an object
    pub fn as_object(&self) -> Option<&AmfObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Try to get this value as an array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Get a property from an object or associative array
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(o) => o.get(key),
            Value::AssociativeArray(m) => m.get(key),
            _ => None,
        }
    }

    /// Get a string property from an object value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Get a number property from an object value
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_number()
    }

    /// Number of values a `clone` allocates; objects are shared and count once
    pub fn copy_weight(&self) -> usize {
        match self {
            Value::Array(items) => 1 + items.iter().map(Value::copy_weight).sum::<usize>(),
            Value::AssociativeArray(fields) => {
                1 + fields.values().map(Value::copy_weight).sum::<usize>()
            }
            _ => 1,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// Plain-text rendering, used when flattening responses for display.
/// Null and undefined render as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Undefined => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Integer(i) => write!(f, "{}", i),
            Value::String(s) | Value::Xml(s) => f.write_str(s),
            Value::Date { millis, .. } => write!(f, "{}", millis),
            Value::ByteArray(data) => {
                for b in data {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::AssociativeArray(fields) => write_fields(f, fields.iter()),
            Value::Object(obj) => write_fields(f, obj.fields()),
        }
    }
}

fn write_fields<'a>(
    f: &mut fmt::Formatter<'_>,
    fields: impl Iterator<Item = (&'a String, &'a Value)>,
) -> fmt::Result {
    f.write_str("{")?;
    for (i, (k, v)) in fields.enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}:{}", k, v)?;
    }
    f.write_str("}")
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        if (INTEGER_MIN..=INTEGER_MAX).contains(&v) {
            Value::Integer(v)
        } else {
            Value::Number(v as f64)
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        if (INTEGER_MIN as i64..=INTEGER_MAX as i64).contains(&v) {
            Value::Integer(v as i32)
        } else {
            Value::Number(v as f64)
        }
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::from(v as i64)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<AmfObject> for Value {
    fn from(v: AmfObject) -> Self {
        Value::object(v)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(v: Vec<V>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(v: Option<V>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
