//! AMF (Action Message Format) implementation
//!
//! AMF is Adobe's binary serialization format used by Flash/Flex remoting to
//! exchange typed values. This module implements both AMF0 (original format)
//! and AMF3 (ActionScript 3.0 format), their shared value model, the
//! per-message reference tables and the class alias registry.
//!
//! AMF3 values are embedded in an AMF0 stream via the avmplus-object marker
//! (0x11).

pub mod amf0;
pub mod amf3;
pub mod reference;
pub mod registry;
pub mod value;

pub use amf0::{Amf0Decoder, Amf0Encoder};
pub use amf3::{Amf3Decoder, Amf3Encoder};
pub use reference::{DecodeTables, EncodeTables, Lookup};
pub use registry::{ClassShape, DecodeWarning, ShapeMismatch, TypeRegistry};
pub use value::{AmfObject, Fields, Traits, Value};
