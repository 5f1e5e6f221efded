//! amf-remoting: AMF0/AMF3 codec and Flash remoting envelopes
//!
//! This library provides:
//! - A value model covering every AMF0 and AMF3 type in use
//! - Decoders and encoders with reference tables and sticky AMF3 switching
//! - A registry mapping class aliases to native object shapes
//! - Request/response message bundles for remoting gateways
//! - An async client over a pluggable transport
//!
//! # Example: Build a request
//!
//! ```no_run
//! use std::sync::Arc;
//! use amf_remoting::remoting::{decode_any_bundle, new_request, RemotingRequest, UuidIds};
//! use amf_remoting::{TypeRegistry, Value};
//!
//! let request = RemotingRequest::new("find24HourAqiInfoByCode", "dataPubService")
//!     .args(vec![Value::from("411729"), Value::from("01")]);
//! let encoded = new_request(&[request], &UuidIds)?;
//!
//! // ... post encoded.body with encoded.content_type, then:
//! let reply: Vec<u8> = Vec::new();
//! let bundle = decode_any_bundle(&reply, Arc::new(TypeRegistry::flex()))?;
//! for message in &bundle.messages {
//!     println!("{} -> {}", message.target_uri, message.body);
//! }
//! # Ok::<(), amf_remoting::Error>(())
//! ```

pub mod amf;
pub mod client;
pub mod error;
pub mod remoting;

// Re-export main types for convenience
pub use amf::{AmfObject, ClassShape, DecodeWarning, Traits, TypeRegistry, Value};
pub use client::{ClientConfig, RemotingClient, Transport};
pub use error::{AmfError, Error, RemotingError, Result};
pub use remoting::{
    build_request, decode_any_bundle, encode_request_bundle, flatten_response, AmfMessage,
    MessageBundle, RemotingRequest,
};
