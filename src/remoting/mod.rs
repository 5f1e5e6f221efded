//! AMF remoting envelope
//!
//! Request bundles are built with [`request`] and encoded with
//! [`encode_request_bundle`]; replies are read back with
//! [`decode_any_bundle`].

pub mod bundle;
pub mod constants;
pub mod flatten;
pub mod message;
pub mod request;

pub use bundle::{
    decode_any_bundle, encode_request_bundle, AmfMessage, BundleDecoder, Header, MessageBundle,
    ResponseStatus,
};
pub use flatten::{flatten_response, FlatRecord, FlatResponse, SkippedElement};
pub use message::{AcknowledgeMessage, ErrorMessage, RemotingMessage};
pub use request::{
    build_batch, build_request, new_request, new_request_with_version, EncodedRequest,
    IdGenerator, RemotingRequest, UuidIds,
};
