//! Outgoing call requests
//!
//! Builds `RemotingMessage` envelopes for one call or a batch of calls and
//! encodes them into a request body ready for the transport.
//!
//! ```no_run
//! use amf_remoting::remoting::request::{new_request, RemotingRequest, UuidIds};
//! use amf_remoting::Value;
//!
//! let requests = vec![
//!     RemotingRequest::new("getAreaDayReportData", "GisCommonDataUtil"),
//!     RemotingRequest::new("find24HourAqiInfoByCode", "dataPubService")
//!         .args(vec![Value::from("411729"), Value::from("01")]),
//! ];
//! let encoded = new_request(&requests, &UuidIds).unwrap();
//! assert_eq!(encoded.content_type, "application/x-amf");
//! ```

use bytes::Bytes;
use uuid::Uuid;

use crate::amf::{Fields, Value};
use crate::error::{RemotingError, Result};

use super::bundle::{encode_request_bundle, AmfMessage, MessageBundle};
use super::constants::*;
use super::message::RemotingMessage;

/// Source of message and client identifiers
pub trait IdGenerator: Send + Sync {
    /// A globally unique, uppercase identifier
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs, uppercase and hyphenated
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().hyphenated().to_string().to_uppercase()
    }
}

/// One remote call
#[derive(Debug, Clone, PartialEq)]
pub struct RemotingRequest {
    pub operation: String,
    pub destination: String,
    pub args: Vec<Value>,
    pub target_uri: Option<String>,
    pub response_uri: Option<String>,
    pub endpoint: Option<String>,
}

impl RemotingRequest {
    /// Call `operation` on `destination` with no arguments
    pub fn new(operation: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            destination: destination.into(),
            args: Vec::new(),
            target_uri: None,
            response_uri: None,
            endpoint: None,
        }
    }

    /// Set the positional arguments
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Append one positional argument
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Override the target URI (default `"null"`)
    pub fn target_uri(mut self, uri: impl Into<String>) -> Self {
        self.target_uri = Some(uri.into());
        self
    }

    /// Override the response URI (default `"/<index>"`)
    pub fn response_uri(mut self, uri: impl Into<String>) -> Self {
        self.response_uri = Some(uri.into());
        self
    }

    /// Set the `DSEndpoint` header (default empty)
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Parse an argument group:
    /// `[operation, destination, args?, target-uri?, response-uri?, endpoint?]`
    pub fn from_group(group: &[Value]) -> Result<Self> {
        if group.len() < 2 {
            return Err(RemotingError::InvalidArgument(
                "need at least 2 arguments: operation, destination".into(),
            )
            .into());
        }

        let mut request = Self::new(group_string(group, 0)?, group_string(group, 1)?);
        if let Some(args) = group.get(2) {
            let args = args.as_array().ok_or_else(|| {
                RemotingError::InvalidArgument("arguments should be an array".into())
            })?;
            request.args = args.to_vec();
        }
        if group.len() > 3 {
            request.target_uri = Some(group_string(group, 3)?);
        }
        if group.len() > 4 {
            request.response_uri = Some(group_string(group, 4)?);
        }
        if group.len() > 5 {
            request.endpoint = Some(group_string(group, 5)?);
        }
        Ok(request)
    }

    /// Build the message for position `index` (1-based) in its bundle
    pub fn build(&self, index: usize, ids: &dyn IdGenerator) -> AmfMessage {
        let mut headers = Fields::new();
        headers.insert(HEADER_DS_ID.into(), Value::String(ids.next_id()));
        headers.insert(
            HEADER_DS_ENDPOINT.into(),
            Value::String(self.endpoint.clone().unwrap_or_default()),
        );

        let message = RemotingMessage {
            body: self.args.clone(),
            client_id: ids.next_id(),
            destination: self.destination.clone(),
            headers,
            message_id: ids.next_id(),
            operation: self.operation.clone(),
            ..Default::default()
        };

        AmfMessage::new(
            self.target_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_TARGET_URI.to_string()),
            self.response_uri
                .clone()
                .unwrap_or_else(|| format!("/{}", index)),
            message.to_value(),
        )
    }
}

fn group_string(group: &[Value], index: usize) -> Result<String> {
    group[index]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            RemotingError::InvalidArgument(format!("argument {} should be a string", index)).into()
        })
}

/// Build a single call with default URIs and endpoint
pub fn build_request(operation: &str, destination: &str) -> AmfMessage {
    RemotingRequest::new(operation, destination).build(1, &UuidIds)
}

/// Build one message per request, numbering response URIs `/1`, `/2`, ...
pub fn build_batch(requests: &[RemotingRequest], ids: &dyn IdGenerator) -> Vec<AmfMessage> {
    requests
        .iter()
        .enumerate()
        .map(|(i, request)| request.build(i + 1, ids))
        .collect()
}

/// Encoded request body and its content type
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub body: Bytes,
    pub content_type: &'static str,
}

/// Build and encode a request bundle for `requests`
pub fn new_request(requests: &[RemotingRequest], ids: &dyn IdGenerator) -> Result<EncodedRequest> {
    new_request_with_version(requests, ids, DEFAULT_AMF_VERSION)
}

/// Build and encode a request bundle with an explicit envelope version
pub fn new_request_with_version(
    requests: &[RemotingRequest],
    ids: &dyn IdGenerator,
    version: u16,
) -> Result<EncodedRequest> {
    if requests.is_empty() {
        return Err(RemotingError::EmptyRequest.into());
    }

    let mut bundle = MessageBundle::new(build_batch(requests, ids));
    bundle.version = version;

    Ok(EncodedRequest {
        body: encode_request_bundle(&bundle)?,
        content_type: CONTENT_TYPE,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic ids: ID-0, ID-1, ...
    #[derive(Default)]
    pub(crate) struct SequenceIds(AtomicUsize);

    impl IdGenerator for SequenceIds {
        fn next_id(&self) -> String {
            format!("ID-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[test]
    fn test_uuid_ids_uppercase() {
        let id = UuidIds.next_id();
        assert_eq!(id.len(), 36);
        assert_eq!(id, id.to_uppercase());
        assert_ne!(id, UuidIds.next_id());
    }

    #[test]
    fn test_build_request_defaults() {
        let message = build_request("getX", "DestA");
        assert_eq!(message.target_uri, "null");
        assert_eq!(message.response_uri, "/1");

        let body = RemotingMessage::from_value(&message.body).unwrap();
        assert_eq!(body.operation, "getX");
        assert_eq!(body.destination, "DestA");
        assert!(body.body.is_empty());
        assert_eq!(body.ds_endpoint(), Some(""));
        assert_ne!(body.message_id, body.client_id);
    }

    #[test]
    fn test_build_with_overrides() {
        let ids = SequenceIds::default();
        let message = RemotingRequest::new("op", "dest")
            .arg("a")
            .arg(2)
            .target_uri("svc")
            .response_uri("/9")
            .endpoint("my-amf")
            .build(1, &ids);

        assert_eq!(message.target_uri, "svc");
        assert_eq!(message.response_uri, "/9");
        let body = RemotingMessage::from_value(&message.body).unwrap();
        assert_eq!(body.body, vec![Value::from("a"), Value::Integer(2)]);
        assert_eq!(body.ds_id(), Some("ID-0"));
        assert_eq!(body.client_id, "ID-1");
        assert_eq!(body.message_id, "ID-2");
        assert_eq!(body.ds_endpoint(), Some("my-amf"));
    }

    #[test]
    fn test_batch_numbering() {
        let ids = SequenceIds::default();
        let messages = build_batch(
            &[
                RemotingRequest::new("opA", "Dest1"),
                RemotingRequest::new("opB", "Dest2"),
                RemotingRequest::new("opC", "Dest3").response_uri("/custom"),
            ],
            &ids,
        );
        let uris: Vec<_> = messages.iter().map(|m| m.response_uri.as_str()).collect();
        assert_eq!(uris, vec!["/1", "/2", "/custom"]);
    }

    #[test]
    fn test_from_group() {
        let group = vec![
            Value::from("find24HourAqiInfoByCode"),
            Value::from("dataPubService"),
            Value::from(vec![Value::from("411729"), Value::from("01")]),
        ];
        let request = RemotingRequest::from_group(&group).unwrap();
        assert_eq!(request.operation, "find24HourAqiInfoByCode");
        assert_eq!(request.args.len(), 2);
        assert_eq!(request.target_uri, None);

        let err = RemotingRequest::from_group(&[Value::from("only")]).unwrap_err();
        assert!(err.to_string().contains("at least 2"));

        let err = RemotingRequest::from_group(&[Value::from("op"), Value::Integer(1)]).unwrap_err();
        assert!(err.to_string().contains("argument 1"));

        let err = RemotingRequest::from_group(&[
            Value::from("op"),
            Value::from("dest"),
            Value::from("not an array"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_new_request() {
        let encoded = new_request(&[RemotingRequest::new("getX", "DestA")], &UuidIds).unwrap();
        assert_eq!(encoded.content_type, CONTENT_TYPE);
        assert_eq!(&encoded.body[..6], &[0, 3, 0, 0, 0, 1]);

        let err = new_request(&[], &UuidIds).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Remoting(RemotingError::EmptyRequest)
        ));
    }
}
