//! Flatten reply bodies into string maps
//!
//! Works on replies whose body is an object carrying a `body` array of
//! one-level objects (every member a plain value). Each element becomes an
//! ordered `name -> text` map rendered with `Value`'s `Display`.
//!
//! A message of the wrong shape fails the whole conversion. An array element
//! that is not an object is skipped and reported in [`FlatResponse::skipped`].

use indexmap::IndexMap;

use crate::amf::Value;
use crate::error::{RemotingError, Result};

use super::bundle::MessageBundle;

/// One flattened array element
pub type FlatRecord = IndexMap<String, String>;

/// Element left out of a flattened response
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedElement {
    /// Position of the message in the bundle
    pub message: usize,
    /// Position of the element in the message's `body` array
    pub element: usize,
    pub value: Value,
}

/// Flattened reply bundle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatResponse {
    /// Records per message, in bundle order
    pub messages: Vec<Vec<FlatRecord>>,
    pub skipped: Vec<SkippedElement>,
}

impl FlatResponse {
    /// Total number of records over all messages
    pub fn record_count(&self) -> usize {
        self.messages.iter().map(Vec::len).sum()
    }
}

/// Flatten every message of a decoded reply bundle
pub fn flatten_response(bundle: &MessageBundle) -> Result<FlatResponse> {
    let mut response = FlatResponse::default();

    for (index, message) in bundle.messages.iter().enumerate() {
        if message.body.as_object().is_none() {
            return Err(RemotingError::UnexpectedBody {
                index,
                reason: "body is not an object",
            }
            .into());
        }
        let elements = message
            .body
            .get("body")
            .and_then(Value::as_array)
            .ok_or(RemotingError::UnexpectedBody {
                index,
                reason: "body field is not an array",
            })?;

        let mut records = Vec::with_capacity(elements.len());
        for (element, value) in elements.iter().enumerate() {
            match flatten_element(value) {
                Some(record) => records.push(record),
                None => {
                    tracing::warn!(
                        message_index = index,
                        element = element,
                        value = %value,
                        "Skipping response element that is not an object"
                    );
                    response.skipped.push(SkippedElement {
                        message: index,
                        element,
                        value: value.clone(),
                    });
                }
            }
        }
        response.messages.push(records);
    }

    Ok(response)
}

/// Render one element's members as text
pub fn flatten_element(value: &Value) -> Option<FlatRecord> {
    match value {
        Value::Object(obj) => Some(
            obj.fields()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        ),
        Value::AssociativeArray(fields) => Some(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::{AmfObject, Fields};
    use crate::remoting::bundle::AmfMessage;
    use crate::remoting::message::AcknowledgeMessage;

    fn record(pairs: &[(&str, Value)]) -> Value {
        let fields: Fields = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Value::object(AmfObject::anonymous(fields))
    }

    fn reply(elements: Vec<Value>) -> AmfMessage {
        let ack = AcknowledgeMessage {
            body: Value::Array(elements),
            ..Default::default()
        };
        AmfMessage::new("/1", "", ack.to_value())
    }

    #[test]
    fn test_flatten_records() {
        let bundle = MessageBundle::new(vec![
            reply(vec![
                record(&[
                    ("CITYCODE", Value::from("411729")),
                    ("AQI", Value::Integer(42)),
                    ("NOTE", Value::Null),
                ]),
                record(&[("CITYCODE", Value::from("411700")), ("PM25", Value::Number(3.5))]),
            ]),
            reply(vec![]),
        ]);

        let flat = flatten_response(&bundle).unwrap();
        assert_eq!(flat.messages.len(), 2);
        assert_eq!(flat.record_count(), 2);
        assert!(flat.skipped.is_empty());

        let first = &flat.messages[0][0];
        assert_eq!(
            first.keys().collect::<Vec<_>>(),
            vec!["CITYCODE", "AQI", "NOTE"]
        );
        assert_eq!(first["AQI"], "42");
        assert_eq!(first["NOTE"], "");
        assert_eq!(flat.messages[0][1]["PM25"], "3.5");
        assert!(flat.messages[1].is_empty());
    }

    #[test]
    fn test_non_object_elements_skipped() {
        let bundle = MessageBundle::new(vec![reply(vec![
            Value::from("stray"),
            record(&[("A", Value::Boolean(true))]),
            Value::Integer(7),
        ])]);

        let flat = flatten_response(&bundle).unwrap();
        assert_eq!(flat.messages[0].len(), 1);
        assert_eq!(flat.messages[0][0]["A"], "true");
        assert_eq!(flat.skipped.len(), 2);
        assert_eq!(flat.skipped[0].element, 0);
        assert_eq!(flat.skipped[1].element, 2);
        assert_eq!(flat.skipped[1].value, Value::Integer(7));
    }

    #[test]
    fn test_wrong_message_shape_aborts() {
        let bundle = MessageBundle::new(vec![
            reply(vec![]),
            AmfMessage::new("/2", "", Value::from("fault")),
        ]);
        let err = flatten_response(&bundle).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Remoting(RemotingError::UnexpectedBody { index: 1, .. })
        ));

        let ack = AcknowledgeMessage {
            body: Value::from("not a list"),
            ..Default::default()
        };
        let bundle = MessageBundle::new(vec![AmfMessage::new("/1", "", ack.to_value())]);
        let err = flatten_response(&bundle).unwrap_err();
        assert!(err.to_string().contains("not an array"));
    }
}
