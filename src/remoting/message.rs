//! Flex messaging shapes
//!
//! Typed views over the `flex.messaging.messages.*` objects exchanged with
//! a BlazeDS/LCDS style backend. Requests carry a `RemotingMessage`; the
//! server answers with an `AcknowledgeMessage` on `/onResult` or an
//! `ErrorMessage` on `/onStatus`.

use crate::amf::{AmfObject, ClassShape, Fields, TypeRegistry, Traits, Value};

use super::constants::{HEADER_DS_ENDPOINT, HEADER_DS_ID};

/// Class alias of a remote procedure call
pub const REMOTING_MESSAGE: &str = "flex.messaging.messages.RemotingMessage";

/// Class alias of a successful reply
pub const ACKNOWLEDGE_MESSAGE: &str = "flex.messaging.messages.AcknowledgeMessage";

/// Class alias of a fault reply
pub const ERROR_MESSAGE: &str = "flex.messaging.messages.ErrorMessage";

const REMOTING_MEMBERS: [&str; 9] = [
    "body",
    "clientId",
    "destination",
    "headers",
    "messageId",
    "timestamp",
    "timeToLive",
    "operation",
    "source",
];

const ACKNOWLEDGE_MEMBERS: [&str; 8] = [
    "body",
    "clientId",
    "correlationId",
    "destination",
    "headers",
    "messageId",
    "timestamp",
    "timeToLive",
];

const ERROR_MEMBERS: [&str; 5] = [
    "faultCode",
    "faultString",
    "faultDetail",
    "rootCause",
    "extendedData",
];

impl TypeRegistry {
    /// Registry with the Flex messaging shapes
    ///
    /// Replies are registered as dynamic so server-specific extra members
    /// are kept rather than rejected.
    pub fn flex() -> Self {
        let mut registry = Self::new();
        registry.register(ClassShape::new(REMOTING_MESSAGE, REMOTING_MEMBERS));
        registry.register(ClassShape::new(ACKNOWLEDGE_MESSAGE, ACKNOWLEDGE_MEMBERS).dynamic(true));
        registry.register(
            ClassShape::new(
                ERROR_MESSAGE,
                ACKNOWLEDGE_MEMBERS.iter().chain(ERROR_MEMBERS.iter()).copied(),
            )
            .dynamic(true),
        );
        registry
    }
}

/// Remote procedure call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemotingMessage {
    /// Positional arguments
    pub body: Vec<Value>,
    pub client_id: String,
    pub destination: String,
    pub headers: Fields,
    pub message_id: String,
    pub timestamp: f64,
    pub time_to_live: f64,
    pub operation: String,
    pub source: Option<String>,
}

impl RemotingMessage {
    /// `DSId` header value, if present
    pub fn ds_id(&self) -> Option<&str> {
        self.headers.get(HEADER_DS_ID)?.as_str()
    }

    /// `DSEndpoint` header value, if present
    pub fn ds_endpoint(&self) -> Option<&str> {
        self.headers.get(HEADER_DS_ENDPOINT)?.as_str()
    }

    /// Typed AMF object for this message
    pub fn to_value(&self) -> Value {
        let mut fields = Fields::with_capacity(REMOTING_MEMBERS.len());
        fields.insert("body".into(), Value::Array(self.body.clone()));
        fields.insert("clientId".into(), Value::from(self.client_id.as_str()));
        fields.insert("destination".into(), Value::from(self.destination.as_str()));
        fields.insert(
            "headers".into(),
            Value::object(AmfObject::anonymous(self.headers.clone())),
        );
        fields.insert("messageId".into(), Value::from(self.message_id.as_str()));
        fields.insert("timestamp".into(), Value::Number(self.timestamp));
        fields.insert("timeToLive".into(), Value::Number(self.time_to_live));
        fields.insert("operation".into(), Value::from(self.operation.as_str()));
        fields.insert("source".into(), Value::from(self.source.clone()));
        Value::object(AmfObject::typed(REMOTING_MESSAGE, fields))
    }

    /// Read a decoded `RemotingMessage` object; missing fields take defaults
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = typed_object(value, REMOTING_MESSAGE)?;
        Some(Self {
            body: obj
                .get("body")
                .and_then(Value::as_array)
                .map(<[Value]>::to_vec)
                .unwrap_or_default(),
            client_id: string_field(obj, "clientId"),
            destination: string_field(obj, "destination"),
            headers: fields_of(obj.get("headers")),
            message_id: string_field(obj, "messageId"),
            timestamp: number_field(obj, "timestamp"),
            time_to_live: number_field(obj, "timeToLive"),
            operation: string_field(obj, "operation"),
            source: obj.get("source").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// Successful reply
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AcknowledgeMessage {
    /// Return value of the call
    pub body: Value,
    pub client_id: String,
    /// `messageId` of the request this answers
    pub correlation_id: String,
    pub destination: String,
    pub headers: Fields,
    pub message_id: String,
    pub timestamp: f64,
    pub time_to_live: f64,
}

impl AcknowledgeMessage {
    fn fields(&self) -> Fields {
        let mut fields = Fields::with_capacity(ACKNOWLEDGE_MEMBERS.len());
        fields.insert("body".into(), self.body.clone());
        fields.insert("clientId".into(), Value::from(self.client_id.as_str()));
        fields.insert(
            "correlationId".into(),
            Value::from(self.correlation_id.as_str()),
        );
        fields.insert("destination".into(), Value::from(self.destination.as_str()));
        fields.insert(
            "headers".into(),
            Value::object(AmfObject::anonymous(self.headers.clone())),
        );
        fields.insert("messageId".into(), Value::from(self.message_id.as_str()));
        fields.insert("timestamp".into(), Value::Number(self.timestamp));
        fields.insert("timeToLive".into(), Value::Number(self.time_to_live));
        fields
    }

    fn read(obj: &AmfObject) -> Self {
        Self {
            body: obj.get("body").cloned().unwrap_or_default(),
            client_id: string_field(obj, "clientId"),
            correlation_id: string_field(obj, "correlationId"),
            destination: string_field(obj, "destination"),
            headers: fields_of(obj.get("headers")),
            message_id: string_field(obj, "messageId"),
            timestamp: number_field(obj, "timestamp"),
            time_to_live: number_field(obj, "timeToLive"),
        }
    }

    /// Typed AMF object for this message
    pub fn to_value(&self) -> Value {
        dynamic_typed(ACKNOWLEDGE_MESSAGE, self.fields())
    }

    /// Read a decoded `AcknowledgeMessage` object
    pub fn from_value(value: &Value) -> Option<Self> {
        typed_object(value, ACKNOWLEDGE_MESSAGE).map(Self::read)
    }
}

/// Fault reply
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorMessage {
    pub acknowledge: AcknowledgeMessage,
    pub fault_code: String,
    pub fault_string: String,
    pub fault_detail: String,
    pub root_cause: Value,
    pub extended_data: Value,
}

impl ErrorMessage {
    /// Typed AMF object for this message
    pub fn to_value(&self) -> Value {
        let mut fields = self.acknowledge.fields();
        fields.insert("faultCode".into(), Value::from(self.fault_code.as_str()));
        fields.insert("faultString".into(), Value::from(self.fault_string.as_str()));
        fields.insert("faultDetail".into(), Value::from(self.fault_detail.as_str()));
        fields.insert("rootCause".into(), self.root_cause.clone());
        fields.insert("extendedData".into(), self.extended_data.clone());
        dynamic_typed(ERROR_MESSAGE, fields)
    }

    /// Read a decoded `ErrorMessage` object
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = typed_object(value, ERROR_MESSAGE)?;
        Some(Self {
            acknowledge: AcknowledgeMessage::read(obj),
            fault_code: string_field(obj, "faultCode"),
            fault_string: string_field(obj, "faultString"),
            fault_detail: string_field(obj, "faultDetail"),
            root_cause: obj.get("rootCause").cloned().unwrap_or_default(),
            extended_data: obj.get("extendedData").cloned().unwrap_or_default(),
        })
    }
}

fn typed_object<'a>(value: &'a Value, alias: &str) -> Option<&'a AmfObject> {
    value.as_object().filter(|obj| obj.class_name() == Some(alias))
}

fn dynamic_typed(alias: &str, fields: Fields) -> Value {
    let traits = Traits {
        class_name: Some(alias.to_string()),
        members: fields.keys().cloned().collect(),
        dynamic: true,
    };
    Value::object(AmfObject {
        traits: traits.into(),
        static_fields: fields,
        dynamic_fields: Fields::new(),
    })
}

/// String field; null, undefined and non-strings read as empty
fn string_field(obj: &AmfObject, name: &str) -> String {
    obj.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn number_field(obj: &AmfObject, name: &str) -> f64 {
    obj.get(name).and_then(Value::as_number).unwrap_or(0.0)
}

fn fields_of(value: Option<&Value>) -> Fields {
    match value {
        Some(Value::Object(obj)) => obj.fields().map(|(k, v)| (k.clone(), v.clone())).collect(),
        Some(Value::AssociativeArray(fields)) => fields.clone(),
        _ => Fields::new(),
    }
}
