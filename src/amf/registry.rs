//! Class alias registry
//!
//! Maps a class alias (`flex.messaging.messages.RemotingMessage`) to the
//! shape a typed object with that alias is expected to have. The decoder
//! consults it for every typed object: a registered shape fixes the sealed
//! member order and the dynamic flag, an unregistered alias leaves the object
//! as decoded.
//!
//! The registry is populated during startup and then shared read-only
//! (usually behind an `Arc`) by every decoder.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::value::{AmfObject, Fields, Traits};

/// Native shape registered for a class alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassShape {
    pub alias: String,
    /// Declared members, in the order they are materialized
    pub members: Vec<String>,
    /// Whether fields beyond `members` are accepted
    pub dynamic: bool,
}

impl ClassShape {
    /// Sealed shape with the given members
    pub fn new<I, S>(alias: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alias: alias.into(),
            members: members.into_iter().map(Into::into).collect(),
            dynamic: false,
        }
    }

    /// Accept extra fields as dynamic members
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// Traits describing objects of this shape
    pub fn traits(&self) -> Traits {
        Traits {
            class_name: Some(self.alias.clone()),
            members: self.members.clone(),
            dynamic: self.dynamic,
        }
    }
}

/// A typed object whose fields do not fit its registered shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub alias: String,
    /// Declared members the object did not carry
    pub missing: Vec<String>,
    /// Fields the object carried that a sealed shape does not declare
    pub unexpected: Vec<String>,
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} does not match its registered shape (missing: {:?}, unexpected: {:?})",
            self.alias, self.missing, self.unexpected
        )
    }
}

/// Non-fatal condition noticed while decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// Legacy marker decoded to a placeholder
    UnsupportedType { marker: u8, name: &'static str },
    /// Typed object kept its generic representation
    ShapeMismatch(ShapeMismatch),
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::UnsupportedType { marker, name } => {
                write!(f, "Unsupported AMF type {} (0x{:02x})", name, marker)
            }
            DecodeWarning::ShapeMismatch(m) => write!(f, "Shape mismatch: {}", m),
        }
    }
}

/// Alias-to-shape registry
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    shapes: HashMap<String, Arc<ClassShape>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shape under its alias. The last registration wins.
    pub fn register(&mut self, shape: ClassShape) {
        tracing::debug!(alias = %shape.alias, members = shape.members.len(), "Registered class shape");
        self.shapes.insert(shape.alias.clone(), Arc::new(shape));
    }

    /// Look up the shape registered for `alias`
    pub fn lookup(&self, alias: &str) -> Option<Arc<ClassShape>> {
        self.shapes.get(alias).cloned()
    }

    /// Number of registered aliases
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Map a decoded object onto its registered shape
    ///
    /// Anonymous objects and unregistered aliases come back untouched. On a
    /// mismatch the original object is returned together with the reason.
    pub fn materialize(&self, obj: AmfObject) -> (AmfObject, Option<ShapeMismatch>) {
        let shape = match obj.class_name().and_then(|alias| self.lookup(alias)) {
            Some(shape) => shape,
            None => return (obj, None),
        };

        let missing: Vec<String> = shape
            .members
            .iter()
            .filter(|m| obj.get(m).is_none())
            .cloned()
            .collect();
        let unexpected: Vec<String> = if shape.dynamic {
            Vec::new()
        } else {
            obj.fields()
                .map(|(k, _)| k)
                .filter(|k| !shape.members.contains(k))
                .cloned()
                .collect()
        };

        if !missing.is_empty() || !unexpected.is_empty() {
            let mismatch = ShapeMismatch {
                alias: shape.alias.clone(),
                missing,
                unexpected,
            };
            return (obj, Some(mismatch));
        }

        let mut remaining: Fields = obj
            .static_fields
            .into_iter()
            .chain(obj.dynamic_fields)
            .collect();
        let mut static_fields = Fields::with_capacity(shape.members.len());
        for member in &shape.members {
            if let Some(value) = remaining.shift_remove(member) {
                static_fields.insert(member.clone(), value);
            }
        }

        let shaped = AmfObject {
            traits: Arc::new(shape.traits()),
            static_fields,
            dynamic_fields: remaining,
        };
        (shaped, None)
    }
}
