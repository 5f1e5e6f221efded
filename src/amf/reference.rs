//! Reference tables
//!
//! AMF3 avoids re-sending strings, objects and traits it has already written
//! by replacing repeats with an index into one of three append-only tables.
//! AMF0 keeps a single table of complex values for its 0x07 reference marker.
//!
//! Tables are scoped to one message body. Both sides must add entries in
//! exactly the same order, so the encoder registers every complex value
//! (arrays, dates, byte arrays, XML) even though it only ever emits
//! references for objects.
//!
//! ```text
//!  decode                                   encode
//!  ┌──────────────┐                         ┌──────────────────────┐
//!  │ strings: Vec │ <─ index ── header ──── │ strings: str -> idx  │
//!  │ objects: Vec │ <─ index ── header ──── │ objects: Arc -> idx  │
//!  │ traits:  Vec │ <─ index ── header ──── │ traits:  Traits->idx │
//!  └──────────────┘                         └──────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AmfError, TableKind};

use super::value::{AmfObject, Traits, Value};

/// Result of interning a candidate on the encode side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Already in the table: write a by-reference header with this index
    Reference(usize),
    /// Newly registered at this index: write the full value
    New(usize),
}

/// Default cap on values copied out of the table by references
///
/// Arrays are owned trees, so every reference to one copies it. Objects are
/// shared and cost one value per reference.
pub const MAX_REFERENCE_EXPANSION: usize = 1 << 20;

/// Complex-value table with slots reserved before their members are decoded
///
/// A slot is empty while its value is under construction; resolving it then
/// would need a cyclic value, which the tree-shaped `Value` cannot hold.
#[derive(Debug)]
pub struct ObjectTable {
    /// Finished values with the number of values a copy allocates
    slots: Vec<Option<(Value, usize)>>,
    /// Values copied by references since the last `clear`
    expanded: usize,
    limit: usize,
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            expanded: 0,
            limit: MAX_REFERENCE_EXPANSION,
        }
    }
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with a custom reference expansion cap
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.expanded = 0;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reserve the next index for a value about to be decoded
    pub fn reserve(&mut self) -> usize {
        self.slots.push(None);
        self.slots.len() - 1
    }

    /// Store the finished value in its reserved slot
    pub fn fill(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.slots.get_mut(index) {
            let weight = value.copy_weight();
            *slot = Some((value, weight));
        }
    }

    /// Append a finished value
    pub fn push(&mut self, value: Value) -> usize {
        let weight = value.copy_weight();
        self.slots.push(Some((value, weight)));
        self.slots.len() - 1
    }

    /// Copy out the value at `index`, charging it to the expansion budget
    pub fn resolve(&mut self, index: usize) -> Result<Value, AmfError> {
        match self.slots.get(index) {
            Some(Some((value, weight))) => {
                self.expanded = self.expanded.saturating_add(*weight);
                if self.expanded > self.limit {
                    return Err(AmfError::ReferenceExpansion { limit: self.limit });
                }
                Ok(value.clone())
            }
            Some(None) => Err(AmfError::CyclicReference(index)),
            None => Err(AmfError::InvalidReference {
                table: TableKind::Object,
                index,
            }),
        }
    }
}

/// Decode-side AMF3 reference tables
#[derive(Debug, Default)]
pub struct DecodeTables {
    strings: Vec<String>,
    objects: ObjectTable,
    traits: Vec<Arc<Traits>>,
}

impl DecodeTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all three tables (start of a message body)
    pub fn reset(&mut self) {
        self.strings.clear();
        self.objects.clear();
        self.traits.clear();
    }

    /// Record a by-value string. The empty string is never recorded.
    pub fn add_string(&mut self, s: &str) {
        if !s.is_empty() {
            self.strings.push(s.to_string());
        }
    }

    pub fn string(&self, index: usize) -> Result<String, AmfError> {
        self.strings
            .get(index)
            .cloned()
            .ok_or(AmfError::InvalidReference {
                table: TableKind::String,
                index,
            })
    }

    pub fn objects(&mut self) -> &mut ObjectTable {
        &mut self.objects
    }

    pub fn object(&mut self, index: usize) -> Result<Value, AmfError> {
        self.objects.resolve(index)
    }

    pub fn add_traits(&mut self, traits: Arc<Traits>) {
        self.traits.push(traits);
    }

    pub fn traits(&self, index: usize) -> Result<Arc<Traits>, AmfError> {
        self.traits
            .get(index)
            .cloned()
            .ok_or(AmfError::InvalidReference {
                table: TableKind::Traits,
                index,
            })
    }
}

/// Encode-side AMF3 reference tables
///
/// Strings and traits match by value. Objects match by identity: two
/// `Value::Object`s share an entry only when they hold the same `Arc`.
#[derive(Debug, Default)]
pub struct EncodeTables {
    strings: HashMap<String, usize>,
    objects: HashMap<usize, usize>,
    // Keeps interned objects alive so their addresses stay unique for the scope
    object_owners: Vec<Arc<AmfObject>>,
    object_count: usize,
    traits: HashMap<Traits, usize>,
}

impl EncodeTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all three tables (start of a message body)
    pub fn reset(&mut self) {
        self.strings.clear();
        self.objects.clear();
        self.object_owners.clear();
        self.object_count = 0;
        self.traits.clear();
    }

    /// Intern a string; `None` for the empty string, which is never referenced
    pub fn intern_string(&mut self, s: &str) -> Option<Lookup> {
        if s.is_empty() {
            return None;
        }
        if let Some(&index) = self.strings.get(s) {
            return Some(Lookup::Reference(index));
        }
        let index = self.strings.len();
        self.strings.insert(s.to_string(), index);
        Some(Lookup::New(index))
    }

    /// Intern an object by identity
    pub fn intern_object(&mut self, obj: &Arc<AmfObject>) -> Lookup {
        let key = Arc::as_ptr(obj) as usize;
        if let Some(&index) = self.objects.get(&key) {
            return Lookup::Reference(index);
        }
        let index = self.reserve_object();
        self.objects.insert(key, index);
        self.object_owners.push(Arc::clone(obj));
        Lookup::New(index)
    }

    /// Take an object-table index for a value that is never shared
    /// (array, date, byte array, XML)
    pub fn reserve_object(&mut self) -> usize {
        self.object_count += 1;
        self.object_count - 1
    }

    /// Intern a traits descriptor by shape
    pub fn intern_traits(&mut self, traits: &Traits) -> Lookup {
        if let Some(&index) = self.traits.get(traits) {
            return Lookup::Reference(index);
        }
        let index = self.traits.len();
        self.traits.insert(traits.clone(), index);
        Lookup::New(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::value::Fields;

    #[test]
    fn test_empty_string_never_interned() {
        let mut tables = EncodeTables::new();
        assert_eq!(tables.intern_string(""), None);
        assert_eq!(tables.intern_string(""), None);
        assert_eq!(tables.intern_string("a"), Some(Lookup::New(0)));
        assert_eq!(tables.intern_string("a"), Some(Lookup::Reference(0)));

        let mut dec = DecodeTables::new();
        dec.add_string("");
        dec.add_string("a");
        assert_eq!(dec.string(0).unwrap(), "a");
    }

    #[test]
    fn test_object_identity() {
        let mut tables = EncodeTables::new();
        let a = Arc::new(AmfObject::anonymous(Fields::new()));
        let b = Arc::new(AmfObject::anonymous(Fields::new()));

        assert_eq!(tables.intern_object(&a), Lookup::New(0));
        assert_eq!(tables.reserve_object(), 1);
        // Structurally equal, different identity
        assert_eq!(tables.intern_object(&b), Lookup::New(2));
        assert_eq!(tables.intern_object(&a), Lookup::Reference(0));
        assert_eq!(tables.intern_object(&Arc::clone(&b)), Lookup::Reference(2));
    }

    #[test]
    fn test_traits_by_shape() {
        let mut tables = EncodeTables::new();
        let t = Traits::sealed("Foo", ["x"]);
        assert_eq!(tables.intern_traits(&t), Lookup::New(0));
        assert_eq!(tables.intern_traits(&t.clone()), Lookup::Reference(0));
        assert_eq!(tables.intern_traits(&Traits::anonymous()), Lookup::New(1));
    }

    #[test]
    fn test_resolve_out_of_range() {
        let mut tables = DecodeTables::new();
        assert_eq!(
            tables.string(0),
            Err(AmfError::InvalidReference {
                table: TableKind::String,
                index: 0
            })
        );
        assert!(matches!(
            tables.traits(3),
            Err(AmfError::InvalidReference { table: TableKind::Traits, .. })
        ));

        let idx = tables.objects().reserve();
        assert_eq!(tables.object(idx), Err(AmfError::CyclicReference(idx)));
        tables.objects().fill(idx, Value::Null);
        assert_eq!(tables.object(idx), Ok(Value::Null));
        assert!(tables.object(idx + 1).is_err());
    }

    #[test]
    fn test_reference_expansion_budget() {
        let mut table = ObjectTable::with_limit(10);
        let arr = table.push(Value::Array(vec![Value::Null; 4]));

        // Five values per array copy
        assert!(table.resolve(arr).is_ok());
        assert!(table.resolve(arr).is_ok());
        assert_eq!(
            table.resolve(arr),
            Err(AmfError::ReferenceExpansion { limit: 10 })
        );

        table.clear();
        // Objects are shared, one value per reference
        let obj_idx = table.push(Value::object(AmfObject::anonymous(Fields::new())));
        for _ in 0..10 {
            assert!(table.resolve(obj_idx).is_ok());
        }
        assert!(table.resolve(obj_idx).is_err());
    }

    #[test]
    fn test_reset() {
        let mut tables = EncodeTables::new();
        tables.intern_string("x");
        tables.reserve_object();
        tables.intern_traits(&Traits::anonymous());
        tables.reset();
        assert_eq!(tables.intern_string("x"), Some(Lookup::New(0)));
        assert_eq!(tables.reserve_object(), 0);
        assert_eq!(tables.intern_traits(&Traits::anonymous()), Lookup::New(0));
    }
}
