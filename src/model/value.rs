//! Core value types for FHIRPath expressions

use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::resource::FhirResource;

/// Core value type for FHIRPath expressions
///
/// All values in FHIRPath are conceptually collections, but single values are
/// represented directly and `Empty` stands for the empty collection.
#[derive(Clone, PartialEq)]
pub enum FhirPathValue {
    /// Boolean value
    Boolean(bool),

    /// Integer value (64-bit signed)
    Integer(i64),

    /// Decimal value with arbitrary precision
    Decimal(Decimal),

    /// String value (FHIR dates and codes are carried as strings)
    String(String),

    /// FHIR resource or complex element
    Resource(FhirResource),

    /// Collection of values
    Collection(Collection),

    /// Empty value (equivalent to an empty collection)
    Empty,
}

/// Collection type that wraps a vector of values
#[derive(Clone, PartialEq, Default)]
pub struct Collection(Vec<FhirPathValue>);

impl Collection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a collection from a vector
    pub fn from_vec(values: Vec<FhirPathValue>) -> Self {
        Self(values)
    }

    /// Get the length of the collection
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get an iterator over the values
    pub fn iter(&self) -> std::slice::Iter<'_, FhirPathValue> {
        self.0.iter()
    }

    /// Push a value, flattening nested collections
    pub fn push(&mut self, value: FhirPathValue) {
        match value {
            FhirPathValue::Collection(items) => self.0.extend(items.0),
            FhirPathValue::Empty => {}
            single => self.0.push(single),
        }
    }

    /// Get the first value
    pub fn first(&self) -> Option<&FhirPathValue> {
        self.0.first()
    }

    /// Get the last value
    pub fn last(&self) -> Option<&FhirPathValue> {
        self.0.last()
    }

    /// Take ownership of the inner vector
    pub fn into_vec(self) -> Vec<FhirPathValue> {
        self.0
    }
}

impl From<Vec<FhirPathValue>> for Collection {
    fn from(values: Vec<FhirPathValue>) -> Self {
        Self(values)
    }
}

impl IntoIterator for Collection {
    type Item = FhirPathValue;
    type IntoIter = std::vec::IntoIter<FhirPathValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FhirPathValue {
    /// Build a value from a list, normalising zero items to `Empty` and one
    /// item to the item itself
    pub fn collection(values: Vec<FhirPathValue>) -> Self {
        let mut collection = Collection::new();
        for value in values {
            collection.push(value);
        }
        match collection.len() {
            0 => Self::Empty,
            1 => collection.into_vec().remove(0),
            _ => Self::Collection(collection),
        }
    }

    /// Check if the value is empty (empty collection or Empty variant)
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Collection(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Get the length of a collection, or 1 for single values, 0 for empty
    pub fn len(&self) -> usize {
        match self {
            Self::Collection(items) => items.len(),
            Self::Empty => 0,
            _ => 1,
        }
    }

    /// Borrowing iterator over the items of this value viewed as a collection
    pub fn iter(&self) -> Box<dyn Iterator<Item = &FhirPathValue> + '_> {
        match self {
            Self::Collection(items) => Box::new(items.iter()),
            Self::Empty => Box::new(std::iter::empty()),
            single => Box::new(std::iter::once(single)),
        }
    }

    /// Convert to a collection (wrapping single values)
    pub fn to_collection(self) -> Collection {
        match self {
            Self::Collection(items) => items,
            Self::Empty => Collection::new(),
            single => Collection::from_vec(vec![single]),
        }
    }

    /// Get the first item from a collection, or the value itself if single
    pub fn first(&self) -> Option<&FhirPathValue> {
        match self {
            Self::Collection(items) => items.first(),
            Self::Empty => None,
            single => Some(single),
        }
    }

    /// Get the last item from a collection, or the value itself if single
    pub fn last(&self) -> Option<&FhirPathValue> {
        match self {
            Self::Collection(items) => items.last(),
            Self::Empty => None,
            single => Some(single),
        }
    }

    /// Get the type name for this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::Resource(_) => "Resource",
            Self::Collection(_) => "Collection",
            Self::Empty => "Empty",
        }
    }

    /// Whether this is a primitive (non-resource, non-collection) value
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Boolean(_) | Self::Integer(_) | Self::Decimal(_) | Self::String(_)
        )
    }

    /// Convert back to JSON, e.g. for printing evaluation results
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Decimal(d) => serde_json::Number::from_str(&d.to_string())
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(d.to_string())),
            Self::String(s) => Value::String(s.clone()),
            Self::Resource(resource) => resource.to_json(),
            Self::Collection(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Empty => Value::Array(Vec::new()),
        }
    }

    fn from_number(number: &serde_json::Number) -> Self {
        if let Some(i) = number.as_i64() {
            return Self::Integer(i);
        }
        let text = number.to_string();
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map(Self::Decimal)
            .unwrap_or(Self::String(text))
    }
}

impl From<&Value> for FhirPathValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => Self::from_number(n),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::collection(items.iter().map(Self::from).collect()),
            Value::Object(_) => Self::Resource(FhirResource::from_json(value.clone())),
        }
    }
}

impl From<Value> for FhirPathValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(_) => Self::Resource(FhirResource::from_json(value)),
            other => Self::from(&other),
        }
    }
}

impl From<bool> for FhirPathValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for FhirPathValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for FhirPathValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Debug for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "Boolean({b})"),
            Self::Integer(i) => write!(f, "Integer({i})"),
            Self::Decimal(d) => write!(f, "Decimal({d})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Resource(resource) => match resource.resource_type() {
                Some(rt) => write!(f, "Resource({rt})"),
                None => write!(f, "Element({})", resource.as_json()),
            },
            Self::Collection(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Empty => write!(f, "Empty"),
        }
    }
}

impl fmt::Display for FhirPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Resource(resource) => write!(f, "{}", resource.as_json()),
            Self::Collection(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Empty => write!(f, "{{}}"),
        }
    }
}
