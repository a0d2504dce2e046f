//! Runtime values as seen by the debug engine.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ObjectRef = Rc<RefCell<Object>>;

/// Object field key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

/// Composite value: an ordered set of fields plus an optional inherited base.
#[derive(Debug, Default)]
pub struct Object {
    pub class_name: String,
    pub base: Option<ObjectRef>,
    pub fields: IndexMap<Key, Value>,
}

impl Object {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            base: None,
            fields: IndexMap::new(),
        }
    }

    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Missing,
    String(String),
    Integer(i64),
    Float(f64),
    Object(ObjectRef),
}

impl Value {
    /// Type name as reported in property and typemap responses.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Missing => "undefined",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Object(_) => "object",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Missing, Value::Missing) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Scalar text form, objects render as empty text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing | Value::Object(_) => Ok(()),
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Facets {
    pub alias: bool,
    pub builtin: bool,
    pub is_static: bool,
    pub binary: bool,
}

impl Facets {
    /// Space separated facet list in the fixed protocol order.
    pub fn render(&self) -> String {
        let mut out = Vec::with_capacity(4);
        if self.alias {
            out.push("Alias");
        }
        if self.builtin {
            out.push("Builtin");
        }
        if self.is_static {
            out.push("Static");
        }
        if self.binary {
            out.push("ClipboardAll");
        }
        out.join(" ")
    }
}

/// A named binding as exposed by the host variable store.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub value: Value,
    pub facets: Facets,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            facets: Facets::default(),
        }
    }

    pub fn with_facets(mut self, facets: Facets) -> Self {
        self.facets = facets;
        self
    }
}
