//! Runtime type model.
//!
//! Dispatch decisions are made against concrete runtime information, so the
//! engine carries its own small dynamic type system:
//!
//! - [`TypeDef`] is a nominal type with declared supertypes and capabilities.
//! - [`Value`] is a dynamically typed value.
//! - [`RuntimeType`] is what the dispatcher keys its cache on: either the
//!   type of an instance, or a type object standing for a type.
//!
//! Built-in types live in [`builtin`]. User types default to a single
//! supertype, `Object`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};

use indexmap::IndexSet;
use ordered_float::OrderedFloat;

static NEXT_TYPE_ID: AtomicU32 = AtomicU32::new(0);

/// Shared handle to a type definition.
pub type TypeRef = Arc<TypeDef>;

/// A nominal type.
///
/// The ancestor list is linearized once at construction (self first, then a
/// depth-first walk of the declared supertypes, duplicates dropped), so a
/// subtype check is a scan over a short id list.
pub struct TypeDef {
    id: u32,
    name: String,
    supertypes: Vec<TypeRef>,
    ancestors: Vec<u32>,
    capabilities: IndexSet<String>,
    fields: IndexSet<String>,
}

impl TypeDef {
    /// Start declaring a new type.
    pub fn build(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder {
            name: name.into(),
            supertypes: Vec::new(),
            capabilities: Vec::new(),
            fields: Vec::new(),
            root: false,
        }
    }

    /// Unique id of this type.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The type's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared supertypes, in declaration order.
    pub fn supertypes(&self) -> &[TypeRef] {
        &self.supertypes
    }

    /// Check whether `self <: other` (reflexive).
    pub fn is_subtype_of(&self, other: &TypeDef) -> bool {
        self.ancestors.contains(&other.id)
    }

    /// Check whether `self <: other` and `self != other`.
    pub fn is_strict_subtype_of(&self, other: &TypeDef) -> bool {
        self.id != other.id && self.is_subtype_of(other)
    }

    /// Check whether this type (or one of its ancestors) declares a capability.
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains(name)
    }

    /// All capabilities, own and inherited.
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(String::as_str)
    }

    /// Declared record fields, own first, then inherited.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Whether the type declares any record field.
    pub fn is_record(&self) -> bool {
        !self.fields.is_empty()
    }
}

impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDef {}

impl Hash for TypeDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder for [`TypeDef`].
#[derive(Debug)]
pub struct TypeBuilder {
    name: String,
    supertypes: Vec<TypeRef>,
    capabilities: Vec<String>,
    fields: Vec<String>,
    root: bool,
}

impl TypeBuilder {
    /// Add a declared supertype.
    pub fn extends(mut self, parent: &TypeRef) -> Self {
        self.supertypes.push(Arc::clone(parent));
        self
    }

    /// Declare a capability (a method name) on this type.
    pub fn capability(mut self, name: impl Into<String>) -> Self {
        self.capabilities.push(name.into());
        self
    }

    /// Declare a record field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Finish the type. Types without a declared supertype extend `Object`.
    pub fn build(mut self) -> TypeRef {
        if self.supertypes.is_empty() && !self.root {
            self.supertypes.push(Arc::clone(builtin::object()));
        }

        let id = NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed);
        let mut ancestors = vec![id];
        let mut capabilities: IndexSet<String> = self.capabilities.into_iter().collect();
        let mut fields: IndexSet<String> = self.fields.into_iter().collect();
        for parent in &self.supertypes {
            for ancestor in &parent.ancestors {
                if !ancestors.contains(ancestor) {
                    ancestors.push(*ancestor);
                }
            }
            capabilities.extend(parent.capabilities.iter().cloned());
            fields.extend(parent.fields.iter().cloned());
        }

        Arc::new(TypeDef {
            id,
            name: self.name,
            supertypes: self.supertypes,
            ancestors,
            capabilities,
            fields,
        })
    }
}

/// Built-in types.
pub mod builtin {
    use super::*;

    struct Builtins {
        object: TypeRef,
        nil: TypeRef,
        bool_: TypeRef,
        number: TypeRef,
        integer: TypeRef,
        float: TypeRef,
        str_: TypeRef,
        list: TypeRef,
        type_: TypeRef,
    }

    static BUILTINS: LazyLock<Builtins> = LazyLock::new(|| {
        let object = TypeBuilder {
            name: "Object".to_string(),
            supertypes: Vec::new(),
            capabilities: Vec::new(),
            fields: Vec::new(),
            root: true,
        }
        .build();
        let number = TypeDef::build("Number").extends(&object).build();
        Builtins {
            nil: TypeDef::build("Nil").extends(&object).build(),
            bool_: TypeDef::build("Bool").extends(&object).build(),
            integer: TypeDef::build("Integer").extends(&number).build(),
            float: TypeDef::build("Float").extends(&number).build(),
            str_: TypeDef::build("Str")
                .extends(&object)
                .capability("len")
                .capability("iter")
                .build(),
            list: TypeDef::build("List")
                .extends(&object)
                .capability("len")
                .capability("iter")
                .capability("index")
                .build(),
            type_: TypeDef::build("Type").extends(&object).build(),
            number,
            object,
        }
    });

    /// Root of the hierarchy.
    pub fn object() -> &'static TypeRef {
        &BUILTINS.object
    }

    /// Type of [`Value::Nil`].
    pub fn nil() -> &'static TypeRef {
        &BUILTINS.nil
    }

    /// Type of [`Value::Bool`].
    pub fn bool() -> &'static TypeRef {
        &BUILTINS.bool_
    }

    /// Common supertype of `Integer` and `Float`.
    pub fn number() -> &'static TypeRef {
        &BUILTINS.number
    }

    /// Type of [`Value::Int`].
    pub fn integer() -> &'static TypeRef {
        &BUILTINS.integer
    }

    /// Type of [`Value::Float`].
    pub fn float() -> &'static TypeRef {
        &BUILTINS.float
    }

    /// Type of [`Value::Str`]. Has the `len` and `iter` capabilities.
    pub fn str() -> &'static TypeRef {
        &BUILTINS.str_
    }

    /// Type of [`Value::List`]. Has `len`, `iter` and `index`.
    pub fn list() -> &'static TypeRef {
        &BUILTINS.list
    }

    /// The type of every type object.
    pub fn type_() -> &'static TypeRef {
        &BUILTINS.type_
    }
}

/// An instance of a user-defined type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instance {
    ty: TypeRef,
    fields: Vec<(String, Value)>,
}

impl Instance {
    pub fn new(ty: &TypeRef, fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            ty: Arc::clone(ty),
            fields: fields.into_iter().collect(),
        }
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Arc<str>),
    List(Arc<[Value]>),
    /// A type object.
    Type(TypeRef),
    Object(Arc<Instance>),
}

impl Value {
    /// An integer.
    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    /// A float. `NaN` is equal to itself so values stay hashable.
    pub fn float(x: f64) -> Self {
        Value::Float(OrderedFloat(x))
    }

    /// A string, copied into shared storage.
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// A list of values.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    /// A type object standing for `ty`. Its runtime type is `Type`.
    pub fn type_object(ty: &TypeRef) -> Self {
        Value::Type(Arc::clone(ty))
    }

    /// An instance of a user-defined type.
    pub fn object(instance: Instance) -> Self {
        Value::Object(Arc::new(instance))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(x.into_inner()),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    /// The runtime type the dispatcher sees for this value.
    pub fn runtime_type(&self) -> RuntimeType {
        let ty = match self {
            Value::Nil => builtin::nil(),
            Value::Bool(_) => builtin::bool(),
            Value::Int(_) => builtin::integer(),
            Value::Float(_) => builtin::float(),
            Value::Str(_) => builtin::str(),
            Value::List(_) => builtin::list(),
            Value::Type(t) => return RuntimeType::TypeObject(Arc::clone(t)),
            Value::Object(instance) => &instance.ty,
        };
        RuntimeType::Instance(Arc::clone(ty))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Type(t) => write!(f, "type[{t}]"),
            Value::Object(instance) => write!(f, "<{}>", instance.ty),
        }
    }
}

/// The runtime type of a value, as used for bound matching and cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuntimeType {
    /// An ordinary value of the given type.
    Instance(TypeRef),
    /// A type object describing the given type.
    TypeObject(TypeRef),
}

impl RuntimeType {
    /// The nominal type of the value itself. Type objects are instances of
    /// the built-in `Type`.
    pub fn nominal(&self) -> &TypeRef {
        match self {
            RuntimeType::Instance(t) => t,
            RuntimeType::TypeObject(_) => builtin::type_(),
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeType::Instance(t) => write!(f, "{t}"),
            RuntimeType::TypeObject(t) => write!(f, "type[{t}]"),
        }
    }
}
