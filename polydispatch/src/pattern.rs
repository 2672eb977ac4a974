//! Type patterns.
//!
//! A [`Pattern`] describes what a single parameter may match. Matching is
//! split in two phases:
//!
//! - [`Pattern::admits`] looks only at the runtime type (the *bound*). This is
//!   what resolution chains and the dispatch cache are built from.
//! - [`Pattern::accepts`] additionally evaluates value guards (literal
//!   equality and dependent predicates). It runs lazily at call time.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::types::{builtin, RuntimeType, TypeDef, TypeRef, Value};

/// A parameter pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Exactly this type, no subtypes.
    Exact(TypeRef),
    /// This type or any subtype.
    SubclassOf(TypeRef),
    /// Any subtype, excluding the type itself.
    StrictSubclassOf(TypeRef),
    /// Only this value.
    Literal(Value),
    /// The bound must match, then the guard must accept the value.
    Dependent { bound: Box<Pattern>, guard: Guard },
    /// Structural capability check on the value's type.
    Protocol(Protocol),
    Union(Vec<Pattern>),
    Intersection(Vec<Pattern>),
    Wildcard,
    /// The argument is a type object whose described type matches the inner pattern.
    TypeOfType(Box<Pattern>),
    /// A list of fixed length, matched element by element.
    Product(Vec<Pattern>),
}

impl Pattern {
    pub fn exact(ty: &TypeRef) -> Self {
        Pattern::Exact(Arc::clone(ty))
    }

    pub fn of(ty: &TypeRef) -> Self {
        Pattern::SubclassOf(Arc::clone(ty))
    }

    pub fn strict(ty: &TypeRef) -> Self {
        Pattern::StrictSubclassOf(Arc::clone(ty))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Pattern::Literal(value.into())
    }

    pub fn dependent(bound: Pattern, guard: Guard) -> Self {
        Pattern::Dependent {
            bound: Box::new(bound),
            guard,
        }
    }

    pub fn protocol(protocol: Protocol) -> Self {
        Pattern::Protocol(protocol)
    }

    pub fn union(members: impl IntoIterator<Item = Pattern>) -> Self {
        Pattern::Union(members.into_iter().collect())
    }

    pub fn intersection(members: impl IntoIterator<Item = Pattern>) -> Self {
        Pattern::Intersection(members.into_iter().collect())
    }

    pub fn type_of(inner: Pattern) -> Self {
        Pattern::TypeOfType(Box::new(inner))
    }

    /// Bound match against a runtime type. Guards are ignored.
    pub fn admits(&self, rt: &RuntimeType) -> bool {
        match self {
            Pattern::Exact(t) => rt.nominal() == t,
            Pattern::SubclassOf(t) => rt.nominal().is_subtype_of(t),
            Pattern::StrictSubclassOf(t) => rt.nominal().is_strict_subtype_of(t),
            Pattern::Literal(v) => literal_bound(v).admits(rt),
            Pattern::Dependent { bound, .. } => bound.admits(rt),
            Pattern::Protocol(p) => p.satisfied_by(rt.nominal()),
            Pattern::Union(members) => members.iter().any(|m| m.admits(rt)),
            Pattern::Intersection(members) => members.iter().all(|m| m.admits(rt)),
            Pattern::Wildcard => true,
            Pattern::TypeOfType(inner) => match rt {
                RuntimeType::TypeObject(t) => inner.admits(&RuntimeType::Instance(Arc::clone(t))),
                RuntimeType::Instance(_) => false,
            },
            Pattern::Product(_) => {
                matches!(rt, RuntimeType::Instance(t) if t.is_subtype_of(builtin::list()))
            }
        }
    }

    /// Full match against a value: bound plus every guard.
    pub fn accepts(&self, value: &Value) -> bool {
        self.accepts_typed(value, &value.runtime_type())
    }

    pub(crate) fn accepts_typed(&self, value: &Value, rt: &RuntimeType) -> bool {
        self.admits(rt) && self.guards_hold(value, rt)
    }

    /// Guard evaluation, assuming the bound already matched.
    pub(crate) fn guards_hold(&self, value: &Value, rt: &RuntimeType) -> bool {
        match self {
            Pattern::Literal(v) => v == value,
            Pattern::Dependent { bound, guard } => {
                bound.guards_hold(value, rt) && guard.check(value)
            }
            Pattern::Union(members) => members.iter().any(|m| m.accepts_typed(value, rt)),
            Pattern::Intersection(members) => members.iter().all(|m| m.guards_hold(value, rt)),
            Pattern::TypeOfType(inner) => inner.guards_hold(value, rt),
            Pattern::Product(items) => value.as_list().is_some_and(|elements| {
                elements.len() == items.len()
                    && items.iter().zip(elements).all(|(p, v)| p.accepts(v))
            }),
            _ => true,
        }
    }

    /// Whether matching this pattern requires looking at the value.
    pub fn is_dependent(&self) -> bool {
        match self {
            Pattern::Literal(_) | Pattern::Dependent { .. } | Pattern::Product(_) => true,
            Pattern::Union(members) | Pattern::Intersection(members) => {
                members.iter().any(Pattern::is_dependent)
            }
            Pattern::TypeOfType(inner) => inner.is_dependent(),
            _ => false,
        }
    }

    /// For top-level guarded patterns, the nominal pattern the guard refines.
    pub(crate) fn guarded_bound(&self) -> Option<Pattern> {
        match self {
            Pattern::Literal(v) => Some(literal_bound(v)),
            Pattern::Dependent { bound, .. } => Some((**bound).clone()),
            Pattern::Product(_) => Some(Pattern::of(builtin::list())),
            _ => None,
        }
    }

    /// The values a pure equality pattern accepts: a literal, or a union of
    /// literals. `None` for anything else.
    pub(crate) fn literal_keys(&self) -> Option<Vec<&Value>> {
        match self {
            Pattern::Literal(v) => Some(vec![v]),
            Pattern::Union(members) => members
                .iter()
                .map(|m| match m {
                    Pattern::Literal(v) => Some(v),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

/// Nominal pattern admitting the runtime type of a literal.
pub(crate) fn literal_bound(value: &Value) -> Pattern {
    match value.runtime_type() {
        RuntimeType::Instance(t) => Pattern::SubclassOf(t),
        RuntimeType::TypeObject(t) => Pattern::TypeOfType(Box::new(Pattern::SubclassOf(t))),
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, members: &[Pattern], sep: &str) -> fmt::Result {
            for (i, m) in members.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{m}")?;
            }
            Ok(())
        }

        match self {
            Pattern::Exact(t) => write!(f, "Exactly[{t}]"),
            Pattern::SubclassOf(t) => write!(f, "{t}"),
            Pattern::StrictSubclassOf(t) => write!(f, "StrictSubclass[{t}]"),
            Pattern::Literal(v) => write!(f, "Literal[{v}]"),
            Pattern::Dependent { bound, guard } => write!(f, "{bound} where {guard}"),
            Pattern::Protocol(p) => write!(f, "{p}"),
            Pattern::Union(members) => join(f, members, " | "),
            Pattern::Intersection(members) => join(f, members, " & "),
            Pattern::Wildcard => f.write_str("*"),
            Pattern::TypeOfType(inner) => write!(f, "type[{inner}]"),
            Pattern::Product(items) => {
                f.write_str("Product[")?;
                join(f, items, ", ")?;
                f.write_str("]")
            }
        }
    }
}

/// A parameter of a guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GuardArg {
    Value(Value),
    /// Placeholder; less specific than any concrete value.
    Any,
}

impl fmt::Display for GuardArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardArg::Value(v) => write!(f, "{v}"),
            GuardArg::Any => f.write_str("_"),
        }
    }
}

type Predicate = Arc<dyn Fn(&Value, &[GuardArg]) -> bool + Send + Sync>;

/// A named value predicate with parameters.
///
/// Identity is the name plus the parameter list; the closure is not compared.
#[derive(Clone)]
pub struct Guard {
    name: Arc<str>,
    args: Vec<GuardArg>,
    predicate: Predicate,
}

impl Guard {
    /// A guard without parameters.
    pub fn new<F>(name: &str, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            args: Vec::new(),
            predicate: Arc::new(move |v, _| predicate(v)),
        }
    }

    /// A parameterized guard. The predicate receives the parameters.
    pub fn with_args<F>(name: &str, args: Vec<GuardArg>, predicate: F) -> Self
    where
        F: Fn(&Value, &[GuardArg]) -> bool + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            args,
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[GuardArg] {
        &self.args
    }

    pub fn check(&self, value: &Value) -> bool {
        (self.predicate)(value, &self.args)
    }
}

impl PartialEq for Guard {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args
    }
}

impl Eq for Guard {}

impl Hash for Guard {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.args.hash(state);
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("(")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

type TypeCheck = Arc<dyn Fn(&TypeDef) -> bool + Send + Sync>;

/// A structural check on a type.
#[derive(Clone)]
pub enum Protocol {
    /// The type must declare every listed capability.
    Methods(BTreeSet<String>),
    /// Caller-supplied class-level predicate, identified by name.
    Custom { name: Arc<str>, check: TypeCheck },
}

impl Protocol {
    pub fn has_methods<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Protocol::Methods(methods.into_iter().map(Into::into).collect())
    }

    /// A single required capability.
    pub fn has_method(name: impl Into<String>) -> Self {
        Protocol::has_methods([name.into()])
    }

    /// Types that declare record fields.
    pub fn dataclass() -> Self {
        Protocol::custom("Dataclass", TypeDef::is_record)
    }

    pub fn custom<F>(name: &str, check: F) -> Self
    where
        F: Fn(&TypeDef) -> bool + Send + Sync + 'static,
    {
        Protocol::Custom {
            name: Arc::from(name),
            check: Arc::new(check),
        }
    }

    pub fn satisfied_by(&self, ty: &TypeDef) -> bool {
        match self {
            Protocol::Methods(methods) => methods.iter().all(|m| ty.has_capability(m)),
            Protocol::Custom { check, .. } => check(ty),
        }
    }
}

impl PartialEq for Protocol {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Protocol::Methods(a), Protocol::Methods(b)) => a == b,
            (Protocol::Custom { name: a, .. }, Protocol::Custom { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Protocol {}

impl Hash for Protocol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Protocol::Methods(methods) => {
                0u8.hash(state);
                methods.hash(state);
            }
            Protocol::Custom { name, .. } => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Methods(methods) => f.debug_tuple("Methods").field(methods).finish(),
            Protocol::Custom { name, .. } => {
                f.debug_struct("Custom").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Methods(methods) => {
                f.write_str("HasMethods[")?;
                for (i, m) in methods.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(m)?;
                }
                f.write_str("]")
            }
            Protocol::Custom { name, .. } => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Instance;

    fn int() -> RuntimeType {
        Value::int(1).runtime_type()
    }

    fn positive() -> Guard {
        Guard::new("positive", |v| v.as_int().is_some_and(|n| n > 0))
    }

    #[test]
    fn test_nominal_admission() {
        assert!(Pattern::of(builtin::number()).admits(&int()));
        assert!(Pattern::exact(builtin::integer()).admits(&int()));
        assert!(!Pattern::exact(builtin::number()).admits(&int()));
        assert!(Pattern::strict(builtin::number()).admits(&int()));
        assert!(!Pattern::strict(builtin::integer()).admits(&int()));
        assert!(!Pattern::of(builtin::str()).admits(&int()));
    }

    #[test]
    fn test_literal_admits_type_accepts_value() {
        let zero = Pattern::literal(0);
        assert!(zero.admits(&int()));
        assert!(zero.accepts(&Value::int(0)));
        assert!(!zero.accepts(&Value::int(1)));
        assert!(!zero.accepts(&Value::str("0")));
    }

    #[test]
    fn test_dependent_checks_bound_then_guard() {
        let p = Pattern::dependent(Pattern::of(builtin::integer()), positive());
        assert!(p.admits(&int()));
        assert!(p.accepts(&Value::int(3)));
        assert!(!p.accepts(&Value::int(-3)));
        assert!(!p.accepts(&Value::float(3.0)));
        assert!(p.is_dependent());
    }

    #[test]
    fn test_protocol_admission() {
        let sized = Pattern::protocol(Protocol::has_methods(["len"]));
        assert!(sized.admits(&Value::str("abc").runtime_type()));
        assert!(sized.admits(&Value::list([]).runtime_type()));
        assert!(!sized.admits(&int()));

        let named = Pattern::protocol(Protocol::custom("Named", |t| t.name().starts_with('N')));
        assert!(named.admits(&Value::Nil.runtime_type()));
        assert!(!named.admits(&int()));
    }

    #[test]
    fn test_union_and_intersection() {
        let num_or_str =
            Pattern::union([Pattern::of(builtin::number()), Pattern::of(builtin::str())]);
        assert!(num_or_str.admits(&int()));
        assert!(num_or_str.admits(&Value::str("x").runtime_type()));
        assert!(!num_or_str.admits(&Value::Nil.runtime_type()));

        let sized = TypeDef::build("Sized").capability("len").build();
        let both = Pattern::intersection([
            Pattern::of(&sized),
            Pattern::protocol(Protocol::has_methods(["len"])),
        ]);
        let value = Value::object(Instance::new(&sized, []));
        assert!(both.accepts(&value));
        assert!(!both.admits(&Value::str("x").runtime_type()));
    }

    #[test]
    fn test_union_with_literal_is_dependent() {
        let p = Pattern::union([Pattern::literal(0), Pattern::of(builtin::str())]);
        assert!(p.is_dependent());
        assert!(p.accepts(&Value::int(0)));
        assert!(p.accepts(&Value::str("x")));
        assert!(!p.accepts(&Value::int(2)));
    }

    #[test]
    fn test_type_of_type() {
        let p = Pattern::type_of(Pattern::of(builtin::number()));
        assert!(p.accepts(&Value::type_object(builtin::integer())));
        assert!(!p.accepts(&Value::type_object(builtin::str())));
        assert!(!p.accepts(&Value::int(1)));
        assert!(Pattern::of(builtin::type_()).accepts(&Value::type_object(builtin::str())));
    }

    #[test]
    fn test_wildcard_admits_everything() {
        assert!(Pattern::Wildcard.accepts(&Value::Nil));
        assert!(Pattern::Wildcard.accepts(&Value::type_object(builtin::list())));
    }

    #[test]
    fn test_guard_identity_ignores_closure() {
        let a = Guard::new("positive", |_| true);
        let b = Guard::new("positive", |_| false);
        assert_eq!(a, b);

        let c = Guard::with_args("lt", vec![GuardArg::Value(Value::int(3))], |_, _| true);
        let d = Guard::with_args("lt", vec![GuardArg::Any], |_, _| true);
        assert_ne!(c, d);
    }

    #[test]
    fn test_parameterized_guard_receives_args() {
        let below = Guard::with_args("below", vec![GuardArg::Value(Value::int(10))], |v, args| {
            match (v.as_int(), args.first()) {
                (Some(n), Some(GuardArg::Value(Value::Int(limit)))) => n < *limit,
                _ => false,
            }
        });
        assert!(below.check(&Value::int(3)));
        assert!(!below.check(&Value::int(30)));
        assert_eq!(below.to_string(), "below(10)");
    }

    #[test]
    fn test_literal_keys() {
        let zero = Value::int(0);
        assert_eq!(Pattern::literal(0).literal_keys(), Some(vec![&zero]));
        assert_eq!(Pattern::equals([0, 1]).literal_keys().map(|k| k.len()), Some(2));
        let mixed = Pattern::union([Pattern::literal(0), Pattern::of(builtin::str())]);
        assert_eq!(mixed.literal_keys(), None);
        assert_eq!(Pattern::of(builtin::integer()).literal_keys(), None);
    }

    #[test]
    fn test_dataclass_and_has_method() {
        let point = TypeDef::build("Point").field("x").field("y").build();
        let point3 = TypeDef::build("Point3").extends(&point).field("z").build();
        let plain = TypeDef::build("Plain").capability("len").build();

        let dataclass = Pattern::protocol(Protocol::dataclass());
        assert!(dataclass.admits(&Value::object(Instance::new(&point, [])).runtime_type()));
        assert!(dataclass.admits(&Value::object(Instance::new(&point3, [])).runtime_type()));
        assert!(!dataclass.admits(&Value::object(Instance::new(&plain, [])).runtime_type()));
        assert_eq!(point3.fields().collect::<Vec<_>>(), ["z", "x", "y"]);

        assert_eq!(Protocol::has_method("len"), Protocol::has_methods(["len"]));
        assert!(Protocol::has_method("len").satisfied_by(&plain));
        assert!(!Protocol::has_method("len").satisfied_by(&point));
    }

    #[test]
    fn test_display() {
        let p = Pattern::dependent(Pattern::of(builtin::integer()), positive());
        assert_eq!(p.to_string(), "Integer where positive");
        assert_eq!(
            Pattern::protocol(Protocol::has_methods(["len", "iter"])).to_string(),
            "HasMethods[iter, len]"
        );
        let pair = Pattern::product([Pattern::of(builtin::integer()), Pattern::literal(0)]);
        assert_eq!(pair.to_string(), "Product[Integer, Literal[0]]");
    }
}
