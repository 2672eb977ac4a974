//! Dispatch over user-defined types, protocols, type objects and keywords.

use polydispatch::{
    builtin, DispatchError, Engine, ErrorKind, Instance, Operation, Pattern, Protocol, Registry,
    Signature, TypeDef, TypeSignature, Value,
};

fn constant(label: &str, pattern: Pattern) -> Signature {
    let out = label.to_string();
    Signature::build(label)
        .param(pattern)
        .body(move |_| Ok(Value::str(out.as_str())))
        .unwrap()
}

#[test]
fn test_user_hierarchy() {
    let shape = TypeDef::build("Shape").build();
    let circle = TypeDef::build("Circle").extends(&shape).build();
    let square = TypeDef::build("Square").extends(&shape).build();

    let area = Operation::new("area");
    area.register(
        Signature::build("circle")
            .param(Pattern::of(&circle))
            .body(|ctx| {
                let r = ctx
                    .require(0)?
                    .as_instance()
                    .and_then(|i| i.field("r"))
                    .and_then(Value::as_int)
                    .ok_or_else(|| DispatchError::raised("circle without radius"))?;
                Ok(Value::int(3 * r * r))
            })
            .unwrap(),
    );
    area.register(constant("shape", Pattern::of(&shape)));

    let c = Value::object(Instance::new(&circle, [("r".to_string(), Value::int(2))]));
    let s = Value::object(Instance::new(&square, []));
    assert_eq!(area.call(vec![c]).unwrap(), Value::int(12));
    assert_eq!(area.call(vec![s]).unwrap(), Value::str("shape"));
    assert_eq!(
        area.call(vec![Value::int(1)]).unwrap_err().kind(),
        ErrorKind::NoMatch
    );
}

#[test]
fn test_strict_subclass_excludes_the_type() {
    let f = Operation::new("f");
    f.register(constant("strict", Pattern::strict(builtin::number())));
    f.register(constant("any", Pattern::Wildcard));

    assert_eq!(f.call(vec![Value::int(1)]).unwrap(), Value::str("strict"));
    assert_eq!(f.call(vec![Value::str("x")]).unwrap(), Value::str("any"));
}

#[test]
fn test_protocol_between_object_and_nominal() {
    let sized = Pattern::protocol(Protocol::has_methods(["len"]));
    let f = Operation::new("size");
    f.register(constant("object", Pattern::of(builtin::object())));
    f.register(constant("sized", sized));
    f.register(constant("list", Pattern::of(builtin::list())));

    assert_eq!(f.call(vec![Value::list([])]).unwrap(), Value::str("list"));
    assert_eq!(f.call(vec![Value::str("abc")]).unwrap(), Value::str("sized"));
    assert_eq!(f.call(vec![Value::int(0)]).unwrap(), Value::str("object"));
}

#[test]
fn test_custom_protocol() {
    let numeric = Protocol::custom("numeric", |ty| ty.is_subtype_of(builtin::number()));
    let f = Operation::new("f");
    f.register(constant("numeric", Pattern::protocol(numeric)));

    assert!(f.call(vec![Value::float(1.5)]).is_ok());
    assert!(f.call(vec![Value::Bool(true)]).is_err());
}

#[test]
fn test_type_objects() {
    let parse = Operation::new("parse");
    parse.register(constant("integer_type", Pattern::type_of(Pattern::of(builtin::integer()))));
    parse.register(constant("number_type", Pattern::type_of(Pattern::of(builtin::number()))));
    parse.register(constant("value", Pattern::of(builtin::integer())));

    assert_eq!(
        parse.call(vec![Value::type_object(builtin::integer())]).unwrap(),
        Value::str("integer_type")
    );
    assert_eq!(
        parse.call(vec![Value::type_object(builtin::float())]).unwrap(),
        Value::str("number_type")
    );
    assert_eq!(parse.call(vec![Value::int(1)]).unwrap(), Value::str("value"));
    assert!(parse.call(vec![Value::type_object(builtin::str())]).is_err());
}

#[test]
fn test_optional_parameters_and_keywords() {
    let fmt = Operation::new("fmt");
    fmt.register(
        Signature::build("fmt")
            .named("value", Pattern::of(builtin::integer()))
            .optional("width", Pattern::of(builtin::integer()))
            .optional_keyword("fill", Pattern::of(builtin::str()))
            .body(|ctx| {
                let value = ctx.require(0)?.to_string();
                let width = ctx.arg(1).and_then(Value::as_int).unwrap_or(0) as usize;
                let fill = ctx.kwarg("fill").and_then(Value::as_str).unwrap_or(" ");
                let pad = fill.repeat(width.saturating_sub(value.len()));
                Ok(Value::str(format!("{pad}{value}")))
            })
            .unwrap(),
    );

    use polydispatch::Call;
    assert_eq!(fmt.call(vec![Value::int(7)]).unwrap(), Value::str("7"));
    assert_eq!(
        fmt.call(Call::new([Value::int(7)]).kw("width", 3)).unwrap(),
        Value::str("  7")
    );
    assert_eq!(
        fmt.call(Call::new([Value::int(7), Value::int(3)]).kw("fill", "0")).unwrap(),
        Value::str("007")
    );
    assert_eq!(
        fmt.call(Call::new([Value::int(7)]).kw("value", 1)).unwrap_err().kind(),
        ErrorKind::MalformedCallShape
    );
}

#[test]
fn test_merged_registries_last_wins() {
    let mut numbers = Registry::new("numbers");
    numbers.register(constant("int_from_numbers", Pattern::of(builtin::integer())));
    numbers.register(constant("float", Pattern::of(builtin::float())));

    let mut overrides = Registry::new("overrides");
    overrides.register(constant("int_from_overrides", Pattern::of(builtin::integer())));

    let engine = Engine::new();
    engine.merge("show", &[&numbers, &overrides]);

    assert_eq!(
        engine.dispatch("show", vec![Value::int(1)]).unwrap(),
        Value::str("int_from_overrides")
    );
    assert_eq!(
        engine.dispatch("show", vec![Value::float(1.0)]).unwrap(),
        Value::str("float")
    );
}

#[test]
fn test_mixins_compose() {
    let ints = Operation::new("ints");
    ints.register(constant("int", Pattern::of(builtin::integer())));
    let strs = Operation::new("strs");
    strs.register(constant("str", Pattern::of(builtin::str())));

    let both = Operation::new("both");
    both.add_mixin(ints.clone()).unwrap();
    both.add_mixin(strs).unwrap();

    assert_eq!(both.call(vec![Value::int(1)]).unwrap(), Value::str("int"));
    assert_eq!(both.call(vec![Value::str("a")]).unwrap(), Value::str("str"));

    // Later changes to a mixin are visible.
    ints.register(constant("float", Pattern::of(builtin::float())));
    assert_eq!(both.call(vec![Value::float(0.5)]).unwrap(), Value::str("float"));
}

#[test]
fn test_narrower_intersection_wins() {
    let a = TypeDef::build("A").build();
    let b = TypeDef::build("B").build();
    let c = TypeDef::build("C").extends(&a).extends(&b).capability("len").build();
    let sized = || Pattern::protocol(Protocol::has_methods(["len"]));

    let f = Operation::new("f");
    f.register(constant(
        "narrow",
        Pattern::intersection([Pattern::of(&a), Pattern::of(&b), sized()]),
    ));
    f.register(constant("wide", Pattern::intersection([Pattern::of(&a), sized()])));

    let value = Value::object(Instance::new(&c, []));
    assert_eq!(f.call(vec![value.clone()]).unwrap(), Value::str("narrow"));

    // Same members in another order are the same requirement.
    f.register(constant(
        "reordered",
        Pattern::intersection([sized(), Pattern::of(&b), Pattern::of(&a)]),
    ));
    assert_eq!(
        f.call(vec![value]).unwrap_err().kind(),
        ErrorKind::StaticAmbiguity
    );
}

#[test]
fn test_permuted_unions_are_equal() {
    let f = Operation::new("f");
    f.register(constant(
        "int_or_str",
        Pattern::union([Pattern::of(builtin::integer()), Pattern::of(builtin::str())]),
    ));
    f.register(constant(
        "str_or_int",
        Pattern::union([Pattern::of(builtin::str()), Pattern::of(builtin::integer())]),
    ));
    f.register(constant("object", Pattern::of(builtin::object())));

    let err = f.call(vec![Value::int(1)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaticAmbiguity);
    assert_eq!(err.candidates().len(), 2);
    assert_eq!(f.call(vec![Value::Nil]).unwrap(), Value::str("object"));
}

#[test]
fn test_value_sets_select_by_lookup() {
    let weekday = Operation::new("weekday");
    weekday.register(constant("weekend", Pattern::equals(["sat", "sun"])));
    weekday.register(constant("midweek", Pattern::equals(["tue", "wed", "thu"])));
    weekday.register(constant("monday", Pattern::equals(["mon"])));
    weekday.register(constant("other", Pattern::of(builtin::str())));

    let chain = weekday.resolve(&TypeSignature::of(&[Value::str("sat")], &[]));
    assert!(chain.groups()[0].is_keyed());

    assert_eq!(weekday.call(vec![Value::str("sun")]).unwrap(), Value::str("weekend"));
    assert_eq!(weekday.call(vec![Value::str("wed")]).unwrap(), Value::str("midweek"));
    assert_eq!(weekday.call(vec![Value::str("mon")]).unwrap(), Value::str("monday"));
    assert_eq!(weekday.call(vec![Value::str("fri")]).unwrap(), Value::str("other"));
}

#[test]
fn test_text_patterns() {
    let route = Operation::new("route");
    route.register(constant("secure", Pattern::starts_with("https://")));
    route.register(constant("image", Pattern::ends_with(".png")));
    route.register(constant("versioned", Pattern::regexp(r"/v\d+/").unwrap()));
    route.register(constant("text", Pattern::of(builtin::str())));

    let call = |s: &str| route.call(vec![Value::str(s)]);
    assert_eq!(call("https://example.org").unwrap(), Value::str("secure"));
    assert_eq!(call("logo.png").unwrap(), Value::str("image"));
    assert_eq!(call("/api/v2/users").unwrap(), Value::str("versioned"));
    assert_eq!(call("plain").unwrap(), Value::str("text"));
    assert_eq!(
        call("https://example.org/logo.png").unwrap_err().kind(),
        ErrorKind::RuntimeAmbiguity
    );
}

#[test]
fn test_records_and_keys() {
    let point = TypeDef::build("Point").field("x").field("y").build();
    let opaque = TypeDef::build("Opaque").build();

    let show = Operation::new("show");
    show.register(constant("record", Pattern::protocol(Protocol::dataclass())));
    show.register(constant("keyed", Pattern::has_key(["label"])));
    show.register(constant("object", Pattern::of(builtin::object())));

    let p = Value::object(Instance::new(&point, []));
    let labelled = Value::object(Instance::new(
        &opaque,
        [("label".to_string(), Value::str("a"))],
    ));
    let bare = Value::object(Instance::new(&opaque, []));

    assert_eq!(show.call(vec![p]).unwrap(), Value::str("record"));
    assert_eq!(show.call(vec![labelled]).unwrap(), Value::str("keyed"));
    assert_eq!(show.call(vec![bare]).unwrap(), Value::str("object"));
}

#[test]
fn test_products_order_elementwise() {
    let pair = Operation::new("pair");
    pair.register(constant(
        "int_str",
        Pattern::product([Pattern::of(builtin::integer()), Pattern::of(builtin::str())]),
    ));
    pair.register(constant(
        "num_str",
        Pattern::product([Pattern::of(builtin::number()), Pattern::of(builtin::str())]),
    ));
    pair.register(constant("list", Pattern::of(builtin::list())));

    let list = |items: Vec<Value>| vec![Value::list(items)];
    assert_eq!(
        pair.call(list(vec![Value::int(1), Value::str("a")])).unwrap(),
        Value::str("int_str")
    );
    assert_eq!(
        pair.call(list(vec![Value::float(1.5), Value::str("a")])).unwrap(),
        Value::str("num_str")
    );
    assert_eq!(pair.call(list(vec![Value::int(1)])).unwrap(), Value::str("list"));
}
