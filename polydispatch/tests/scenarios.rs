//! End-to-end dispatch scenarios.

use std::sync::Arc;

use polydispatch::{
    builtin, CallContext, DispatchError, Engine, Guard, Operation, Pattern, Signature, Value,
};

fn int(ctx: &CallContext<'_>, i: usize) -> Result<i64, DispatchError> {
    ctx.require(i)?
        .as_int()
        .ok_or_else(|| DispatchError::raised("expected an integer"))
}

fn label_body(
    label: &'static str,
) -> impl Fn(&CallContext<'_>) -> Result<Value, DispatchError> + Send + Sync + 'static {
    move |_| Ok(Value::str(label))
}

#[test]
fn test_exact_beats_subclass() {
    let f = Operation::new("f");
    f.register(
        Signature::build("number")
            .named("x", Pattern::of(builtin::number()))
            .body(label_body("number"))
            .unwrap(),
    );
    f.register(
        Signature::build("integer")
            .named("x", Pattern::exact(builtin::integer()))
            .body(label_body("integer"))
            .unwrap(),
    );

    assert_eq!(f.call(vec![Value::int(3)]).unwrap(), Value::str("integer"));
}

#[test]
fn test_pointwise_incomparable_is_static_ambiguity() {
    let f = Operation::new("f");
    f.register(
        Signature::build("object_integer")
            .named("x", Pattern::of(builtin::object()))
            .named("y", Pattern::of(builtin::integer()))
            .body(label_body("object_integer"))
            .unwrap(),
    );
    f.register(
        Signature::build("integer_object")
            .named("x", Pattern::of(builtin::integer()))
            .named("y", Pattern::of(builtin::object()))
            .body(label_body("integer_object"))
            .unwrap(),
    );

    match f.call(vec![Value::int(1), Value::int(1)]) {
        Err(DispatchError::StaticAmbiguity { candidates, .. }) => {
            let mut labels: Vec<_> = candidates.iter().map(|c| c.label.as_str()).collect();
            labels.sort_unstable();
            assert_eq!(labels, ["integer_object", "object_integer"]);
        }
        other => panic!("Expected StaticAmbiguity, got {:?}", other),
    }

    // Only Integer, Integer is ambiguous; a Str first argument has one candidate.
    assert_eq!(
        f.call(vec![Value::str("a"), Value::int(1)]).unwrap(),
        Value::str("object_integer")
    );
}

fn factorial() -> Arc<Operation> {
    let g = Operation::new("g");
    g.register(
        Signature::build("zero")
            .named("n", Pattern::literal(0))
            .body(|_| Ok(Value::int(1)))
            .unwrap(),
    );
    g.register(
        Signature::build("positive")
            .named(
                "n",
                Pattern::dependent(
                    Pattern::of(builtin::integer()),
                    Guard::new("n > 0", |v| v.as_int().is_some_and(|n| n > 0)),
                ),
            )
            .body(|ctx| {
                let n = int(ctx, 0)?;
                let rest = ctx.recurse(vec![Value::int(n - 1)])?;
                Ok(Value::int(n * rest.as_int().unwrap_or_default()))
            })
            .unwrap(),
    );
    g
}

#[test]
fn test_literal_and_guard_recursion() {
    let g = factorial();
    assert_eq!(g.call(vec![Value::int(5)]).unwrap(), Value::int(120));
    assert_eq!(g.call(vec![Value::int(0)]).unwrap(), Value::int(1));
    assert!(matches!(
        g.call(vec![Value::int(-1)]),
        Err(DispatchError::NoMatch { .. })
    ));
}

#[test]
fn test_priority_wrapper_continues_to_base() {
    let h = Operation::new("h");
    h.register(
        Signature::build("base")
            .named("x", Pattern::of(builtin::object()))
            .body(label_body("base"))
            .unwrap(),
    );
    h.register(
        Signature::build("shout")
            .named("x", Pattern::of(builtin::object()))
            .priority(10)
            .body(|ctx| {
                let inner = ctx.call_next()?;
                Ok(Value::str(format!("{}!", inner.as_str().unwrap_or_default())))
            })
            .unwrap(),
    );

    assert_eq!(h.call(vec![Value::int(1)]).unwrap(), Value::str("base!"));
    assert_eq!(h.snapshot().len(), 2);
}

/// `walk` folds a nested list, summing what each leaf maps to.
fn walk() -> Arc<Operation> {
    let walk = Operation::new("walk");
    walk.register(
        Signature::build("list")
            .named("items", Pattern::of(builtin::list()))
            .body(|ctx| {
                let items = ctx
                    .require(0)?
                    .as_list()
                    .ok_or_else(|| DispatchError::raised("expected a list"))?;
                let mut total = 0;
                for item in items {
                    let value = ctx.recurse(vec![item.clone()])?;
                    total += value.as_int().unwrap_or_default();
                }
                Ok(Value::int(total))
            })
            .unwrap(),
    );
    walk.register(
        Signature::build("leaf")
            .named("n", Pattern::of(builtin::integer()))
            .body(|ctx| Ok(Value::int(int(ctx, 0)? + 1)))
            .unwrap(),
    );
    walk
}

#[test]
fn test_variant_recursion_stays_in_variant() {
    let walk = walk();
    let scaled = walk.variant("walk_scaled");
    scaled.register(
        Signature::build("leaf")
            .named("n", Pattern::of(builtin::integer()))
            .body(|ctx| Ok(Value::int(int(ctx, 0)? * 10)))
            .unwrap(),
    );

    let tree = Value::list([
        Value::int(1),
        Value::list([Value::int(2), Value::list([Value::int(3)])]),
    ]);

    assert_eq!(scaled.call(vec![tree.clone()]).unwrap(), Value::int(60));
    assert_eq!(walk.call(vec![tree]).unwrap(), Value::int(9));
}

#[test]
fn test_variant_of_variant() {
    let walk = walk();
    let scaled = walk.variant("walk_scaled");
    scaled.register(
        Signature::build("leaf")
            .named("n", Pattern::of(builtin::integer()))
            .body(|ctx| Ok(Value::int(int(ctx, 0)? * 10)))
            .unwrap(),
    );
    let negated = scaled.variant("walk_negated");
    negated.register(
        Signature::build("negative")
            .named(
                "n",
                Pattern::dependent(
                    Pattern::of(builtin::integer()),
                    Guard::new("n < 0", |v| v.as_int().is_some_and(|n| n < 0)),
                ),
            )
            .body(|_| Ok(Value::int(0)))
            .unwrap(),
    );

    let tree = Value::list([Value::int(-4), Value::list([Value::int(2)])]);
    assert_eq!(negated.call(vec![tree.clone()]).unwrap(), Value::int(20));
    assert_eq!(scaled.call(vec![tree]).unwrap(), Value::int(-20));
}

fn int_guard(name: &str, check: fn(i64) -> bool) -> Pattern {
    Pattern::dependent(
        Pattern::of(builtin::integer()),
        Guard::new(name, move |v| v.as_int().is_some_and(check)),
    )
}

#[test]
fn test_overlapping_guards_are_runtime_ambiguity() {
    let engine = Engine::new();
    engine.register(
        "classify",
        Signature::build("positive")
            .named("n", int_guard("n > 0", |n| n > 0))
            .body(label_body("positive"))
            .unwrap(),
    );
    engine.register(
        "classify",
        Signature::build("even")
            .named("n", int_guard("n % 2 == 0", |n| n % 2 == 0))
            .body(label_body("even"))
            .unwrap(),
    );
    engine.register(
        "classify",
        Signature::build("number")
            .named("n", Pattern::of(builtin::number()))
            .body(label_body("number"))
            .unwrap(),
    );

    let classify = |n: i64| engine.dispatch("classify", vec![Value::int(n)]);
    assert_eq!(classify(3).unwrap(), Value::str("positive"));
    assert_eq!(classify(-2).unwrap(), Value::str("even"));
    assert_eq!(classify(-3).unwrap(), Value::str("number"));

    let err = classify(4).unwrap_err();
    match &err {
        DispatchError::RuntimeAmbiguity { operation, candidates, .. } => {
            assert_eq!(operation, "classify");
            let labels: Vec<_> = candidates.iter().map(|c| c.label.as_str()).collect();
            assert_eq!(labels, ["positive", "even"]);
        }
        other => panic!("Expected RuntimeAmbiguity, got {:?}", other),
    }
    assert!(err.to_string().starts_with("ambiguous guards in `classify`"));

    // The same operation called directly reports the same ambiguity.
    let op = engine.get("classify").unwrap();
    assert!(matches!(
        op.call(vec![Value::int(8)]),
        Err(DispatchError::RuntimeAmbiguity { .. })
    ));
}

fn chained(label: &'static str, pattern: Pattern) -> Signature {
    Signature::build(label)
        .named("n", pattern)
        .body(move |ctx| {
            let rest = ctx.call_next()?;
            Ok(Value::str(format!("{label}>{}", rest.as_str().unwrap_or_default())))
        })
        .unwrap()
}

#[test]
fn test_call_next_leaves_guarded_group() {
    let h = Operation::new("h");
    h.register(chained("positive", int_guard("n > 0", |n| n > 0)));
    h.register(chained(
        "small",
        Pattern::dependent(
            Pattern::of(builtin::number()),
            Guard::new("n < 10", |v| v.as_float().is_some_and(|n| n < 10.0)),
        ),
    ));
    h.register(
        Signature::build("number")
            .named("n", Pattern::of(builtin::number()))
            .body(label_body("number"))
            .unwrap(),
    );

    // The next guarded layer re-evaluates its guard; a rejection falls through.
    assert_eq!(
        h.call(vec![Value::int(5)]).unwrap(),
        Value::str("positive>small>number")
    );
    assert_eq!(h.call(vec![Value::int(50)]).unwrap(), Value::str("positive>number"));
    assert_eq!(h.call(vec![Value::int(-1)]).unwrap(), Value::str("small>number"));

    // Continuing from the last candidate exhausts the chain.
    let tail = Operation::new("tail");
    tail.register(chained("only", int_guard("n > 0", |n| n > 0)));
    match tail.call(vec![Value::int(1)]) {
        Err(DispatchError::ExhaustedChain { after, .. }) => assert_eq!(after, "only"),
        other => panic!("Expected ExhaustedChain, got {:?}", other),
    }
}

#[test]
fn test_guarded_layer_prefers_its_plain_member() {
    let f = Operation::new("f");
    f.register(
        Signature::build("positive_int")
            .named("x", int_guard("n > 0", |n| n > 0))
            .named("y", Pattern::of(builtin::integer()))
            .body(label_body("positive_int"))
            .unwrap(),
    );
    f.register(
        Signature::build("int_int")
            .named("x", Pattern::of(builtin::integer()))
            .named("y", Pattern::of(builtin::integer()))
            .body(label_body("int_int"))
            .unwrap(),
    );
    f.register(
        Signature::build("object_exact")
            .named("x", Pattern::of(builtin::object()))
            .named("y", Pattern::exact(builtin::integer()))
            .body(label_body("object_exact"))
            .unwrap(),
    );

    // `int_int` sits a layer below `positive_int`; `object_exact` shares the
    // guarded layer and wins once the guard rejects.
    assert_eq!(
        f.call(vec![Value::int(-1), Value::int(1)]).unwrap(),
        Value::str("object_exact")
    );
    assert!(matches!(
        f.call(vec![Value::int(1), Value::int(1)]),
        Err(DispatchError::RuntimeAmbiguity { .. })
    ));
}
