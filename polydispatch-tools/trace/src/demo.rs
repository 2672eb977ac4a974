//! Demo operations the tool can inspect.

use anyhow::Result;
use polydispatch::{
    builtin, CallContext, DispatchError, Engine, EngineConfig, Guard, Pattern, Protocol,
    Signature, SignatureError, Value,
};

fn int_arg(ctx: &CallContext<'_>, index: usize) -> Result<i64, DispatchError> {
    ctx.require(index)?
        .as_int()
        .ok_or_else(|| DispatchError::raised("expected an integer"))
}

fn text(label: &'static str, pattern: Pattern) -> Result<Signature, SignatureError> {
    Signature::build(label)
        .named("x", pattern)
        .body(move |_| Ok(Value::str(label)))
}

/// Build an engine holding every demo operation.
pub fn engine(config: EngineConfig) -> Result<Engine> {
    let engine = Engine::with_config(config);

    // describe: nominal ordering, protocols and type objects
    engine.register("describe", text("object", Pattern::of(builtin::object()))?);
    engine.register("describe", text("number", Pattern::of(builtin::number()))?);
    engine.register("describe", text("integer", Pattern::exact(builtin::integer()))?);
    engine.register(
        "describe",
        text("sized", Pattern::protocol(Protocol::has_methods(["len"])))?,
    );
    engine.register(
        "describe",
        text("numeric_type", Pattern::type_of(Pattern::of(builtin::number())))?,
    );

    // factorial: literal and guarded patterns with self-recursion
    engine.register(
        "factorial",
        Signature::build("zero")
            .named("n", Pattern::literal(0))
            .body(|_| Ok(Value::int(1)))?,
    );
    engine.register(
        "factorial",
        Signature::build("positive")
            .named(
                "n",
                Pattern::dependent(
                    Pattern::of(builtin::integer()),
                    Guard::new("n > 0", |v| v.as_int().is_some_and(|n| n > 0)),
                ),
            )
            .body(|ctx| {
                let n = int_arg(ctx, 0)?;
                let rest = ctx.recurse(vec![Value::int(n - 1)])?;
                Ok(Value::int(n.saturating_mul(rest.as_int().unwrap_or_default())))
            })?,
    );

    // shout: a priority wrapper around a base implementation
    engine.register("shout", text("base", Pattern::of(builtin::object()))?);
    engine.register(
        "shout",
        Signature::build("loud")
            .named("x", Pattern::of(builtin::object()))
            .priority(10)
            .body(|ctx| {
                let inner = ctx.call_next()?;
                Ok(Value::str(format!("{}!", inner.as_str().unwrap_or_default())))
            })?,
    );

    // pair: pointwise incomparable on (Integer, Integer)
    engine.register(
        "pair",
        Signature::build("object_integer")
            .named("x", Pattern::of(builtin::object()))
            .named("y", Pattern::of(builtin::integer()))
            .body(|_| Ok(Value::str("object_integer")))?,
    );
    engine.register(
        "pair",
        Signature::build("integer_object")
            .named("x", Pattern::of(builtin::integer()))
            .named("y", Pattern::of(builtin::object()))
            .body(|_| Ok(Value::str("integer_object")))?,
    );

    // walk / walk_scaled: a variant keeps recursion inside itself
    engine.register(
        "walk",
        Signature::build("list")
            .named("items", Pattern::of(builtin::list()))
            .body(|ctx| {
                let items = ctx
                    .require(0)?
                    .as_list()
                    .ok_or_else(|| DispatchError::raised("expected a list"))?;
                let mut total: i64 = 0;
                for item in items {
                    total += ctx.recurse(vec![item.clone()])?.as_int().unwrap_or_default();
                }
                Ok(Value::int(total))
            })?,
    );
    engine.register(
        "walk",
        Signature::build("leaf")
            .named("n", Pattern::of(builtin::integer()))
            .body(|ctx| Ok(Value::int(int_arg(ctx, 0)? + 1)))?,
    );
    let scaled = engine.variant("walk", "walk_scaled")?;
    scaled.register(
        Signature::build("leaf")
            .named("n", Pattern::of(builtin::integer()))
            .body(|ctx| Ok(Value::int(int_arg(ctx, 0)? * 10)))?,
    );

    Ok(engine)
}

/// Parse one command-line argument into a value.
///
/// JSON literals map onto values (`null`, booleans, numbers, strings,
/// arrays); anything else is taken as a bare string.
pub fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => from_json(&json),
        Err(_) => Value::str(raw),
    }
}

fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::int(i),
            None => Value::float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::str(s),
        serde_json::Value::Array(items) => Value::list(items.iter().map(from_json)),
        serde_json::Value::Object(_) => Value::str(json.to_string()),
    }
}
