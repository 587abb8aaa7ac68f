use std::collections::HashMap;

use rill_lang::{Engine, Error, EvalError, Value};

fn obj(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = HashMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

#[test]
fn transforms_can_be_defined() {
    let mut engine = Engine::new();
    engine.add_transform("toCase", |value, args| {
        let upper = args
            .first()
            .and_then(|arg| match arg {
                Value::Object(map) => map.get("case").cloned(),
                _ => None,
            })
            .is_some_and(|case| case.as_string() == "upper");
        let s = value.as_string();
        Ok(Value::String(if upper {
            s.to_uppercase()
        } else {
            s.to_lowercase()
        }))
    });
    assert_eq!(
        engine.eval("\"hello\"|toCase({case:\"upper\"})").unwrap(),
        Value::String("HELLO".to_string())
    );
}

#[test]
fn transforms_can_be_retrieved() {
    let mut engine = Engine::new();
    engine.add_transform("ret2", |_value, _args| Ok(Value::Integer(2)));
    let transform = engine.get_transform("ret2").unwrap();
    assert_eq!(
        transform(&Value::Undefined, &[]).unwrap(),
        Value::Integer(2)
    );
    assert!(engine.get_transform("missing").is_none());
}

#[test]
fn transforms_chain() {
    let mut engine = Engine::new();
    engine.add_transform("add1", |value, _args| {
        rill_lang::ops::add(value, &Value::Integer(1))
    });
    engine.add_transform("add2", |value, _args| {
        rill_lang::ops::add(value, &Value::Integer(2))
    });
    assert_eq!(engine.eval("2|add1|add2").unwrap(), Value::Integer(5));
}

#[test]
fn unknown_transforms_are_errors() {
    let engine = Engine::new();
    assert!(matches!(
        engine.eval("5 | nope"),
        Err(Error::Eval(EvalError::UnknownTransform(name))) if name == "nope"
    ));
}

#[test]
fn failing_transforms_surface_through_the_result_channel() {
    let mut engine = Engine::new();
    engine.add_transform("throw", |_value, _args| {
        Err(EvalError::Transform("foo".to_string()))
    });
    assert!(engine.eval("5 | throw").is_err());

    let mut seen_err = false;
    engine.eval_with_callback("5 | throw", &obj(vec![]), |result| {
        seen_err = result.is_err();
    });
    assert!(seen_err);
}

#[test]
fn untaken_ternary_branches_never_run() {
    let mut engine = Engine::new();
    engine.add_transform("explode", |_value, _args| {
        Err(EvalError::Transform("the untaken branch ran".to_string()))
    });
    let context = obj(vec![("foo", Value::Integer(1))]);
    assert_eq!(
        engine
            .eval_in("foo ? {bar:\"tek\"} : \"baz\"|explode", &context)
            .unwrap(),
        obj(vec![("bar", Value::String("tek".to_string()))])
    );
    assert_eq!(
        engine
            .eval_in("foo ? \"baz\"|explode : 1", &context)
            .unwrap_err(),
        Error::Eval(EvalError::Transform("the untaken branch ran".to_string()))
    );
}

#[test]
fn transform_assignments_define_transforms() {
    let engine = Engine::new();
    assert_eq!(
        engine
            .eval("addDouble(num, i) |= num + 2*i; 5 | addDouble(3)")
            .unwrap(),
        Value::Integer(11)
    );
}

#[test]
fn transform_assignments_may_reduce() {
    let engine = Engine::new();
    assert_eq!(
        engine
            .eval("sum(arr) |= arr <| @ + $, 0 |>; [1,2,3,4,5] | sum")
            .unwrap(),
        Value::Integer(15)
    );
}

#[test]
fn expression_transforms_read_the_ambient_context() {
    let engine = Engine::new();
    let context = obj(vec![("base", Value::Integer(100))]);
    assert_eq!(
        engine
            .eval_in("shift(n) |= n + base; 5 | shift", &context)
            .unwrap(),
        Value::Integer(105)
    );
}

#[test]
fn juxtaposed_calls_apply_expression_transforms() {
    let engine = Engine::new();
    assert_eq!(
        engine
            .eval("addDouble(num, i) |= num + 2*i; addDouble 5 3")
            .unwrap(),
        Value::Integer(11)
    );
}

#[test]
fn binary_operators_can_be_defined() {
    let mut engine = Engine::new();
    engine.add_binary_op("_=", 20, |left, right| {
        Ok(Value::Boolean(
            left.as_string().to_lowercase() == right.as_string().to_lowercase(),
        ))
    });
    assert_eq!(
        engine.eval("\"FoO\" _= \"fOo\"").unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn binary_operators_observe_their_weight() {
    let mut engine = Engine::new();
    let double_sum = |left: &Value, right: &Value| match (left.as_int(), right.as_int()) {
        (Some(a), Some(b)) => Ok(Value::Integer(a * 2 + b * 2)),
        _ => Err(EvalError::TypeError("not numeric".to_string())),
    };
    engine.add_binary_op("**", 0, double_sum);
    engine.add_binary_op("***", 1000, double_sum);
    assert_eq!(engine.eval("1 + 2 ** 3 + 4").unwrap(), Value::Integer(20));
    assert_eq!(engine.eval("1 + 2 *** 3 + 4").unwrap(), Value::Integer(15));
}

#[test]
fn unary_operators_can_be_defined() {
    let mut engine = Engine::new();
    engine.add_unary_op("$", |right| match right.as_float() {
        Some(n) => Ok(Value::Integer(n.floor() as i64)),
        None => Err(EvalError::TypeError("not numeric".to_string())),
    });
    assert_eq!(engine.eval("$5.7 + 5").unwrap(), Value::Integer(10));
}

#[test]
fn binary_operators_can_be_removed() {
    let mut engine = Engine::new();
    engine.remove_op("+");
    assert!(engine.eval("1+2").is_err());
    assert_eq!(engine.eval("1*2").unwrap(), Value::Integer(2));
}

#[test]
fn unary_operators_can_be_removed() {
    let mut engine = Engine::new();
    engine.remove_op("!");
    assert!(engine.eval("!true").is_err());
}

#[test]
fn structural_elements_cannot_be_removed() {
    let mut engine = Engine::new();
    engine.remove_op("(");
    assert_eq!(engine.eval("(1+2)*2").unwrap(), Value::Integer(6));
}

#[test]
fn transforms_apply_after_filters() {
    let mut engine = Engine::new();
    engine.add_transform("id", |value, _args| Ok(value.clone()));
    assert_eq!(
        engine
            .eval("{foo: 5, bar: 7} | id[.foo > 3].bar")
            .unwrap(),
        Value::Integer(7)
    );
}

#[test]
fn transforms_receive_resolved_subjects() {
    let mut engine = Engine::new();
    engine.add_transform("len", |value, _args| match value {
        Value::Array(items) => Ok(Value::Integer(items.len() as i64)),
        _ => Err(EvalError::TypeError("not an array".to_string())),
    });
    // The collect result is still a flow when the transform applies
    assert_eq!(
        engine.eval("[1,2,3] <| @ + 1 |> | len").unwrap(),
        Value::Integer(3)
    );
}
