use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;

use rill_lang::{Engine, Error, EvalError, Flow, Shape, Value};

fn obj(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = HashMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

fn ints(ns: &[i64]) -> Value {
    Value::Array(ns.iter().map(|&n| Value::Integer(n)).collect())
}

fn eval(expression: &str) -> Result<Value, Error> {
    Engine::new().eval(expression)
}

#[test]
fn resolves_simple_arithmetic() {
    assert_eq!(eval("2+2").unwrap(), Value::Integer(4));
}

#[test]
fn rejects_malformed_expressions() {
    assert!(eval("2++2").is_err());
}

#[test]
fn has_proper_order_of_operations() {
    assert_eq!(eval("5 + 12/4 + 5%2 + 2^3 - 2").unwrap(), Value::Integer(15));
}

#[test]
fn divides_inexactly_into_floats() {
    assert_eq!(eval("7/2").unwrap(), Value::Float(3.5));
    assert_eq!(eval("8/2").unwrap(), Value::Integer(4));
}

#[test]
fn preserves_integers_through_mixed_arithmetic() {
    assert!(matches!(eval("2 + 2.0").unwrap(), Value::Integer(4)));
    assert!(matches!(eval("2.5 * 2").unwrap(), Value::Integer(5)));
    assert_eq!(eval("2 + 0.5").unwrap(), Value::Float(2.5));
}

#[test]
fn division_by_zero_is_an_error() {
    assert!(matches!(
        eval("1/0"),
        Err(Error::Eval(EvalError::DivisionByZero))
    ));
}

#[test]
fn evaluates_not_comparison_and_inequality() {
    assert_eq!(eval("!5 != (3 < 5)").unwrap(), Value::Boolean(true));
}

#[test]
fn concatenates_strings_with_plus() {
    assert_eq!(
        eval("\"foo\" + \"bar\"").unwrap(),
        Value::String("foobar".to_string())
    );
}

#[test]
fn evaluates_logical_operators() {
    assert_eq!(eval("true && false").unwrap(), Value::Boolean(false));
    assert_eq!(eval("5 || 0").unwrap(), Value::Integer(5));
}

#[test]
fn evaluates_membership() {
    assert_eq!(eval("3 in [1,2,3]").unwrap(), Value::Boolean(true));
    assert_eq!(eval("\"ell\" in \"hello\"").unwrap(), Value::Boolean(true));
}

#[test]
fn passes_context() {
    let engine = Engine::new();
    let context = obj(vec![("foo", Value::String("bar".to_string()))]);
    assert_eq!(
        engine.eval_in("foo", &context).unwrap(),
        Value::String("bar".to_string())
    );
}

#[test]
fn missing_context_keys_are_undefined() {
    assert_eq!(eval("foo").unwrap(), Value::Undefined);
    assert_eq!(eval("foo.bar").unwrap(), Value::Undefined);
}

#[test]
fn accesses_properties_of_object_literals() {
    assert_eq!(eval("{foo: 5}.foo").unwrap(), Value::Integer(5));
}

#[test]
fn traverses_nested_context_objects() {
    let engine = Engine::new();
    let context = obj(vec![(
        "user",
        obj(vec![("name", Value::String("ada".to_string()))]),
    )]);
    assert_eq!(
        engine.eval_in("user.name", &context).unwrap(),
        Value::String("ada".to_string())
    );
}

#[test]
fn evaluates_array_literals() {
    assert_eq!(eval("[1,2,3]").unwrap(), ints(&[1, 2, 3]));
}

#[test]
fn evaluates_conditionals() {
    assert_eq!(eval("1 > 0 ? 'yes' : 'no'").unwrap(), Value::String("yes".to_string()));
    assert_eq!(eval("0 > 1 ? 'yes' : 'no'").unwrap(), Value::String("no".to_string()));
}

#[test]
fn assigns_variables_to_the_evaluation_context() {
    assert_eq!(eval("foo=5+7; foo+3").unwrap(), Value::Integer(15));
}

#[test]
fn assigns_negative_numbers() {
    assert_eq!(eval("foo=-3; foo+3").unwrap(), Value::Integer(0));
}

#[test]
fn assigns_multiple_variables() {
    assert_eq!(eval("foo=5+7; bar=foo*2; bar").unwrap(), Value::Integer(24));
}

#[test]
fn assigns_successively() {
    assert_eq!(
        eval("foo=1; bar=foo*2; baz=foo+bar; baz*bar").unwrap(),
        Value::Integer(6)
    );
}

#[test]
fn never_mutates_the_supplied_context() {
    let engine = Engine::new();
    let context = obj(vec![]);
    let result = engine.eval_in("foo=5+7; bar=foo*2; bar", &context).unwrap();
    assert_eq!(result, Value::Integer(24));
    let Value::Object(map) = context else {
        panic!("expected an object");
    };
    assert_eq!(map.len(), 0);
}

#[test]
fn rejects_reassignment_and_self_reference_at_compile_time() {
    assert!(eval("foo=5; foo=6; foo").is_err());
    assert!(eval("foo=foo;foo").is_err());
    assert!(Engine::new().compile("foo=foo;foo").is_err());
}

#[test]
fn type_declarations_bind_like_variables() {
    let engine = Engine::new();
    let context = obj(vec![
        ("red", Value::String("red".to_string())),
        ("blue", Value::String("blue".to_string())),
    ]);
    assert_eq!(
        engine.eval_in("Color = red | blue; Color", &context).unwrap(),
        Value::String("red".to_string())
    );
}

#[test]
fn unions_fall_through_undefined_alternatives() {
    let engine = Engine::new();
    let context = obj(vec![("blue", Value::String("blue".to_string()))]);
    assert_eq!(
        engine.eval_in("Color = red | blue; Color", &context).unwrap(),
        Value::String("blue".to_string())
    );
}

#[test]
fn collects_over_an_array() {
    assert_eq!(eval("[3,5,7] <| @ + # |>").unwrap(), ints(&[3, 6, 9]));
}

#[test]
fn collects_over_an_object() {
    let result = eval("{foo: 5, bar: 7} <| @ + 2 |>").unwrap();
    assert_eq!(
        result,
        obj(vec![("foo", Value::Integer(7)), ("bar", Value::Integer(9))])
    );
}

#[test]
fn collect_over_a_scalar_is_an_error() {
    assert!(matches!(
        eval("20 <| @ + 2 |>"),
        Err(Error::Eval(EvalError::NotIterable(_)))
    ));
}

#[test]
fn collect_reads_the_ambient_context() {
    let engine = Engine::new();
    let context = obj(vec![("foo", Value::Integer(5))]);
    assert_eq!(
        engine.eval_in("[5,10] <| @ + foo |>", &context).unwrap(),
        ints(&[10, 15])
    );
}

#[test]
fn fused_sigils_read_element_properties() {
    let engine = Engine::new();
    let context = obj(vec![(
        "foo",
        Value::Array(vec![obj(vec![("bar", Value::Integer(5))])]),
    )]);
    assert_eq!(
        engine.eval_in("foo <| @bar + 2 |>", &context).unwrap(),
        ints(&[7])
    );
}

#[test]
fn collects_object_literals_and_chains() {
    assert_eq!(
        eval("[1,2,3] <| {num: @, inc: @} |> <| @num + @inc |>").unwrap(),
        ints(&[2, 4, 6])
    );
}

#[test]
fn collects_array_literals_per_element() {
    let engine = Engine::new();
    let context = obj(vec![(
        "foo",
        Value::Array(vec![obj(vec![
            ("bar", Value::Integer(5)),
            ("baz", Value::Integer(7)),
        ])]),
    )]);
    assert_eq!(
        engine.eval_in("foo <| [@bar, @baz] |>", &context).unwrap(),
        Value::Array(vec![ints(&[5, 7])])
    );
}

#[test]
fn omits_collect_results_marked_with_the_sentinel() {
    assert_eq!(eval("[1,2,3,4,5] <| @ > 2 ? ~ : @ |>").unwrap(), ints(&[1, 2]));
}

#[test]
fn finds_the_first_matching_element() {
    assert_eq!(
        eval("[1,2,3,4,5] <|* @ % 4 == 0 ? @ : ~ |>").unwrap(),
        Value::Integer(4)
    );
}

#[test]
fn find_without_a_match_is_undefined() {
    assert_eq!(
        eval("[1,2,3,4,5] <|* @ % 7 == 0 ? @ : ~ |>").unwrap(),
        Value::Undefined
    );
}

#[test]
fn reduces_with_a_seeded_accumulator() {
    assert_eq!(eval("[1,2,3,4,5] <| @ + $ , 0|>").unwrap(), Value::Integer(15));
}

#[test]
fn reduce_skips_omitted_steps() {
    assert_eq!(
        eval("[1,2,3,4,5] <| @ > 3 ? ~ : @ + $ , 0 |>").unwrap(),
        Value::Integer(6)
    );
}

#[test]
fn static_filters_gate_the_whole_subject() {
    let engine = Engine::new();
    let context = obj(vec![("foo", ints(&[1, 2, 3]))]);
    assert_eq!(engine.eval_in("foo[3>2]", &context).unwrap(), ints(&[1, 2, 3]));
    assert_eq!(engine.eval_in("foo[2>3]", &context).unwrap(), Value::Undefined);
}

#[test]
fn static_number_filters_index_arrays() {
    let engine = Engine::new();
    let context = obj(vec![("foo", ints(&[10, 20, 30]))]);
    assert_eq!(engine.eval_in("foo[1]", &context).unwrap(), Value::Integer(20));
    assert_eq!(engine.eval_in("foo[9]", &context).unwrap(), Value::Undefined);
}

#[test]
fn static_string_filters_key_objects() {
    assert_eq!(eval("{'foo': 5}['foo']").unwrap(), Value::Integer(5));
}

#[test]
fn relative_filters_keep_matching_elements() {
    let engine = Engine::new();
    let context = obj(vec![(
        "users",
        Value::Array(vec![
            obj(vec![("age", Value::Integer(18))]),
            obj(vec![("age", Value::Integer(34))]),
            obj(vec![("age", Value::Integer(12))]),
        ]),
    )]);
    let result = engine.eval_in("users[.age > 15]", &context).unwrap();
    let Value::Array(kept) = result else {
        panic!("expected an array");
    };
    assert_eq!(kept.len(), 2);
}

#[test]
fn compiled_expressions_are_reusable() {
    let engine = Engine::new();
    let expression = engine.compile("foo").unwrap();
    assert_eq!(
        expression
            .eval(&obj(vec![("foo", Value::Integer(5))]))
            .unwrap(),
        Value::Integer(5)
    );
    assert_eq!(
        expression
            .eval(&obj(vec![("foo", Value::Integer(0))]))
            .unwrap(),
        Value::Integer(0)
    );
}

#[test]
fn compile_rejects_invalid_tokens() {
    assert!(Engine::new().compile("9foo").is_err());
}

#[test]
fn callback_variant_reports_results() {
    let engine = Engine::new();
    let seen = Rc::new(RefCell::new(None));
    let sink = seen.clone();
    engine.eval_with_callback("2+2", &obj(vec![]), move |result| {
        *sink.borrow_mut() = Some(result);
    });
    assert_eq!(
        seen.borrow().clone().and_then(|r| r.ok()),
        Some(Value::Integer(4))
    );
}

#[test]
fn evaluates_once_per_context_in_an_array() {
    let engine = Engine::new();
    let contexts = Value::Array(vec![
        obj(vec![("x", Value::Integer(1))]),
        obj(vec![("x", Value::Integer(2))]),
        obj(vec![("x", Value::Integer(3))]),
    ]);
    assert_eq!(engine.eval_in("x + 2", &contexts).unwrap(), ints(&[3, 4, 5]));
}

#[test]
fn streams_results_in_order_with_one_end() {
    let engine = Engine::new();
    let contexts = Value::Array(vec![
        obj(vec![("x", Value::Integer(1))]),
        obj(vec![("x", Value::Integer(2))]),
        obj(vec![("x", Value::Integer(3))]),
    ]);
    let stream = engine.stream("x + 2", &contexts).unwrap();

    let mut pool = LocalPool::new();
    let results = Rc::new(RefCell::new(Vec::new()));
    let ends = Rc::new(Cell::new(0));
    let task_results = results.clone();
    let task_ends = ends.clone();
    pool.spawner()
        .spawn_local(async move {
            let mut listener = stream.listen().unwrap();
            loop {
                match listener.next().await {
                    Ok(Some((_key, value))) => task_results.borrow_mut().push(value),
                    Ok(None) => {
                        task_ends.set(task_ends.get() + 1);
                        break;
                    }
                    Err(err) => panic!("stream failed: {err}"),
                }
            }
        })
        .unwrap();
    pool.run();

    assert_eq!(
        *results.borrow(),
        vec![Value::Integer(3), Value::Integer(4), Value::Integer(5)]
    );
    assert_eq!(ends.get(), 1);
}

#[test]
fn streams_follow_a_live_source() {
    let engine = Engine::new();
    let source = Flow::new(Shape::Array);
    let stream = engine
        .stream("x + 2", &Value::Flow(source.clone()))
        .unwrap();

    let mut pool = LocalPool::new();
    let results = Rc::new(RefCell::new(Vec::new()));
    let task_results = results.clone();
    pool.spawner()
        .spawn_local(async move {
            let mut listener = stream.listen().unwrap();
            while let Ok(Some((_key, value))) = listener.next().await {
                task_results.borrow_mut().push(value);
            }
        })
        .unwrap();

    pool.run_until_stalled();
    assert!(results.borrow().is_empty());

    source.push(obj(vec![("x", Value::Integer(1))])).unwrap();
    pool.run_until_stalled();
    assert_eq!(*results.borrow(), vec![Value::Integer(3)]);

    source.push(obj(vec![("x", Value::Integer(2))])).unwrap();
    source.end().unwrap();
    pool.run();
    assert_eq!(*results.borrow(), vec![Value::Integer(3), Value::Integer(4)]);
}

#[test]
fn a_stream_can_feed_another_evaluation() {
    let engine = Engine::new();
    let contexts = Value::Array(vec![
        obj(vec![("x", Value::Integer(1))]),
        obj(vec![("x", Value::Integer(2))]),
        obj(vec![("x", Value::Integer(3))]),
    ]);
    let stream = engine.stream("{y: x + 2}", &contexts).unwrap();
    assert_eq!(
        engine.eval_in("y * 2", &Value::Flow(stream)).unwrap(),
        ints(&[6, 8, 10])
    );
}
