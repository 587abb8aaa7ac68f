use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use futures::executor::{LocalPool, block_on};
use futures::task::LocalSpawnExt;

use rill_lang::evaluator::resolve::materialize;
use rill_lang::{EvalError, Flow, FlowError, Shape, Value};

fn ints(ns: &[i64]) -> Vec<Value> {
    ns.iter().map(|&n| Value::Integer(n)).collect()
}

fn ended_flow(ns: &[i64]) -> Flow {
    let flow = Flow::new(Shape::Array);
    for &n in ns {
        flow.push(Value::Integer(n)).unwrap();
    }
    flow.end().unwrap();
    flow
}

/// Spawns a listener that records every delivered value and counts end
/// notifications.
fn spawn_collector(
    pool: &mut LocalPool,
    flow: &Flow,
) -> (Rc<RefCell<Vec<Value>>>, Rc<Cell<usize>>) {
    let results = Rc::new(RefCell::new(Vec::new()));
    let ends = Rc::new(Cell::new(0));
    let flow = flow.clone();
    let task_results = results.clone();
    let task_ends = ends.clone();
    pool.spawner()
        .spawn_local(async move {
            let mut listener = flow.listen().unwrap();
            loop {
                match listener.next().await {
                    Ok(Some((_key, value))) => task_results.borrow_mut().push(value),
                    Ok(None) => {
                        task_ends.set(task_ends.get() + 1);
                        break;
                    }
                    Err(_) => break,
                }
            }
        })
        .unwrap();
    (results, ends)
}

#[test]
fn a_listener_sees_the_full_history() {
    let flow = ended_flow(&[1, 2, 3]);
    let value = block_on(materialize(Value::Flow(flow))).unwrap();
    assert_eq!(value, Value::Array(ints(&[1, 2, 3])));
}

#[test]
fn a_late_listener_still_sees_everything() {
    let flow = ended_flow(&[1, 2, 3]);
    // First consumer exhausts the flow
    let first = block_on(materialize(Value::Flow(flow.clone()))).unwrap();
    assert_eq!(first, Value::Array(ints(&[1, 2, 3])));
    // A listener attached after the end gets the same sequence
    let second = block_on(materialize(Value::Flow(flow))).unwrap();
    assert_eq!(second, Value::Array(ints(&[1, 2, 3])));
}

#[test]
fn a_parked_listener_wakes_on_push() {
    let mut pool = LocalPool::new();
    let flow = Flow::new(Shape::Array);
    let (results, ends) = spawn_collector(&mut pool, &flow);

    pool.run_until_stalled();
    assert!(results.borrow().is_empty());
    assert_eq!(ends.get(), 0);

    flow.push(Value::Integer(1)).unwrap();
    pool.run_until_stalled();
    assert_eq!(*results.borrow(), ints(&[1]));

    flow.push(Value::Integer(2)).unwrap();
    flow.push(Value::Integer(3)).unwrap();
    pool.run_until_stalled();
    assert_eq!(*results.borrow(), ints(&[1, 2, 3]));
    assert_eq!(ends.get(), 0);

    flow.end().unwrap();
    pool.run_until_stalled();
    assert_eq!(ends.get(), 1);
    assert_eq!(*results.borrow(), ints(&[1, 2, 3]));
}

#[test]
fn deliveries_are_ordered_with_no_gaps_per_listener() {
    let mut pool = LocalPool::new();
    let flow = Flow::new(Shape::Array);
    let (first, first_ends) = spawn_collector(&mut pool, &flow);
    for n in 0..50 {
        flow.push(Value::Integer(n)).unwrap();
    }
    pool.run_until_stalled();
    // A second listener joins mid-production and still starts from zero
    let (second, second_ends) = spawn_collector(&mut pool, &flow);
    for n in 50..100 {
        flow.push(Value::Integer(n)).unwrap();
    }
    flow.end().unwrap();
    pool.run();

    let expected: Vec<Value> = (0..100).map(Value::Integer).collect();
    assert_eq!(*first.borrow(), expected);
    assert_eq!(*second.borrow(), expected);
    assert_eq!(first_ends.get(), 1);
    assert_eq!(second_ends.get(), 1);
}

#[test]
fn push_after_end_fails() {
    let flow = Flow::new(Shape::Array);
    flow.push(Value::Integer(1)).unwrap();
    flow.end().unwrap();
    assert_eq!(flow.push(Value::Integer(2)), Err(FlowError::Ended));
}

#[test]
fn double_end_fails() {
    let flow = Flow::new(Shape::Array);
    flow.end().unwrap();
    assert_eq!(flow.end(), Err(FlowError::Ended));
}

#[test]
fn listening_to_a_closed_flow_fails() {
    let flow = ended_flow(&[1]);
    flow.close().unwrap();
    assert!(matches!(flow.listen(), Err(FlowError::Closed)));
    assert_eq!(flow.close(), Err(FlowError::Closed));
}

#[test]
fn an_error_reaches_every_listener_once() {
    let mut pool = LocalPool::new();
    let flow = Flow::new(Shape::Array);
    let errors = Rc::new(Cell::new(0));
    for _ in 0..2 {
        let flow = flow.clone();
        let errors = errors.clone();
        pool.spawner()
            .spawn_local(async move {
                let mut listener = flow.listen().unwrap();
                loop {
                    match listener.next().await {
                        Ok(Some(_)) => {}
                        Ok(None) => break,
                        Err(err) => {
                            assert_eq!(err, EvalError::DivisionByZero);
                            errors.set(errors.get() + 1);
                            break;
                        }
                    }
                }
            })
            .unwrap();
    }
    flow.push(Value::Integer(1)).unwrap();
    flow.fail(EvalError::DivisionByZero).unwrap();
    pool.run();
    assert_eq!(errors.get(), 2);
}

#[test]
fn map_transforms_each_value() {
    let flow = ended_flow(&[1, 2, 3]);
    let doubled = flow.map(|value, _key| {
        let result = match value {
            Value::Integer(n) => Value::Integer(n * 2),
            other => other,
        };
        async move { Ok(result) }.boxed_local()
    });
    let value = block_on(materialize(Value::Flow(doubled))).unwrap();
    assert_eq!(value, Value::Array(ints(&[2, 4, 6])));
}

#[test]
fn filter_keeps_matching_values() {
    let flow = ended_flow(&[1, 2, 3, 4, 5]);
    let evens = flow.filter(|value, _key| {
        let keep = matches!(value, Value::Integer(n) if n % 2 == 0);
        async move { Ok(keep) }.boxed_local()
    });
    let value = block_on(materialize(Value::Flow(evens))).unwrap();
    assert_eq!(value, Value::Array(ints(&[2, 4])));
}

#[test]
fn find_resolves_with_the_first_match() {
    let flow = ended_flow(&[1, 2, 3, 4, 5]);
    let found = block_on(flow.find(|value, _key| {
        let hit = matches!(value, Value::Integer(n) if n > 2);
        async move { Ok(hit) }.boxed_local()
    }))
    .unwrap();
    assert_eq!(found, Value::Integer(3));
}

#[test]
fn find_resolves_undefined_without_a_match() {
    let flow = ended_flow(&[1, 2, 3]);
    let found = block_on(flow.find(|_value, _key| async move { Ok(false) }.boxed_local())).unwrap();
    assert_eq!(found, Value::Undefined);
}

#[test]
fn reduce_folds_in_order() {
    let flow = ended_flow(&[1, 2, 3, 4, 5]);
    let total = block_on(flow.reduce(
        |acc, value, _key| {
            let result = rill_lang::ops::add(&acc, &value);
            async move { result }.boxed_local()
        },
        Value::Integer(0),
    ))
    .unwrap();
    assert_eq!(total, Value::Integer(15));
}

#[test]
fn concat_chains_two_flows() {
    let first = ended_flow(&[1, 2]);
    let second = ended_flow(&[3, 4]);
    let chained = first.concat(&second);
    let value = block_on(materialize(Value::Flow(chained))).unwrap();
    assert_eq!(value, Value::Array(ints(&[1, 2, 3, 4])));
}

#[test]
fn flatten_splices_nested_sequences() {
    let flow = Flow::new(Shape::Array);
    flow.push(Value::Integer(1)).unwrap();
    flow.push(Value::Array(ints(&[2, 3]))).unwrap();
    flow.push(Value::Flow(ended_flow(&[4, 5]))).unwrap();
    flow.push(Value::Integer(6)).unwrap();
    flow.end().unwrap();
    let flat = flow.flatten();
    let value = block_on(materialize(Value::Flow(flat))).unwrap();
    assert_eq!(value, Value::Array(ints(&[1, 2, 3, 4, 5, 6])));
}

#[test]
fn derived_flows_pull_their_source_lazily() {
    let mut pool = LocalPool::new();
    let source = Flow::new(Shape::Array);
    let mapped = source.map(|value, _key| {
        let result = match value {
            Value::Integer(n) => Value::Integer(n + 10),
            other => other,
        };
        async move { Ok(result) }.boxed_local()
    });
    let (results, ends) = spawn_collector(&mut pool, &mapped);

    pool.run_until_stalled();
    assert!(results.borrow().is_empty());

    source.push(Value::Integer(1)).unwrap();
    pool.run_until_stalled();
    assert_eq!(*results.borrow(), ints(&[11]));

    source.push(Value::Integer(2)).unwrap();
    source.end().unwrap();
    pool.run();
    assert_eq!(*results.borrow(), ints(&[11, 12]));
    assert_eq!(ends.get(), 1);
}

#[test]
fn object_flows_materialize_into_objects() {
    let flow = Flow::new(Shape::Object);
    flow.push_keyed(Value::String("foo".to_string()), Value::Integer(5))
        .unwrap();
    flow.push_keyed(Value::String("bar".to_string()), Value::Integer(7))
        .unwrap();
    flow.end().unwrap();
    let value = block_on(materialize(Value::Flow(flow))).unwrap();
    let Value::Object(map) = value else {
        panic!("expected an object");
    };
    assert_eq!(map.get("foo"), Some(&Value::Integer(5)));
    assert_eq!(map.get("bar"), Some(&Value::Integer(7)));
}

#[test]
fn from_value_passes_flows_through() {
    let flow = ended_flow(&[1]);
    let wrapped = Flow::from_value(Value::Flow(flow.clone())).unwrap();
    assert!(wrapped.same(&flow));
}

#[test]
fn from_value_rejects_scalars() {
    assert!(matches!(
        Flow::from_value(Value::Integer(20)),
        Err(EvalError::NotIterable(_))
    ));
}
