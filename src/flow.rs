//! The streaming sequence primitive underlying lazy evaluation.
//!
//! A [`Flow`] is an append-only sequence of keyed values that may still be
//! produced while it is being consumed. Its history is a singly-linked list
//! of cells; once a cell's `next` pointer is set it never changes, so any
//! number of listeners can walk the history independently. Every listener
//! starts at the first cell and sees the full sequence regardless of when it
//! attached - including after the flow has ended.
//!
//! Delivery is strictly sequential per listener: a listener processes one
//! value at a time, in append order, with no gaps, until it reaches the
//! flow's end or error terminal. Listeners that run out of available data
//! on a live flow park themselves on the flow's shared state and are woken
//! by the next `push` or `end`.
//!
//! Derived flows (`map`, `filter`, `concat`, `flatten`) are pull-driven:
//! they carry a producer future that a listener polls before parking, so
//! consuming a derived flow is what advances its upstream chain. `find` and
//! `reduce` consume a flow directly and resolve to a single value.
//!
//! Pushing after `end`, ending twice, and listening to a `close`d flow are
//! protocol violations and fail with [`FlowError`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, poll_fn};

use crate::error::{EvalError, FlowError};
use crate::value::{Value, type_name};

/// How a flow materializes: as a list or as a keyed map.
///
/// One generic flow type covers both; the shape only matters at the moment
/// the flow is resolved into a plain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Array,
    Object,
}

/// One cell of a flow's history. `next` is written exactly once.
struct FlowNode {
    key: Value,
    value: Value,
    next: RefCell<Option<Rc<FlowNode>>>,
}

/// State shared by a flow and all of its listeners.
#[derive(Default)]
struct FlowState {
    ended: bool,
    closed: bool,
    error: Option<EvalError>,
    /// Listeners parked waiting for data, as wakers
    wakers: Vec<Waker>,
    /// Bumped on every push/end so a listener can tell whether driving the
    /// producer made progress
    version: u64,
}

struct FlowInner {
    shape: Shape,
    head: RefCell<Option<Rc<FlowNode>>>,
    tail: RefCell<Option<Rc<FlowNode>>>,
    next_index: Cell<i64>,
    state: RefCell<FlowState>,
    producer: RefCell<Option<LocalBoxFuture<'static, ()>>>,
}

/// An append-only, multi-listener, possibly still-producing value sequence.
///
/// Cloning a `Flow` clones a handle; all clones share one history.
#[derive(Clone)]
pub struct Flow {
    inner: Rc<FlowInner>,
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Flow")
            .field("shape", &self.inner.shape)
            .field("ended", &state.ended)
            .finish_non_exhaustive()
    }
}

impl Flow {
    pub fn new(shape: Shape) -> Flow {
        Flow {
            inner: Rc::new(FlowInner {
                shape,
                head: RefCell::new(None),
                tail: RefCell::new(None),
                next_index: Cell::new(0),
                state: RefCell::new(FlowState::default()),
                producer: RefCell::new(None),
            }),
        }
    }

    /// Wraps a value as a flow: arrays and objects become ended flows, an
    /// existing flow is passed through so unended sources work transparently.
    pub fn from_value(value: Value) -> Result<Flow, EvalError> {
        match value {
            Value::Flow(flow) => Ok(flow),
            Value::Array(items) => {
                let flow = Flow::new(Shape::Array);
                for item in items {
                    flow.push(item)?;
                }
                flow.end()?;
                Ok(flow)
            }
            Value::Object(map) => {
                let flow = Flow::new(Shape::Object);
                for (key, item) in map {
                    flow.push_keyed(Value::String(key), item)?;
                }
                flow.end()?;
                Ok(flow)
            }
            other => Err(EvalError::NotIterable(type_name(&other).to_string())),
        }
    }

    pub fn shape(&self) -> Shape {
        self.inner.shape
    }

    /// True when this handle and `other` share one history.
    pub fn same(&self, other: &Flow) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_ended(&self) -> bool {
        self.inner.state.borrow().ended
    }

    /// Appends a value under the next sequential index.
    pub fn push(&self, value: Value) -> Result<(), FlowError> {
        let index = self.inner.next_index.get();
        self.push_keyed(Value::Integer(index), value)?;
        self.inner.next_index.set(index + 1);
        Ok(())
    }

    /// Appends a value under an explicit key.
    pub fn push_keyed(&self, key: Value, value: Value) -> Result<(), FlowError> {
        {
            let state = self.inner.state.borrow();
            if state.ended {
                return Err(FlowError::Ended);
            }
            if state.closed {
                return Err(FlowError::Closed);
            }
        }
        let node = Rc::new(FlowNode {
            key,
            value,
            next: RefCell::new(None),
        });
        {
            let mut tail = self.inner.tail.borrow_mut();
            match tail.take() {
                Some(prev) => *prev.next.borrow_mut() = Some(Rc::clone(&node)),
                None => *self.inner.head.borrow_mut() = Some(Rc::clone(&node)),
            }
            *tail = Some(node);
        }
        self.wake();
        Ok(())
    }

    /// Marks the flow complete. No push may follow.
    pub fn end(&self) -> Result<(), FlowError> {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.ended {
                return Err(FlowError::Ended);
            }
            state.ended = true;
        }
        self.wake();
        Ok(())
    }

    /// Marks the flow complete with an error. Every listener, present and
    /// future, observes the error exactly once.
    pub fn fail(&self, error: EvalError) -> Result<(), FlowError> {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.ended {
                return Err(FlowError::Ended);
            }
            state.ended = true;
            state.error = Some(error);
        }
        self.wake();
        Ok(())
    }

    /// Releases the flow's history. Listening afterwards is an error.
    pub fn close(&self) -> Result<(), FlowError> {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.closed {
                return Err(FlowError::Closed);
            }
            state.closed = true;
        }
        *self.inner.head.borrow_mut() = None;
        *self.inner.tail.borrow_mut() = None;
        self.wake();
        Ok(())
    }

    /// Attaches a listener positioned before the first cell.
    pub fn listen(&self) -> Result<Listener, FlowError> {
        if self.inner.state.borrow().closed {
            return Err(FlowError::Closed);
        }
        Ok(Listener {
            flow: self.clone(),
            node: None,
        })
    }

    fn wake(&self) {
        let wakers = {
            let mut state = self.inner.state.borrow_mut();
            state.version = state.version.wrapping_add(1);
            std::mem::take(&mut state.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
    }

    fn version(&self) -> u64 {
        self.inner.state.borrow().version
    }

    fn park(&self, waker: &Waker) {
        self.inner.state.borrow_mut().wakers.push(waker.clone());
    }

    /// Polls the producer, if any. A reentrant poll (the producer consuming
    /// its own output) is skipped; the borrow guard makes that observable.
    fn drive(&self, cx: &mut Context<'_>) {
        let Ok(mut slot) = self.inner.producer.try_borrow_mut() else {
            return;
        };
        if let Some(producer) = slot.as_mut()
            && producer.as_mut().poll(cx).is_ready()
        {
            *slot = None;
        }
    }

    pub(crate) fn set_producer(&self, producer: LocalBoxFuture<'static, ()>) {
        *self.inner.producer.borrow_mut() = Some(producer);
    }

    fn sink(&self) -> Sink {
        Sink {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// A flow whose values are `f` applied to this flow's values. Keys are
    /// preserved, as is the shape.
    pub fn map<F>(&self, f: F) -> Flow
    where
        F: FnMut(Value, Value) -> LocalBoxFuture<'static, Result<Value, EvalError>> + 'static,
    {
        let out = Flow::new(self.shape());
        let sink = out.sink();
        let source = self.listen();
        out.set_producer(
            async move {
                let mut f = f;
                let mut source = match source {
                    Ok(listener) => listener,
                    Err(err) => return sink.fail(err.into()),
                };
                loop {
                    match source.next().await {
                        Ok(Some((key, value))) => match f(value, key.clone()).await {
                            Ok(mapped) => sink.push_keyed(key, mapped),
                            Err(err) => return sink.fail(err),
                        },
                        Ok(None) => return sink.end(),
                        Err(err) => return sink.fail(err),
                    }
                }
            }
            .boxed_local(),
        );
        out
    }

    /// A flow holding only the values for which `predicate` resolves true.
    pub fn filter<F>(&self, predicate: F) -> Flow
    where
        F: FnMut(Value, Value) -> LocalBoxFuture<'static, Result<bool, EvalError>> + 'static,
    {
        let out = Flow::new(self.shape());
        let sink = out.sink();
        let source = self.listen();
        out.set_producer(
            async move {
                let mut predicate = predicate;
                let mut source = match source {
                    Ok(listener) => listener,
                    Err(err) => return sink.fail(err.into()),
                };
                loop {
                    match source.next().await {
                        Ok(Some((key, value))) => {
                            match predicate(value.clone(), key.clone()).await {
                                Ok(true) => sink.push_keyed(key, value),
                                Ok(false) => {}
                                Err(err) => return sink.fail(err),
                            }
                        }
                        Ok(None) => return sink.end(),
                        Err(err) => return sink.fail(err),
                    }
                }
            }
            .boxed_local(),
        );
        out
    }

    /// Resolves to the first value for which `predicate` resolves true, or
    /// `Undefined` when the flow ends without a match.
    pub async fn find<F>(&self, mut predicate: F) -> Result<Value, EvalError>
    where
        F: FnMut(Value, Value) -> LocalBoxFuture<'static, Result<bool, EvalError>>,
    {
        let mut source = self.listen()?;
        while let Some((key, value)) = source.next().await? {
            if predicate(value.clone(), key).await? {
                return Ok(value);
            }
        }
        Ok(Value::Undefined)
    }

    /// Left-folds the flow. `step` receives the accumulator, the value, and
    /// the key, strictly in sequence: each step completes before the next
    /// value is delivered.
    pub async fn reduce<F>(&self, mut step: F, initial: Value) -> Result<Value, EvalError>
    where
        F: FnMut(Value, Value, Value) -> LocalBoxFuture<'static, Result<Value, EvalError>>,
    {
        let mut accumulator = initial;
        let mut source = self.listen()?;
        while let Some((key, value)) = source.next().await? {
            accumulator = step(accumulator, value, key).await?;
        }
        Ok(accumulator)
    }

    /// A flow delivering this flow's values followed by `other`'s, renumbered.
    pub fn concat(&self, other: &Flow) -> Flow {
        let out = Flow::new(Shape::Array);
        let sink = out.sink();
        let sources = [self.listen(), other.listen()];
        out.set_producer(
            async move {
                for source in sources {
                    let mut source = match source {
                        Ok(listener) => listener,
                        Err(err) => return sink.fail(err.into()),
                    };
                    loop {
                        match source.next().await {
                            Ok(Some((_key, value))) => sink.push(value),
                            Ok(None) => break,
                            Err(err) => return sink.fail(err),
                        }
                    }
                }
                sink.end();
            }
            .boxed_local(),
        );
        out
    }

    /// A flow whose nested flows and arrays are spliced into the sequence,
    /// in order, as their elements resolve.
    pub fn flatten(&self) -> Flow {
        let out = Flow::new(Shape::Array);
        let sink = out.sink();
        let source = self.listen();
        out.set_producer(
            async move {
                let mut source = match source {
                    Ok(listener) => listener,
                    Err(err) => return sink.fail(err.into()),
                };
                loop {
                    match source.next().await {
                        Ok(Some((_key, value))) => match value {
                            Value::Flow(nested) => {
                                let mut inner = match nested.listen() {
                                    Ok(listener) => listener,
                                    Err(err) => return sink.fail(err.into()),
                                };
                                loop {
                                    match inner.next().await {
                                        Ok(Some((_k, v))) => sink.push(v),
                                        Ok(None) => break,
                                        Err(err) => return sink.fail(err),
                                    }
                                }
                            }
                            Value::Array(items) => {
                                for item in items {
                                    sink.push(item);
                                }
                            }
                            other => sink.push(other),
                        },
                        Ok(None) => return sink.end(),
                        Err(err) => return sink.fail(err),
                    }
                }
            }
            .boxed_local(),
        );
        out
    }
}

/// A sequential consumer of one flow.
///
/// `next` resolves with the next `(key, value)` pair, with `None` at the end
/// terminal, or with the flow's error. A listener on a live flow with no
/// remaining data first drives the flow's producer, then parks until woken.
pub struct Listener {
    flow: Flow,
    node: Option<Rc<FlowNode>>,
}

impl Listener {
    fn peek(&self) -> Option<Rc<FlowNode>> {
        match &self.node {
            Some(node) => node.next.borrow().clone(),
            None => self.flow.inner.head.borrow().clone(),
        }
    }

    pub fn poll_next(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<(Value, Value)>, EvalError>> {
        loop {
            if let Some(next) = self.peek() {
                let item = (next.key.clone(), next.value.clone());
                self.node = Some(next);
                return Poll::Ready(Ok(Some(item)));
            }
            {
                let state = self.flow.inner.state.borrow();
                if state.closed {
                    return Poll::Ready(Err(EvalError::Flow(FlowError::Closed)));
                }
                if let Some(error) = &state.error {
                    return Poll::Ready(Err(error.clone()));
                }
                if state.ended {
                    return Poll::Ready(Ok(None));
                }
            }
            let before = self.flow.version();
            self.flow.drive(cx);
            if self.flow.version() != before {
                continue;
            }
            self.flow.park(cx.waker());
            return Poll::Pending;
        }
    }

    /// The next value in sequence, `None` at the end terminal.
    pub async fn next(&mut self) -> Result<Option<(Value, Value)>, EvalError> {
        poll_fn(|cx| self.poll_next(cx)).await
    }
}

/// Weak producer-side handle. Outcomes are ignored: a derived flow that was
/// dropped by every consumer has no one left to notify.
struct Sink {
    inner: Weak<FlowInner>,
}

impl Sink {
    fn push(&self, value: Value) {
        if let Some(inner) = self.inner.upgrade() {
            let _ = Flow { inner }.push(value);
        }
    }

    fn push_keyed(&self, key: Value, value: Value) {
        if let Some(inner) = self.inner.upgrade() {
            let _ = Flow { inner }.push_keyed(key, value);
        }
    }

    fn end(&self) {
        if let Some(inner) = self.inner.upgrade() {
            let _ = Flow { inner }.end();
        }
    }

    fn fail(&self, error: EvalError) {
        if let Some(inner) = self.inner.upgrade() {
            let _ = Flow { inner }.fail(error);
        }
    }
}
