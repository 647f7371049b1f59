//! Core types for state machines

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::FlowError;
use crate::executor::Machine;

/// Event emitted by a state's entry action.
#[derive(Debug, Clone)]
pub enum Event {
    /// Emitted implicitly by states without an entry action
    Undefined,

    /// Domain event
    Named(String),

    /// A nested flow ran past its last state
    Exit,

    /// Error sentinel, carrying the original payload
    Error(FlowError),

    /// Jump straight to a state by name, bypassing transition matching
    Goto(String),
}

impl Event {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn goto(state: impl Into<String>) -> Self {
        Self::Goto(state.into())
    }

    /// Error event wrapping `cause`.
    pub fn error(cause: impl Into<anyhow::Error>) -> Self {
        Self::Error(FlowError::emitted(cause))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Named(name) => f.write_str(name),
            Self::Exit => f.write_str("exit"),
            Self::Error(err) => write!(f, "error({err})"),
            Self::Goto(state) => write!(f, "goto({state})"),
        }
    }
}

/// Left-hand side of a transition.
///
/// Domain strings always become [`Trigger::Named`]; the sentinels are only
/// reachable through their own variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    Undefined,
    Named(String),
    Exit,
    Error,
}

impl Trigger {
    pub fn matches(&self, event: &Event) -> bool {
        match (self, event) {
            (Self::Undefined, Event::Undefined) => true,
            (Self::Named(expected), Event::Named(actual)) => expected == actual,
            (Self::Exit, Event::Exit) => true,
            (Self::Error, Event::Error(_)) => true,
            _ => false,
        }
    }
}

impl From<&str> for Trigger {
    fn from(value: &str) -> Self {
        Self::Named(value.to_string())
    }
}

impl From<String> for Trigger {
    fn from(value: String) -> Self {
        Self::Named(value)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Named(name) => f.write_str(name),
            Self::Exit => f.write_str("exit"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Mutable bag threaded through every state of one machine run.
///
/// Holds JSON values by key plus at most one resource per type (page
/// handles, providers) that cannot be represented as JSON.
#[derive(Default)]
pub struct Context {
    values: Map<String, Value>,
    resources: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn insert_resource<T: Send + 'static>(&mut self, resource: T) -> Option<T> {
        self.resources
            .insert(TypeId::of::<T>(), Box::new(resource))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn resource<T: Send + 'static>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn resource_mut<T: Send + 'static>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    pub fn take_resource<T: Send + 'static>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values)
            .field("resources", &self.resources.len())
            .finish()
    }
}

/// Work run when a state becomes current; the returned event drives the
/// next transition. Returning `Err` is equivalent to emitting an error event.
#[async_trait]
pub trait EntryAction: Send + Sync {
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event>;
}

/// Entry action backed by a synchronous closure.
pub struct FnAction<F>(F);

#[async_trait]
impl<F> EntryAction for FnAction<F>
where
    F: Fn(&mut Context) -> anyhow::Result<Event> + Send + Sync,
{
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event> {
        (self.0)(ctx)
    }
}

pub fn action_fn<F>(f: F) -> FnAction<F>
where
    F: Fn(&mut Context) -> anyhow::Result<Event> + Send + Sync,
{
    FnAction(f)
}

/// What runs when a state is entered.
#[derive(Clone)]
pub enum Entry {
    Action(Arc<dyn EntryAction>),
    /// A whole machine run against the same context
    Machine(Arc<Machine>),
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(_) => f.write_str("Action"),
            Self::Machine(machine) => write!(f, "Machine({})", machine.name()),
        }
    }
}

/// A named state with an optional entry and its transitions.
#[derive(Clone, Debug)]
pub struct State {
    name: String,
    entry: Option<Entry>,
    transitions: Vec<(Trigger, String)>,
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: None,
            transitions: Vec::new(),
        }
    }

    /// Set the entry action
    pub fn on_entry(mut self, action: impl EntryAction + 'static) -> Self {
        self.entry = Some(Entry::Action(Arc::new(action)));
        self
    }

    pub fn on_entry_shared(mut self, action: Arc<dyn EntryAction>) -> Self {
        self.entry = Some(Entry::Action(action));
        self
    }

    /// Run `machine` as this state's entry
    pub fn nested(mut self, machine: Machine) -> Self {
        self.entry = Some(Entry::Machine(Arc::new(machine)));
        self
    }

    /// Add a transition
    pub fn transition(mut self, trigger: impl Into<Trigger>, target: impl Into<String>) -> Self {
        self.transitions.push((trigger.into(), target.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> Option<&Entry> {
        self.entry.as_ref()
    }

    pub fn transitions(&self) -> &[(Trigger, String)] {
        &self.transitions
    }

    /// First transition matching `event`.
    pub fn target_for(&self, event: &Event) -> Option<&str> {
        self.transitions
            .iter()
            .find(|(trigger, _)| trigger.matches(event))
            .map(|(_, target)| target.as_str())
    }
}

/// How a machine run ended.
#[derive(Debug, Clone)]
pub enum Termination {
    /// Ran past the last state of an ordered machine
    Exit,

    /// A transition named an unknown state
    NotFound(String),

    /// Reached `final`; carries the final event
    Final(Event),

    /// Reached `final` whose exit mapping hands control to an outer state
    Transfer(String),

    /// Unrouted error event or structural failure
    Error(FlowError),
}

impl Termination {
    /// Whether a top-level run finished cleanly. A `Transfer` only makes
    /// sense to an enclosing machine, so at the top level it is a failure.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exit | Self::Final(_))
    }

    /// Event an enclosing machine sees when this run is nested as a state.
    pub fn into_event(self) -> Event {
        match self {
            Self::Exit => Event::Exit,
            Self::NotFound(name) => Event::Error(FlowError::StateNotFound(name)),
            Self::Final(event) => event,
            Self::Transfer(target) => Event::Goto(target),
            Self::Error(err) => Event::Error(err),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit => f.write_str("exit"),
            Self::NotFound(name) => write!(f, "not-found:{name}"),
            Self::Final(event) => write!(f, "final({event})"),
            Self::Transfer(target) => write!(f, "transfer:{target}"),
            Self::Error(err) => write!(f, "error: {err}"),
        }
    }
}
