//! Embedding one ordered machine as a single state of another

use async_trait::async_trait;

use crate::errors::FlowError;
use crate::executor::Machine;
use crate::types::{Context, EntryAction, Event, State, Termination};

/// Entry action that runs an inner machine to completion and translates
/// its terminal into an event for the outer machine.
#[derive(Debug, Clone)]
pub struct Submachine {
    inner: Machine,
}

impl Submachine {
    pub fn new(inner: Machine) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Machine {
        &self.inner
    }
}

#[async_trait]
impl EntryAction for Submachine {
    async fn on_entry(&self, ctx: &mut Context) -> anyhow::Result<Event> {
        let termination = self.inner.run(ctx).await;
        Ok(translate(self.inner.name(), termination))
    }
}

/// Outer event for an inner terminal.
///
/// An unknown inner target becomes a jump in the outer namespace, `exit`
/// passes through for the outer transitions to decide, and everything else
/// is an error. Inner error payloads are kept.
pub fn translate(name: &str, termination: Termination) -> Event {
    match termination {
        Termination::NotFound(target) => Event::Goto(target),
        Termination::Exit => Event::Exit,
        Termination::Error(err) => Event::Error(err),
        other => Event::Error(FlowError::Submachine {
            name: name.to_string(),
            terminal: other.to_string(),
        }),
    }
}

/// State named `name` whose entry runs `inner`.
pub fn submachine(name: impl Into<String>, inner: Machine) -> State {
    State::new(name).on_entry(Submachine::new(inner))
}
