//! Machine executor implementation

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_recursion::async_recursion;
use futures::FutureExt;
use tracing::debug;

use crate::errors::FlowError;
use crate::types::{Context, Entry, Event, State, Termination};

/// Reserved name of the state a tree machine starts in.
pub const INITIAL: &str = "initial";
/// Reserved name of the state that ends a tree machine.
pub const FINAL: &str = "final";

/// How a state's transitions are matched against an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// First matching transition wins; unmatched events advance to the next
    /// state in declaration order.
    OrderedFallthrough,
    /// Exactly one transition may match; unmatched events end the machine.
    /// Execution starts at [`INITIAL`] and ends at [`FINAL`].
    ExactStrict,
}

/// A set of states run against one shared [`Context`].
#[derive(Debug, Clone)]
pub struct Machine {
    name: String,
    policy: MatchPolicy,
    states: Vec<State>,
}

enum Step {
    Jump(usize),
    Done(Termination),
}

impl Machine {
    /// Ordered machine starting at the first state.
    pub fn linear(name: impl Into<String>, states: Vec<State>) -> Self {
        Self {
            name: name.into(),
            policy: MatchPolicy::OrderedFallthrough,
            states,
        }
    }

    /// Named machine starting at `initial` and ending at `final`.
    pub fn tree(name: impl Into<String>, states: Vec<State>) -> Self {
        Self {
            name: name.into(),
            policy: MatchPolicy::ExactStrict,
            states,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.index_of(name).map(|idx| &self.states[idx])
    }

    /// Validate machine structure, including nested machines.
    pub fn validate(&self) -> Result<(), FlowError> {
        let mut seen = HashSet::new();
        for state in &self.states {
            if state.name().is_empty() {
                return Err(FlowError::InvalidStructure(format!(
                    "machine {} has a state without a name",
                    self.name
                )));
            }
            if !seen.insert(state.name()) {
                return Err(FlowError::InvalidStructure(format!(
                    "machine {} declares state {} twice",
                    self.name,
                    state.name()
                )));
            }
            if self.policy == MatchPolicy::ExactStrict {
                let mut triggers = HashSet::new();
                for (trigger, _) in state.transitions() {
                    if !triggers.insert(trigger) {
                        return Err(FlowError::InvalidStructure(format!(
                            "state {} maps event {} twice",
                            state.name(),
                            trigger
                        )));
                    }
                }
            }
            if let Some(Entry::Machine(nested)) = state.entry() {
                nested.validate()?;
            }
        }

        if self.policy == MatchPolicy::ExactStrict && self.index_of(INITIAL).is_none() {
            return Err(FlowError::InvalidStructure(format!(
                "machine {} has no {INITIAL} state",
                self.name
            )));
        }

        Ok(())
    }

    /// Run the machine to completion.
    ///
    /// Every transition yields to the runtime before the next state is
    /// entered, so arbitrarily long flows run at constant stack depth and
    /// other tasks get a chance to make progress between states.
    #[async_recursion]
    pub async fn run(&self, ctx: &mut Context) -> Termination {
        let mut cursor = match self.policy {
            MatchPolicy::OrderedFallthrough => 0,
            MatchPolicy::ExactStrict => match self.index_of(INITIAL) {
                Some(idx) => idx,
                None => return Termination::NotFound(INITIAL.to_string()),
            },
        };

        loop {
            let Some(state) = self.states.get(cursor) else {
                debug!(machine = %self.name, "ran past last state");
                return Termination::Exit;
            };
            debug!(machine = %self.name, state = %state.name(), "entering state");

            let event = self.enter(state, ctx).await;

            if self.policy == MatchPolicy::ExactStrict && state.name() == FINAL {
                let termination = self.finish(state, event);
                debug!(machine = %self.name, %termination, "machine finished");
                return termination;
            }

            match self.follow(cursor, state, event) {
                Step::Jump(next) => cursor = next,
                Step::Done(termination) => {
                    debug!(machine = %self.name, %termination, "machine terminated");
                    return termination;
                }
            }

            tokio::task::yield_now().await;
        }
    }

    async fn enter(&self, state: &State, ctx: &mut Context) -> Event {
        match state.entry() {
            None => Event::Undefined,
            Some(Entry::Machine(nested)) => nested.run(ctx).await.into_event(),
            Some(Entry::Action(action)) => {
                let outcome = AssertUnwindSafe(action.on_entry(ctx)).catch_unwind().await;
                match outcome {
                    Ok(Ok(event)) => event,
                    Ok(Err(cause)) => Event::Error(FlowError::Raised {
                        state: state.name().to_string(),
                        cause: Arc::new(cause),
                    }),
                    Err(panic) => Event::Error(FlowError::Panicked {
                        state: state.name().to_string(),
                        message: panic_message(panic.as_ref()),
                    }),
                }
            }
        }
    }

    fn follow(&self, cursor: usize, state: &State, event: Event) -> Step {
        if let Event::Goto(target) = &event {
            return self.jump(target);
        }
        if let Some(target) = state.target_for(&event) {
            return self.jump(target);
        }

        match (self.policy, event) {
            (_, Event::Error(err)) => Step::Done(Termination::Error(err)),
            (MatchPolicy::OrderedFallthrough, _) => Step::Jump(cursor + 1),
            (MatchPolicy::ExactStrict, event) => {
                Step::Done(Termination::Error(FlowError::NoTransition {
                    state: state.name().to_string(),
                    event: event.to_string(),
                }))
            }
        }
    }

    /// Final state of a tree machine: without transitions its event is the
    /// result, with transitions they map the event onto an outer state.
    fn finish(&self, state: &State, event: Event) -> Termination {
        if let Event::Goto(target) = event {
            return Termination::Transfer(target);
        }
        if state.transitions().is_empty() {
            return match event {
                Event::Error(err) => Termination::Error(err),
                event => Termination::Final(event),
            };
        }
        match state.target_for(&event) {
            Some(target) => Termination::Transfer(target.to_string()),
            None => match event {
                Event::Error(err) => Termination::Error(err),
                event => Termination::Error(FlowError::NoTransition {
                    state: state.name().to_string(),
                    event: event.to_string(),
                }),
            },
        }
    }

    fn jump(&self, target: &str) -> Step {
        match self.index_of(target) {
            Some(idx) => Step::Jump(idx),
            None => Step::Done(Termination::NotFound(target.to_string())),
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|state| state.name() == name)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "entry action panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{action_fn, Trigger};
    use anyhow::anyhow;
    use serde_json::{json, Value};

    fn visit(name: &'static str) -> impl Fn(&mut Context) + Send + Sync {
        move |ctx: &mut Context| {
            let trail = ctx.get_mut("trail").and_then(Value::as_array_mut);
            match trail {
                Some(trail) => trail.push(json!(name)),
                None => {
                    ctx.set("trail", json!([name]));
                }
            }
        }
    }

    fn trail(ctx: &Context) -> Vec<String> {
        ctx.get("trail")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn emitting(name: &'static str, event: &'static str) -> State {
        let record = visit(name);
        State::new(name).on_entry(action_fn(move |ctx| {
            record(ctx);
            Ok(Event::named(event))
        }))
    }

    fn counting(name: &'static str, limit: u64) -> State {
        State::new(name).on_entry(action_fn(move |ctx| {
            let count = ctx.get("count").and_then(Value::as_u64).unwrap_or(0) + 1;
            ctx.set("count", json!(count));
            if count < limit {
                Ok(Event::goto(name))
            } else {
                Ok(Event::named("done"))
            }
        }))
    }

    #[tokio::test]
    async fn unmatched_event_falls_through_to_exit() {
        let machine = Machine::linear(
            "fallthrough",
            vec![emitting("A", "x"), State::new("B").transition("x", "B")],
        );
        let mut ctx = Context::new();

        let termination = machine.run(&mut ctx).await;

        assert!(matches!(termination, Termination::Exit));
        assert_eq!(trail(&ctx), vec!["A"]);
    }

    #[tokio::test]
    async fn matched_transition_jumps_by_name() {
        let machine = Machine::linear(
            "jump",
            vec![
                emitting("A", "skip").transition("skip", "C"),
                emitting("B", "none"),
                emitting("C", "none"),
            ],
        );
        let mut ctx = Context::new();

        assert!(matches!(machine.run(&mut ctx).await, Termination::Exit));
        assert_eq!(trail(&ctx), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn missing_target_terminates_not_found() {
        let machine = Machine::linear("missing", vec![emitting("A", "y").transition("y", "Z")]);
        let mut ctx = Context::new();

        let termination = machine.run(&mut ctx).await;

        assert!(matches!(termination, Termination::NotFound(ref name) if name == "Z"));
        assert_eq!(termination.to_string(), "not-found:Z");
    }

    #[tokio::test]
    async fn returned_error_keeps_payload() {
        #[derive(Debug, thiserror::Error)]
        #[error("page exploded")]
        struct Exploded;

        let machine = Machine::linear(
            "failing",
            vec![
                State::new("A").on_entry(action_fn(|_| Err(Exploded.into()))),
                emitting("B", "never"),
            ],
        );
        let mut ctx = Context::new();

        let err = match machine.run(&mut ctx).await {
            Termination::Error(err) => err,
            other => panic!("expected error, got {other}"),
        };
        assert!(matches!(err, FlowError::Raised { ref state, .. } if state == "A"));
        assert!(err.payload().unwrap().downcast_ref::<Exploded>().is_some());
        assert!(trail(&ctx).is_empty());
    }

    #[tokio::test]
    async fn panicking_action_becomes_error_event() {
        let machine = Machine::linear(
            "panicking",
            vec![State::new("A").on_entry(action_fn(|_| panic!("selector missing")))],
        );
        let mut ctx = Context::new();

        match machine.run(&mut ctx).await {
            Termination::Error(FlowError::Panicked { state, message }) => {
                assert_eq!(state, "A");
                assert_eq!(message, "selector missing");
            }
            other => panic!("unexpected termination {other}"),
        }
    }

    #[tokio::test]
    async fn error_event_can_be_routed() {
        let machine = Machine::linear(
            "recover",
            vec![
                State::new("A")
                    .on_entry(action_fn(|_| Ok(Event::error(anyhow!("timeout")))))
                    .transition(Trigger::Error, "recover"),
                emitting("B", "none"),
                emitting("recover", "none"),
            ],
        );
        let mut ctx = Context::new();

        assert!(matches!(machine.run(&mut ctx).await, Termination::Exit));
        assert_eq!(trail(&ctx), vec!["recover"]);
    }

    #[tokio::test]
    async fn goto_bypasses_matching() {
        let machine = Machine::linear(
            "goto",
            vec![
                State::new("A")
                    .on_entry(action_fn(|_| Ok(Event::goto("C"))))
                    .transition("C", "B"),
                emitting("B", "none"),
                emitting("C", "none"),
            ],
        );
        let mut ctx = Context::new();

        assert!(matches!(machine.run(&mut ctx).await, Termination::Exit));
        assert_eq!(trail(&ctx), vec!["C"]);
    }

    #[tokio::test]
    async fn long_loops_run_at_constant_depth() {
        let machine = Machine::linear("loop", vec![counting("tick", 50_000)]);
        let mut ctx = Context::new();

        assert!(matches!(machine.run(&mut ctx).await, Termination::Exit));
        assert_eq!(ctx.get("count"), Some(&json!(50_000)));
    }

    #[tokio::test]
    async fn empty_linear_machine_exits() {
        let machine = Machine::linear("empty", Vec::new());
        assert!(matches!(
            machine.run(&mut Context::new()).await,
            Termination::Exit
        ));
    }

    fn pager() -> Machine {
        // Three pages of data, then the "no next" branch leaves via the
        // inner final state's exit mapping.
        Machine::tree(
            "pager",
            vec![
                State::new(INITIAL).transition(Trigger::Undefined, "extract"),
                State::new("extract")
                    .on_entry(action_fn(|ctx| {
                        let page = ctx.get("page").and_then(Value::as_u64).unwrap_or(0);
                        let data = ctx.get_mut("data").and_then(Value::as_array_mut);
                        match data {
                            Some(items) => items.push(json!(page)),
                            None => {
                                ctx.set("data", json!([page]));
                            }
                        }
                        Ok(Event::Undefined)
                    }))
                    .transition(Trigger::Undefined, "next"),
                State::new("next")
                    .on_entry(action_fn(|ctx| {
                        let page = ctx.get("page").and_then(Value::as_u64).unwrap_or(0);
                        if page < 2 {
                            ctx.set("page", json!(page + 1));
                            Ok(Event::named("next"))
                        } else {
                            Ok(Event::named("no next"))
                        }
                    }))
                    .transition("next", "extract")
                    .transition("no next", FINAL),
                State::new(FINAL).transition(Trigger::Undefined, FINAL),
            ],
        )
    }

    #[tokio::test]
    async fn nested_tree_machine_hands_off_to_outer_final() {
        let machine = Machine::tree(
            "crawler",
            vec![
                State::new(INITIAL).transition(Trigger::Undefined, "cinema"),
                State::new("cinema").nested(pager()),
                State::new(FINAL),
            ],
        );
        machine.validate().unwrap();
        let mut ctx = Context::new();

        let termination = machine.run(&mut ctx).await;

        assert!(matches!(termination, Termination::Final(Event::Undefined)));
        assert_eq!(ctx.get("data"), Some(&json!([0, 1, 2])));
    }

    #[tokio::test]
    async fn final_state_entry_produces_result_event() {
        let machine = Machine::tree(
            "result",
            vec![
                State::new(INITIAL).transition(Trigger::Undefined, FINAL),
                State::new(FINAL).on_entry(action_fn(|_| Ok(Event::named("stored")))),
            ],
        );

        match machine.run(&mut Context::new()).await {
            Termination::Final(Event::Named(name)) => assert_eq!(name, "stored"),
            other => panic!("unexpected termination {other}"),
        }
    }

    #[tokio::test]
    async fn exact_machine_rejects_unmatched_event() {
        let machine = Machine::tree(
            "strict",
            vec![
                State::new(INITIAL)
                    .on_entry(action_fn(|_| Ok(Event::named("surprise"))))
                    .transition("expected", FINAL),
                State::new(FINAL),
            ],
        );

        match machine.run(&mut Context::new()).await {
            Termination::Error(FlowError::NoTransition { state, event }) => {
                assert_eq!(state, INITIAL);
                assert_eq!(event, "surprise");
            }
            other => panic!("unexpected termination {other}"),
        }
    }

    #[tokio::test]
    async fn exact_machine_without_initial_is_invalid() {
        let machine = Machine::tree("headless", vec![State::new(FINAL)]);

        assert!(matches!(
            machine.validate(),
            Err(FlowError::InvalidStructure(_))
        ));
        assert!(matches!(
            machine.run(&mut Context::new()).await,
            Termination::NotFound(ref name) if name == INITIAL
        ));
    }

    #[test]
    fn validation_rejects_duplicates() {
        let twice = Machine::linear("twice", vec![State::new("A"), State::new("A")]);
        assert!(twice.validate().is_err());

        let ambiguous = Machine::tree(
            "ambiguous",
            vec![State::new(INITIAL)
                .transition("x", FINAL)
                .transition("x", "other")],
        );
        assert!(ambiguous.validate().is_err());

        let ordered = Machine::linear(
            "ordered",
            vec![State::new("A").transition("x", "A").transition("x", "A")],
        );
        assert!(ordered.validate().is_ok());
    }

    #[test]
    fn runs_on_blocking_executor() {
        let machine = Machine::linear("blocking", vec![emitting("A", "x")]);
        let mut ctx = Context::new();
        let termination = tokio_test::block_on(machine.run(&mut ctx));
        assert!(termination.is_success());
    }
}
