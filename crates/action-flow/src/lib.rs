//! Flow Orchestration Layer
//!
//! Cooperative state machines for sequencing multi-step page interactions.
//! Ordered machines advance through their states by default; tree machines
//! match events exactly and may nest whole machines as single states.

pub mod composer;
pub mod errors;
pub mod executor;
pub mod types;

pub use composer::{submachine, Submachine};
pub use errors::FlowError;
pub use executor::{Machine, MatchPolicy, FINAL, INITIAL};
pub use types::{action_fn, Context, Entry, EntryAction, Event, State, Termination, Trigger};
