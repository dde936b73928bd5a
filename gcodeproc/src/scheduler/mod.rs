//! Lookahead preheat scheduling over a single pass of a G-code file.
//!
//! This module holds the part of the tool with real algorithmic content:
//! the bounded lookahead queue and the policy deciding when to flush it,
//! when to inject a preheat directive, and when a queued deactivate
//! directive must be cancelled instead of emitted.

mod core;
mod queue;

pub use core::{run, PreheatError, PreheatScheduler, OUTPUT_SUFFIX};
pub use queue::{DeactivateEntry, LookaheadQueue, Pending, TimedGcode};
