//! Bounded lookahead queue of not-yet-emitted output entries.

use std::collections::VecDeque;

use crate::extruder::ExtruderId;
use crate::gcode::Gcode;

/// A parsed (or pass-through) instruction together with the timing the
/// estimator assigned to it.
#[derive(Clone, Debug)]
pub struct TimedGcode {
    pub gcode: Gcode,
    /// Simulated execution time of this instruction.
    pub duration: f64,
    /// Cumulative print time before this instruction runs.
    pub print_time: f64,
    pub is_toolchange: bool,
    /// Extruder active after this instruction.
    pub extruder: Option<ExtruderId>,
    /// For a toolchange, the extruder that was active before it.
    pub prev_extruder: Option<ExtruderId>,
}

/// A synthetic power-down directive queued at toolchange time.
///
/// Whether it is emitted at all is decided only when it reaches the queue
/// head; a later toolchange may have re-preheated the tool across this
/// moment, in which case the entry is dropped.
#[derive(Clone, Debug)]
pub struct DeactivateEntry {
    pub extruder: ExtruderId,
    /// Print-time offset of the toolchange that scheduled this entry.
    pub print_time: f64,
    /// Rendered directive text, ready to emit.
    pub line: String,
}

/// One pending output entry: an ordinary instruction, or a deactivate
/// directive still awaiting its keep-or-cancel decision.
#[derive(Clone, Debug)]
pub enum Pending {
    Gcode(TimedGcode),
    Deactivate(DeactivateEntry),
}

impl Pending {
    pub fn duration(&self) -> f64 {
        match self {
            Pending::Gcode(timed) => timed.duration,
            Pending::Deactivate(_) => 0.0,
        }
    }

    pub fn print_time(&self) -> f64 {
        match self {
            Pending::Gcode(timed) => timed.print_time,
            Pending::Deactivate(entry) => entry.print_time,
        }
    }
}

/// FIFO of pending entries, in input order, with an incrementally
/// maintained aggregate of their durations.
///
/// The aggregate always equals the sum over the current members; it is
/// updated on every push and pop.
#[derive(Debug, Default)]
pub struct LookaheadQueue {
    entries: VecDeque<Pending>,
    queued_duration: f64,
}

impl LookaheadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Pending) {
        self.queued_duration += entry.duration();
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<Pending> {
        let entry = self.entries.pop_front()?;
        self.queued_duration -= entry.duration();
        if self.entries.is_empty() {
            // Resynchronize after accumulated float drift.
            self.queued_duration = 0.0;
        }
        Some(entry)
    }

    pub fn front(&self) -> Option<&Pending> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all queued entries' durations.
    pub fn queued_duration(&self) -> f64 {
        self.queued_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(duration: f64, print_time: f64) -> Pending {
        Pending::Gcode(TimedGcode {
            gcode: Gcode::parse("G1 X1", 1),
            duration,
            print_time,
            is_toolchange: false,
            extruder: None,
            prev_extruder: None,
        })
    }

    #[test]
    fn test_aggregate_tracks_push_and_pop() {
        let mut queue = LookaheadQueue::new();
        queue.push(timed(2.0, 0.0));
        queue.push(timed(3.0, 2.0));
        assert_eq!(queue.queued_duration(), 5.0);
        assert_eq!(queue.len(), 2);

        let front = queue.pop().unwrap();
        assert_eq!(front.duration(), 2.0);
        assert_eq!(front.print_time(), 0.0);
        assert_eq!(queue.queued_duration(), 3.0);
    }

    #[test]
    fn test_deactivate_entries_have_zero_duration() {
        let mut queue = LookaheadQueue::new();
        queue.push(Pending::Deactivate(DeactivateEntry {
            extruder: 0,
            print_time: 10.0,
            line: "M104 S0 T0".to_string(),
        }));
        assert_eq!(queue.queued_duration(), 0.0);
        assert_eq!(queue.front().unwrap().print_time(), 10.0);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = LookaheadQueue::new();
        queue.push(timed(1.0, 0.0));
        queue.push(timed(1.0, 1.0));
        queue.push(timed(1.0, 2.0));
        assert_eq!(queue.pop().unwrap().print_time(), 0.0);
        assert_eq!(queue.pop().unwrap().print_time(), 1.0);
        assert_eq!(queue.pop().unwrap().print_time(), 2.0);
        assert!(queue.pop().is_none());
        assert_eq!(queue.queued_duration(), 0.0);
    }
}
