//! The preheat scheduling engine: flush policy, preheat injection, and
//! deferred deactivation.

use std::io::{self, BufRead, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{GcodeCosts, PreheatConfig, PreheatOptions};
use crate::extruder::{ExtruderId, ExtruderTable};
use crate::gcode::Gcode;
use crate::kinematics::KinematicState;
use crate::rewrite::{Rewrite, RewriteError};

use super::queue::{DeactivateEntry, LookaheadQueue, Pending, TimedGcode};

/// Errors that can occur while post-processing a G-code file.
#[derive(Error, Debug)]
pub enum PreheatError {
    #[error("failed to read gcode file: {0}")]
    ReadInput(io::Error),
    #[error("failed to write output file: {0}")]
    WriteOutput(io::Error),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

/// Suffix of the sibling temporary file the processed stream is written to.
pub const OUTPUT_SUFFIX: &str = ".preheat";

/// Single-pass lookahead scheduler over one G-code file.
///
/// Every input line is parsed, assigned a simulated duration, and pushed
/// onto a bounded trailing queue before anything is emitted. The retained
/// window is kept at least as wide as the worst-case extruder heat-up
/// time, so that when a toolchange arrives, an activation directive
/// injected at the current queue head is guaranteed to land early enough
/// in the output to finish heating before the tool is used.
///
/// Owns all mutable run state and is not reusable across runs.
pub struct PreheatScheduler {
    options: PreheatOptions,
    costs: Option<GcodeCosts>,
    extruders: ExtruderTable,
    kinematics: KinematicState,
    queue: LookaheadQueue,
    /// Extruder selected by the most recent toolchange.
    current: Option<ExtruderId>,
    /// Cumulative simulated print time of everything pushed so far.
    print_time: f64,
    toolchange_count: u64,
}

impl PreheatScheduler {
    pub fn new(config: &PreheatConfig, options: PreheatOptions) -> Self {
        Self {
            options,
            costs: config.costs,
            extruders: ExtruderTable::from_config(&config.extruders),
            kinematics: KinematicState::default(),
            queue: LookaheadQueue::new(),
            current: None,
            print_time: 0.0,
            toolchange_count: 0,
        }
    }

    /// Processes a complete G-code stream, writing the post-processed lines
    /// to `output`.
    pub fn process<R: BufRead, W: Write>(
        &mut self,
        input: R,
        output: &mut W,
    ) -> Result<(), PreheatError> {
        for (index, line) in input.lines().enumerate() {
            let line = line.map_err(PreheatError::ReadInput)?;
            self.process_line(&line, index as u64 + 1, output)?;
        }
        self.drain(output)
    }

    fn process_line<W: Write>(
        &mut self,
        line: &str,
        line_no: u64,
        output: &mut W,
    ) -> Result<(), PreheatError> {
        let g = Gcode::parse(line, line_no);

        // Thermal control is owned by this engine; manual temperature ops
        // are dropped from the stream entirely.
        if g.parsed && (g.op == "M104" || g.op == "M109") {
            if g.op == "M109" && g.has_params() {
                warn!(
                    line_no,
                    line, "input attempts manual temperature control; dropping"
                );
            }
            return Ok(());
        }

        let duration = self.estimate(&g);
        let toolchange = if g.parsed {
            self.extruders.lookup(&g.op)
        } else {
            None
        };

        let print_time = self.print_time;
        self.queue.push(Pending::Gcode(TimedGcode {
            duration,
            print_time,
            is_toolchange: toolchange.is_some(),
            extruder: toolchange.or(self.current),
            prev_extruder: if toolchange.is_some() {
                self.current
            } else {
                None
            },
            gcode: g,
        }));
        self.print_time += duration;

        if let Some(id) = toolchange {
            self.handle_toolchange(id, print_time, output)?;
        }

        self.flush(output)
    }

    /// Assigns a simulated duration to one instruction, updating the
    /// kinematic tracker as a side effect.
    fn estimate(&mut self, g: &Gcode) -> f64 {
        if !g.parsed {
            return 0.0;
        }
        match g.op.as_str() {
            "M82" => {
                self.kinematics.relative_extrusion = false;
                0.0
            }
            "M83" => {
                self.kinematics.relative_extrusion = true;
                0.0
            }
            "G90" => {
                self.kinematics.relative_position = false;
                0.0
            }
            "G91" => {
                self.kinematics.relative_position = true;
                0.0
            }
            "G10" | "G11" => self.costs.map_or(0.0, |c| c.retraction),
            op if Gcode::is_move_op(op) => self
                .kinematics
                .move_duration(g, self.options.speed_change_ratio),
            op => {
                if self.extruders.lookup(op).is_some() {
                    self.costs.map_or(0.0, |c| c.toolchange)
                } else {
                    0.0
                }
            }
        }
    }

    /// Injection and deactivation bookkeeping for a toolchange instruction
    /// that has already been pushed to the queue tail.
    fn handle_toolchange<W: Write>(
        &mut self,
        id: ExtruderId,
        tc_print_time: f64,
        output: &mut W,
    ) -> Result<(), PreheatError> {
        let prev = self.current;

        // The very first toolchange only selects the initial tool; the
        // prologue has already been flushed, so there is nowhere useful to
        // inject an activation directive anyway.
        if self.toolchange_count > 0 {
            // An injected directive lands where the queue head currently
            // sits: the earliest point of the output still open to change.
            let head_time = self
                .queue
                .front()
                .map_or(tc_print_time, Pending::print_time);

            let extruder = self.extruders.get(id);
            if !extruder.known_hot() {
                writeln!(
                    output,
                    "; PREHEAT {} [{:.1} -> {:.1}]\n{}",
                    extruder.name, head_time, tc_print_time, extruder.active_gcode
                )
                .map_err(PreheatError::WriteOutput)?;
                self.extruders.get_mut(id).preheated_at = Some(head_time);
            } else {
                debug!(
                    extruder = %extruder.name,
                    print_time = tc_print_time,
                    "skip preheat: still hot from an earlier activation"
                );
            }
            // The window extends to this toolchange even when injection was
            // skipped; queued deactivates must see the full span.
            self.extruders.get_mut(id).preheated_until = Some(tc_print_time);

            // Power down the tool being switched away from, but only
            // tentatively: the entry sits in the queue until flush time and
            // may be cancelled by a later toolchange back to that tool.
            if let Some(prev_id) = prev.filter(|&prev_id| prev_id != id) {
                let prev_extruder = self.extruders.get(prev_id);
                if let Some(text) = &prev_extruder.deactivate_gcode {
                    debug!(
                        extruder = %prev_extruder.name,
                        print_time = tc_print_time,
                        "queue deactivate"
                    );
                    let line = format!(
                        "; DEACTIVATE {} @ {:.1}\n{}",
                        prev_extruder.name, tc_print_time, text
                    );
                    self.queue.push(Pending::Deactivate(DeactivateEntry {
                        extruder: prev_id,
                        print_time: tc_print_time,
                        line,
                    }));
                }
            }
        }

        self.toolchange_count += 1;
        self.current = Some(id);
        Ok(())
    }

    /// Emits queue heads while doing so keeps the retained window wide
    /// enough for any future preheat to land in time. Before the first
    /// toolchange there is nothing to look ahead for, so the prologue
    /// flushes eagerly.
    fn flush<W: Write>(&mut self, output: &mut W) -> Result<(), PreheatError> {
        while self.queue.len() > 1 && self.should_flush() {
            self.emit_front(output)?;
        }
        Ok(())
    }

    fn should_flush(&self) -> bool {
        if self.toolchange_count == 0 {
            return true;
        }
        let Some(head) = self.queue.front() else {
            return false;
        };
        // Aggregate minus the head's own duration is the simulated time
        // elapsed since the head instruction began.
        self.queue.queued_duration() - head.duration() > self.extruders.max_heat_up()
    }

    /// Emits the queue head, or drops it if it is a deactivate directive
    /// whose target has since been re-preheated across its timestamp.
    fn emit_front<W: Write>(&mut self, output: &mut W) -> Result<(), PreheatError> {
        let Some(entry) = self.queue.pop() else {
            return Ok(());
        };
        match entry {
            Pending::Deactivate(entry) => {
                let extruder = self.extruders.get(entry.extruder);
                if extruder.preheat_covers(entry.print_time) {
                    debug!(
                        extruder = %extruder.name,
                        print_time = entry.print_time,
                        preheated_at = extruder.preheated_at,
                        preheated_until = extruder.preheated_until,
                        "cancel deactivate: a later preheat window covers it"
                    );
                    return Ok(());
                }
                self.extruders.get_mut(entry.extruder).deactivated_at = Some(entry.print_time);
                writeln!(output, "{}", entry.line).map_err(PreheatError::WriteOutput)?;
            }
            Pending::Gcode(timed) => {
                let annotation = self.annotation(&timed);
                writeln!(output, "{}{}", timed.gcode.line, annotation)
                    .map_err(PreheatError::WriteOutput)?;
            }
        }
        Ok(())
    }

    /// Trailing comment with simulated timing, emitted in debug mode for
    /// moves and toolchanges.
    fn annotation(&self, timed: &TimedGcode) -> String {
        if !self.options.debug || !(timed.gcode.is_move() || timed.is_toolchange) {
            return String::new();
        }
        let mut annotation = format!("  ; printTime={:.1}", timed.print_time);
        if timed.is_toolchange {
            if let Some(prev_id) = timed.prev_extruder {
                let prev = self.extruders.get(prev_id);
                annotation.push_str(&format!(" prev={}", prev.name));
                if let (Some(at), Some(until)) = (prev.preheated_at, prev.preheated_until) {
                    if prev.preheat_covers(timed.print_time) {
                        annotation.push_str(&format!(" preheating [{at:.1} -> {until:.1}]"));
                    }
                }
            }
        }
        annotation
    }

    /// Empties the queue at end of input. Deactivate entries still get the
    /// cancellation re-check: the information that invalidates them may
    /// have arrived with the last toolchanges of the file.
    fn drain<W: Write>(&mut self, output: &mut W) -> Result<(), PreheatError> {
        while !self.queue.is_empty() {
            self.emit_front(output)?;
        }
        Ok(())
    }
}

/// Post-processes `path` in place: the scheduled stream goes to a sibling
/// temporary file which is then renamed over the original, unless the
/// options ask to keep it for inspection.
pub fn run(
    path: &Path,
    config: &PreheatConfig,
    options: PreheatOptions,
) -> Result<(), PreheatError> {
    let mut scheduler = PreheatScheduler::new(config, options);
    let mut rewrite = Rewrite::begin(path, OUTPUT_SUFFIX)?;
    scheduler.process(&mut rewrite.input, &mut rewrite.output)?;
    rewrite.commit(options.no_rename)?;
    Ok(())
}
