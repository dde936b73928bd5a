//! G-code post-processing for multi-extruder printers.
//!
//! The core is a single-pass lookahead scheduler ([`scheduler`]) that
//! simulates print time for every instruction and holds a bounded trailing
//! queue of not-yet-emitted lines. The queue window is what makes early
//! preheat injection possible: when a toolchange is read, the activation
//! directive for the new tool is written at the current queue head, far
//! enough back in the output to finish heating in time. Power-down
//! directives for the previous tool travel through the same queue and are
//! cancelled if a later toolchange turns out to need that tool hot.
//!
//! A second, much simpler pass ([`substitute`]) rewrites lines through
//! configured regular expressions.

pub mod config;
pub mod extruder;
pub mod gcode;
pub mod kinematics;
pub mod logging;
pub mod rewrite;
pub mod scheduler;
pub mod substitute;

pub use config::{
    ConfigError, ExtruderConfig, GcodeCosts, PreheatConfig, PreheatOptions, SubstitutionConfig,
};
pub use extruder::{Extruder, ExtruderId, ExtruderTable};
pub use gcode::Gcode;
pub use kinematics::KinematicState;
pub use scheduler::{PreheatError, PreheatScheduler};
pub use substitute::{SubstituteError, Substituter};
