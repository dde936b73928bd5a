//! Tracked machine state and motion timing.

use crate::gcode::Gcode;

/// The machine's believed position, feedrate, and coordinate modes,
/// maintained across the run as motion instructions are processed.
#[derive(Clone, Debug, Default)]
pub struct KinematicState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub e: f64,
    /// Last known feedrate in units per second. Zero until a move sets one.
    pub feedrate: f64,
    /// Extrusion values are deltas rather than absolute targets.
    pub relative_extrusion: bool,
    /// Position values are deltas rather than absolute targets.
    pub relative_position: bool,
}

impl KinematicState {
    /// Applies a motion instruction to the tracked position.
    ///
    /// In absolute mode only the axes the instruction specifies are
    /// replaced; an omitted axis stays put. In relative mode specified axes
    /// accumulate. Extrusion follows its own mode flag with the same rule.
    pub fn apply(&mut self, g: &Gcode) {
        if self.relative_position {
            self.x += g.x.unwrap_or(0.0);
            self.y += g.y.unwrap_or(0.0);
            self.z += g.z.unwrap_or(0.0);
        } else {
            if let Some(x) = g.x {
                self.x = x;
            }
            if let Some(y) = g.y {
                self.y = y;
            }
            if let Some(z) = g.z {
                self.z = z;
            }
        }

        if self.relative_extrusion {
            self.e += g.e.unwrap_or(0.0);
        } else if let Some(e) = g.e {
            self.e = e;
        }
    }

    /// Displacement of a linear move from the tracked position, as a
    /// 4-dimensional Euclidean norm over X, Y, Z, and E.
    ///
    /// Folding extrusion into the same norm as the spatial axes is a
    /// deliberately coarse approximation. Curved moves (G2/G3) report zero:
    /// arc lengths are unsupported.
    pub fn move_distance(&self, g: &Gcode) -> f64 {
        match g.op.as_str() {
            "G0" | "G1" => {
                let dx = Self::axis_delta(g.x, self.x, self.relative_position);
                let dy = Self::axis_delta(g.y, self.y, self.relative_position);
                let dz = Self::axis_delta(g.z, self.z, self.relative_position);
                let de = Self::axis_delta(g.e, self.e, self.relative_extrusion);
                (dx * dx + dy * dy + dz * dz + de * de).sqrt()
            }
            _ => 0.0,
        }
    }

    /// An unspecified axis contributes nothing to the displacement.
    fn axis_delta(specified: Option<f64>, tracked: f64, relative: bool) -> f64 {
        match specified {
            None => 0.0,
            Some(v) if relative => v,
            Some(v) => v - tracked,
        }
    }

    /// Computes the simulated duration of a motion instruction and applies
    /// it to the tracked state.
    ///
    /// The instruction's own feedrate, when present, becomes the new tracked
    /// feedrate. With no known positive feedrate the duration is zero. The
    /// inflation ratio models acceleration and deceleration phases as a flat
    /// fraction of the nominal time.
    pub fn move_duration(&mut self, g: &Gcode, speed_change_ratio: f64) -> f64 {
        let distance = self.move_distance(g);

        if let Some(f) = g.f {
            self.feedrate = f;
        }
        let mut duration = if self.feedrate > 0.0 {
            distance / self.feedrate
        } else {
            0.0
        };
        duration += duration * speed_change_ratio;

        self.apply(g);
        duration
    }
}
