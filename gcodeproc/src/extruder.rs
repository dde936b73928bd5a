//! Extruder table: per-tool thermal profiles and scheduling bookkeeping.

use rustc_hash::FxHashMap;

use crate::config::ExtruderConfig;

/// Index into the run's extruder table.
pub type ExtruderId = usize;

/// One configured extruder plus the scheduling timestamps the preheat
/// engine maintains during a run.
///
/// All timestamps are simulated print-time seconds; `None` means the event
/// has not happened this run.
#[derive(Clone, Debug)]
pub struct Extruder {
    pub name: String,
    /// Seconds this tool needs from idle to usable temperature.
    pub heat_up: f64,
    /// Directive text emitted to activate (preheat) the tool.
    pub active_gcode: String,
    /// Directive text emitted to power the tool down, if configured.
    pub deactivate_gcode: Option<String>,
    /// Offset at which the most recent injected preheat takes effect (the
    /// queue-head offset at injection time).
    pub preheated_at: Option<f64>,
    /// The toolchange offset the most recent preheat was aimed at.
    pub preheated_until: Option<f64>,
    /// Offset of the most recent emitted deactivate directive.
    pub deactivated_at: Option<f64>,
}

impl Extruder {
    /// True when a prior preheat still certifies this tool hot: it was
    /// preheated and has not been deactivated since.
    pub fn known_hot(&self) -> bool {
        match (self.preheated_at, self.deactivated_at) {
            (Some(preheated), Some(deactivated)) => deactivated < preheated,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// True when the recorded preheat window spans `t`. A deactivate
    /// directive queued at `t` is stale in that case and must be dropped.
    pub fn preheat_covers(&self, t: f64) -> bool {
        matches!(
            (self.preheated_at, self.preheated_until),
            (Some(at), Some(until)) if at < t && until > t
        )
    }
}

/// The run's single owned table of extruder records, indexed by the
/// case-normalized op code that selects each tool.
///
/// Queue entries refer to extruders by id rather than holding copies, so
/// every instruction observes the same mutable scheduling state.
#[derive(Clone, Debug)]
pub struct ExtruderTable {
    extruders: Vec<Extruder>,
    by_op: FxHashMap<String, ExtruderId>,
    max_heat_up: f64,
}

impl ExtruderTable {
    pub fn from_config(configs: &[ExtruderConfig]) -> Self {
        let mut extruders = Vec::with_capacity(configs.len());
        let mut by_op = FxHashMap::default();
        let mut max_heat_up: f64 = 0.0;

        for config in configs {
            let id = extruders.len();
            by_op.insert(config.name.to_ascii_uppercase(), id);
            max_heat_up = max_heat_up.max(config.heat_up);
            extruders.push(Extruder {
                name: config.name.clone(),
                heat_up: config.heat_up,
                active_gcode: config.active_gcode.clone(),
                deactivate_gcode: config.deactivate_gcode.clone(),
                preheated_at: None,
                preheated_until: None,
                deactivated_at: None,
            });
        }

        Self {
            extruders,
            by_op,
            max_heat_up,
        }
    }

    /// Looks up the extruder selected by an (already uppercased) op code.
    pub fn lookup(&self, op: &str) -> Option<ExtruderId> {
        self.by_op.get(op).copied()
    }

    pub fn get(&self, id: ExtruderId) -> &Extruder {
        &self.extruders[id]
    }

    pub fn get_mut(&mut self, id: ExtruderId) -> &mut Extruder {
        &mut self.extruders[id]
    }

    /// Worst-case heat-up duration over all configured extruders. The
    /// lookahead queue must retain at least this much trailing time.
    pub fn max_heat_up(&self) -> f64 {
        self.max_heat_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ExtruderTable {
        ExtruderTable::from_config(&[
            ExtruderConfig {
                name: "t0".to_string(),
                heat_up: 5.0,
                active_gcode: "M104 S200 T0".to_string(),
                deactivate_gcode: Some("M104 S0 T0".to_string()),
            },
            ExtruderConfig {
                name: "T1".to_string(),
                heat_up: 3.0,
                active_gcode: "M104 S200 T1".to_string(),
                deactivate_gcode: None,
            },
        ])
    }

    #[test]
    fn test_lookup_is_case_normalized() {
        let table = table();
        // Config said "t0"; op codes arrive uppercased.
        let id = table.lookup("T0").unwrap();
        assert_eq!(table.get(id).name, "t0");
        assert!(table.lookup("T2").is_none());
    }

    #[test]
    fn test_max_heat_up() {
        assert_eq!(table().max_heat_up(), 5.0);
    }

    #[test]
    fn test_known_hot_requires_a_preheat() {
        let table = table();
        assert!(!table.get(0).known_hot());
    }

    #[test]
    fn test_known_hot_after_preheat() {
        let mut table = table();
        table.get_mut(0).preheated_at = Some(10.0);
        assert!(table.get(0).known_hot());
    }

    #[test]
    fn test_deactivation_after_preheat_clears_known_hot() {
        let mut table = table();
        {
            let e = table.get_mut(0);
            e.preheated_at = Some(10.0);
            e.deactivated_at = Some(15.0);
        }
        assert!(!table.get(0).known_hot());

        // A deactivation that predates the preheat does not.
        table.get_mut(0).deactivated_at = Some(5.0);
        assert!(table.get(0).known_hot());
    }

    #[test]
    fn test_preheat_covers_window() {
        let mut table = table();
        {
            let e = table.get_mut(0);
            e.preheated_at = Some(10.0);
            e.preheated_until = Some(20.0);
        }
        let e = table.get(0);
        assert!(e.preheat_covers(15.0));
        assert!(!e.preheat_covers(5.0));
        assert!(!e.preheat_covers(25.0));
        // Window edges do not count as covered.
        assert!(!e.preheat_covers(10.0));
        assert!(!e.preheat_covers(20.0));
    }

    #[test]
    fn test_preheat_covers_needs_both_timestamps() {
        let mut table = table();
        table.get_mut(0).preheated_at = Some(10.0);
        assert!(!table.get(0).preheat_covers(15.0));
    }
}
