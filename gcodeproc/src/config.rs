//! Configuration types, loading, and validation.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to decode config file: {0}")]
    Decode(#[from] serde_yaml::Error),
    #[error("no extruders defined")]
    NoExtruders,
    #[error("extruder name cannot be empty")]
    EmptyName,
    #[error("extruder {0}: active gcode cannot be empty")]
    EmptyActiveGcode(String),
    #[error("extruder {0}: heat up time must be positive")]
    NonPositiveHeatUp(String),
}

/// One extruder as declared in the preheat config file.
#[derive(Clone, Debug, Deserialize)]
pub struct ExtruderConfig {
    /// Tool-selection op code, e.g. "T0". Matched case-insensitively.
    pub name: String,
    /// Seconds from idle to usable temperature.
    pub heat_up: f64,
    /// G-code emitted to preheat this tool.
    pub active_gcode: String,
    /// G-code emitted to power this tool down. Optional; without it the
    /// tool is never deactivated.
    #[serde(default)]
    pub deactivate_gcode: Option<String>,
}

/// Fixed durations for ops the kinematic estimator cannot time.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct GcodeCosts {
    #[serde(default)]
    pub toolchange: f64,
    #[serde(default)]
    pub retraction: f64,
}

/// Preheat engine configuration, loaded from YAML and validated before any
/// G-code file is touched.
#[derive(Clone, Debug, Deserialize)]
pub struct PreheatConfig {
    pub extruders: Vec<ExtruderConfig>,
    #[serde(default)]
    pub costs: Option<GcodeCosts>,
}

impl PreheatConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every rule the engine depends on. Each violation gets its own
    /// descriptive error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extruders.is_empty() {
            return Err(ConfigError::NoExtruders);
        }
        for extruder in &self.extruders {
            if extruder.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if extruder.active_gcode.trim().is_empty() {
                return Err(ConfigError::EmptyActiveGcode(extruder.name.clone()));
            }
            if extruder.heat_up <= 0.0 {
                return Err(ConfigError::NonPositiveHeatUp(extruder.name.clone()));
            }
        }
        Ok(())
    }
}

/// One rewrite rule for the substitute command.
#[derive(Clone, Debug, Deserialize)]
pub struct SubstitutionRule {
    /// Regular expression matched against each line.
    pub from: String,
    /// Replacement text; capture groups expand regex-style and a literal
    /// `\n` stands for a newline.
    pub to: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubstitutionConfig {
    pub substitutions: Vec<SubstitutionRule>,
}

impl SubstitutionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Runtime options for a preheat run, supplied by the command line rather
/// than the config file.
#[derive(Clone, Copy, Debug)]
pub struct PreheatOptions {
    /// Flat fraction of nominal move time added for acceleration and
    /// deceleration phases.
    pub speed_change_ratio: f64,
    /// Leave the output at its temporary path instead of renaming it over
    /// the input. Debugging aid.
    pub no_rename: bool,
    /// Annotate emitted moves and toolchanges with simulated print times.
    pub debug: bool,
}

impl Default for PreheatOptions {
    fn default() -> Self {
        Self {
            speed_change_ratio: 0.4,
            no_rename: false,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extruder(name: &str) -> ExtruderConfig {
        ExtruderConfig {
            name: name.to_string(),
            heat_up: 5.0,
            active_gcode: "M104 S200".to_string(),
            deactivate_gcode: None,
        }
    }

    #[test]
    fn test_decode_full_config() {
        let yaml = "\
extruders:
  - name: T0
    heat_up: 12.5
    active_gcode: \"M104 S210 T0\"
    deactivate_gcode: \"M104 S0 T0\"
  - name: T1
    heat_up: 8
    active_gcode: \"M104 S200 T1\"
costs:
  toolchange: 4.0
  retraction: 0.8
";
        let config: PreheatConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.extruders.len(), 2);
        assert_eq!(config.extruders[0].heat_up, 12.5);
        assert_eq!(
            config.extruders[0].deactivate_gcode.as_deref(),
            Some("M104 S0 T0")
        );
        assert_eq!(config.extruders[1].deactivate_gcode, None);
        let costs = config.costs.unwrap();
        assert_eq!(costs.toolchange, 4.0);
        assert_eq!(costs.retraction, 0.8);
    }

    #[test]
    fn test_costs_are_optional() {
        let yaml = "\
extruders:
  - name: T0
    heat_up: 5
    active_gcode: M104 S200
";
        let config: PreheatConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert!(config.costs.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_extruder_list() {
        let config = PreheatConfig {
            extruders: vec![],
            costs: None,
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoExtruders)));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let config = PreheatConfig {
            extruders: vec![extruder("  ")],
            costs: None,
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyName)));
    }

    #[test]
    fn test_validate_rejects_empty_active_gcode() {
        let mut bad = extruder("T0");
        bad.active_gcode = String::new();
        let config = PreheatConfig {
            extruders: vec![bad],
            costs: None,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyActiveGcode(name)) if name == "T0"
        ));
    }

    #[test]
    fn test_validate_rejects_non_positive_heat_up() {
        let mut bad = extruder("T0");
        bad.heat_up = 0.0;
        let config = PreheatConfig {
            extruders: vec![bad],
            costs: None,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveHeatUp(name)) if name == "T0"
        ));
    }

    #[test]
    fn test_decode_substitution_config() {
        let yaml = "\
substitutions:
  - from: \"^M600\"
    to: \"; filament change removed\"
";
        let config: SubstitutionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.substitutions.len(), 1);
        assert_eq!(config.substitutions[0].from, "^M600");
    }
}
