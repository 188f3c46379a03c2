//! Simulation parameters

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// Default Constants
// =============================================================================

/// Default number of kernel iterations
pub const DEFAULT_ITERATIONS: u32 = 50;

/// Default Hooke's-law spring constant (must stay below 1)
pub const DEFAULT_SPRING_CONSTANT: f32 = 0.15;

/// Default Coulomb's-law repulsive constant
pub const DEFAULT_REPULSIVE_CONSTANT: f32 = 1.0;

/// How raw edge weights are mapped before they scale the attractive term.
///
/// Stored weights have no agreed range. `Raw` passes them through, `Clamp`
/// limits them to `(0, 1]`, `Scale` divides by a fixed divisor (a divisor of
/// 4 maps the legacy `[0, 3.6]` weights to roughly `[0, 1]`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum WeightNormalization {
    #[default]
    Raw,
    Clamp,
    Scale { divisor: f32 },
}

impl WeightNormalization {
    /// Apply the policy to one positive weight
    pub fn apply(self, weight: f32) -> f32 {
        match self {
            Self::Raw => weight,
            Self::Clamp => weight.min(1.0),
            Self::Scale { divisor } => weight / divisor,
        }
    }
}

impl FromStr for WeightNormalization {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "clamp" => Ok(Self::Clamp),
            other => {
                let divisor = other
                    .strip_prefix("scale:")
                    .and_then(|d| d.parse::<f32>().ok())
                    .ok_or_else(|| ConfigError::UnknownWeightNormalization(s.to_string()))?;
                if !(divisor > 0.0 && divisor.is_finite()) {
                    return Err(ConfigError::InvalidWeightDivisor(divisor));
                }
                Ok(Self::Scale { divisor })
            }
        }
    }
}

impl fmt::Display for WeightNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Clamp => write!(f, "clamp"),
            Self::Scale { divisor } => write!(f, "scale:{divisor}"),
        }
    }
}

/// Configuration for one layout run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of kernel iterations to run
    pub iterations: u32,
    /// Hooke's-law constant for the attractive term
    pub spring_constant: f32,
    /// Coulomb's-law constant for the repulsive term
    pub repulsive_constant: f32,
    /// Optional cap on how far a node may move in one iteration
    pub max_displacement: Option<f32>,
    /// Edge weight mapping applied by the layout compiler
    pub weight_normalization: WeightNormalization,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            spring_constant: DEFAULT_SPRING_CONSTANT,
            repulsive_constant: DEFAULT_REPULSIVE_CONSTANT,
            max_displacement: None,
            weight_normalization: WeightNormalization::Raw,
        }
    }
}

impl SimulationConfig {
    /// Set the iteration count
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the spring (attraction) constant
    pub fn with_spring_constant(mut self, spring_constant: f32) -> Self {
        self.spring_constant = spring_constant;
        self
    }

    /// Set the repulsive constant
    pub fn with_repulsive_constant(mut self, repulsive_constant: f32) -> Self {
        self.repulsive_constant = repulsive_constant;
        self
    }

    /// Cap the per-iteration displacement
    pub fn with_max_displacement(mut self, max_displacement: f32) -> Self {
        self.max_displacement = Some(max_displacement);
        self
    }

    /// Set the edge weight normalization policy
    pub fn with_weight_normalization(mut self, policy: WeightNormalization) -> Self {
        self.weight_normalization = policy;
        self
    }

    /// Check the run preconditions
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Written negated so NaN is rejected too
        if !(self.spring_constant < 1.0) {
            return Err(ConfigError::SpringConstantTooLarge(self.spring_constant));
        }
        if !self.repulsive_constant.is_finite() {
            return Err(ConfigError::NonFiniteRepulsiveConstant(
                self.repulsive_constant,
            ));
        }
        if let Some(max) = self.max_displacement {
            if !(max > 0.0) {
                return Err(ConfigError::InvalidMaxDisplacement(max));
            }
        }
        if let WeightNormalization::Scale { divisor } = self.weight_normalization {
            if !(divisor > 0.0 && divisor.is_finite()) {
                return Err(ConfigError::InvalidWeightDivisor(divisor));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.iterations, 50);
        assert_eq!(config.spring_constant, 0.15);
        assert_eq!(config.repulsive_constant, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn spring_constant_of_one_is_rejected() {
        let config = SimulationConfig::default().with_spring_constant(1.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::SpringConstantTooLarge(1.0))
        );
    }

    #[test]
    fn nan_spring_constant_is_rejected() {
        let config = SimulationConfig::default().with_spring_constant(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_spring_constant_is_allowed() {
        let config = SimulationConfig::default().with_spring_constant(0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_positive_max_displacement_is_rejected() {
        let config = SimulationConfig::default().with_max_displacement(0.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidMaxDisplacement(0.0))
        );
    }

    #[test]
    fn parses_weight_policies() {
        assert_eq!("raw".parse::<WeightNormalization>(), Ok(WeightNormalization::Raw));
        assert_eq!("Clamp".parse::<WeightNormalization>(), Ok(WeightNormalization::Clamp));
        assert_eq!(
            "scale:4".parse::<WeightNormalization>(),
            Ok(WeightNormalization::Scale { divisor: 4.0 })
        );
        assert!("scale:0".parse::<WeightNormalization>().is_err());
        assert!("scale:abc".parse::<WeightNormalization>().is_err());
        assert!("bogus".parse::<WeightNormalization>().is_err());
    }

    #[test]
    fn weight_policy_display_round_trips() {
        for policy in [
            WeightNormalization::Raw,
            WeightNormalization::Clamp,
            WeightNormalization::Scale { divisor: 4.0 },
        ] {
            assert_eq!(policy.to_string().parse::<WeightNormalization>(), Ok(policy));
        }
    }

    #[test]
    fn legacy_scale_maps_to_unit_range() {
        let policy = WeightNormalization::Scale { divisor: 4.0 };
        assert!((policy.apply(3.6) - 0.9).abs() < 1e-6);
        assert_eq!(WeightNormalization::Clamp.apply(3.6), 1.0);
        assert_eq!(WeightNormalization::Raw.apply(3.6), 3.6);
    }

    #[test]
    fn config_serializes_to_json() {
        let config = SimulationConfig::default()
            .with_weight_normalization(WeightNormalization::Scale { divisor: 4.0 });
        let json = serde_json::to_string(&config).unwrap();
        let back: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
