//! YAML sweep configuration.
//!
//! ```yaml
//! model: heat_rod.json
//! output_dir: bases
//! ranks: [2, 4, 8]
//! strategies:
//!   - kind: pod
//!   - kind: carlberg
//!     method: snapshot_gram
//!   - kind: grad_descent
//!     iterations: 200
//!   - kind: modal
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rom_core::DEFAULT_PSD_TOLERANCE;
use rom_reduction::{
    AdadeltaConfig, CarlbergConfig, CarlbergMethod, CarlbergWeightedPod, GradientDescentConfig,
    GradientDescentWeightedPod, ModalConfig, ModalReduction, PlainPod, PodConfig, Strategy,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// JSON model file (see [`crate::model`]).
    pub model: PathBuf,
    /// Root of the basis store.
    pub output_dir: PathBuf,
    pub ranks: Vec<usize>,
    pub strategies: Vec<StrategySpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarlbergMethodSpec {
    #[default]
    MatrixSquareRoot,
    SnapshotGram,
}

impl From<CarlbergMethodSpec> for CarlbergMethod {
    fn from(spec: CarlbergMethodSpec) -> Self {
        match spec {
            CarlbergMethodSpec::MatrixSquareRoot => CarlbergMethod::MatrixSquareRoot,
            CarlbergMethodSpec::SnapshotGram => CarlbergMethod::SnapshotGram,
        }
    }
}

/// One strategy of the sweep with its parameters; the rank comes from the
/// sweep's rank list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategySpec {
    Pod,
    Carlberg {
        #[serde(default = "default_psd_tolerance")]
        psd_tolerance: f64,
        #[serde(default)]
        method: CarlbergMethodSpec,
    },
    GradDescent {
        #[serde(default = "default_ridge")]
        ridge_regularization: f64,
        #[serde(default = "default_iterations")]
        iterations: usize,
        #[serde(default)]
        optimizer: AdadeltaSpec,
    },
    Modal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdadeltaSpec {
    pub learning_rate: f64,
    pub rho: f64,
    pub epsilon: f64,
}

impl Default for AdadeltaSpec {
    fn default() -> Self {
        let d = AdadeltaConfig::default();
        Self {
            learning_rate: d.learning_rate,
            rho: d.rho,
            epsilon: d.epsilon,
        }
    }
}

fn default_psd_tolerance() -> f64 {
    DEFAULT_PSD_TOLERANCE
}

fn default_ridge() -> f64 {
    1.0
}

fn default_iterations() -> usize {
    100
}

impl StrategySpec {
    /// Record-key name of the strategy.
    pub fn name(&self) -> &'static str {
        match self {
            StrategySpec::Pod => PlainPod::NAME,
            StrategySpec::Carlberg { .. } => CarlbergWeightedPod::NAME,
            StrategySpec::GradDescent { .. } => GradientDescentWeightedPod::NAME,
            StrategySpec::Modal => ModalReduction::NAME,
        }
    }

    /// Instantiate the strategy at `rank`, validating its parameters.
    pub fn build(&self, rank: usize) -> AppResult<Strategy> {
        let strategy = match self {
            StrategySpec::Pod => PlainPod::new(PodConfig { rank })?.into(),
            StrategySpec::Carlberg {
                psd_tolerance,
                method,
            } => CarlbergWeightedPod::new(CarlbergConfig {
                rank,
                psd_tolerance: *psd_tolerance,
                method: (*method).into(),
            })?
            .into(),
            StrategySpec::GradDescent {
                ridge_regularization,
                iterations,
                optimizer,
            } => GradientDescentWeightedPod::new(GradientDescentConfig {
                rank,
                ridge_regularization: *ridge_regularization,
                iterations: *iterations,
                optimizer: AdadeltaConfig {
                    learning_rate: optimizer.learning_rate,
                    rho: optimizer.rho,
                    epsilon: optimizer.epsilon,
                },
            })?
            .into(),
            StrategySpec::Modal => ModalReduction::new(ModalConfig { rank })?.into(),
        };
        Ok(strategy)
    }
}

/// Load a sweep config from a YAML file, resolving relative paths.
pub fn load_config(path: &Path) -> AppResult<SweepConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = parse_config(&content)?;
    if let Some(base) = path.parent() {
        if config.model.is_relative() {
            config.model = base.join(&config.model);
        }
        if config.output_dir.is_relative() {
            config.output_dir = base.join(&config.output_dir);
        }
    }
    Ok(config)
}

/// Parse and validate sweep YAML.
pub fn parse_config(yaml: &str) -> AppResult<SweepConfig> {
    let config: SweepConfig = serde_yaml::from_str(yaml)
        .map_err(|e| AppError::Config(format!("Failed to parse sweep YAML: {}", e)))?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject sweeps that are empty or would write the same record twice.
pub fn validate_config(config: &SweepConfig) -> AppResult<()> {
    if config.ranks.is_empty() {
        return Err(AppError::Validation(
            "Sweep must list at least one rank".to_string(),
        ));
    }
    if config.ranks.contains(&0) {
        return Err(AppError::Validation("Ranks must be at least 1".to_string()));
    }
    if config.strategies.is_empty() {
        return Err(AppError::Validation(
            "Sweep must list at least one strategy".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for spec in &config.strategies {
        if !seen.insert(spec.name()) {
            return Err(AppError::Validation(format!(
                "Strategy '{}' is listed more than once",
                spec.name()
            )));
        }
        // Parameter checks do not depend on the rank.
        spec.build(1)?;
    }

    let mut ranks = HashSet::new();
    for rank in &config.ranks {
        if !ranks.insert(rank) {
            return Err(AppError::Validation(format!(
                "Rank {} is listed more than once",
                rank
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
model: model.json
output_dir: out
ranks: [1, 2]
strategies:
  - kind: pod
  - kind: carlberg
    method: snapshot_gram
  - kind: grad_descent
    iterations: 5
    optimizer:
      learning_rate: 0.01
  - kind: modal
"#;

    #[test]
    fn parses_strategies_with_defaults() {
        let config = parse_config(YAML).unwrap();
        assert_eq!(config.ranks, vec![1, 2]);
        assert_eq!(config.strategies.len(), 4);
        assert_eq!(
            config.strategies[1],
            StrategySpec::Carlberg {
                psd_tolerance: 1e-6,
                method: CarlbergMethodSpec::SnapshotGram,
            }
        );
        match &config.strategies[2] {
            StrategySpec::GradDescent {
                ridge_regularization,
                iterations,
                optimizer,
            } => {
                assert_eq!(*ridge_regularization, 1.0);
                assert_eq!(*iterations, 5);
                assert_eq!(optimizer.learning_rate, 0.01);
                assert_eq!(optimizer.rho, 0.95);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn names_match_record_keys() {
        let config = parse_config(YAML).unwrap();
        let names: Vec<_> = config.strategies.iter().map(StrategySpec::name).collect();
        assert_eq!(names, vec!["pod", "carlberg", "grad_descent", "modal"]);
    }

    #[test]
    fn rejects_duplicate_strategy() {
        let yaml = "model: m.json\noutput_dir: o\nranks: [1]\nstrategies:\n  - kind: pod\n  - kind: pod\n";
        assert!(matches!(parse_config(yaml), Err(AppError::Validation(_))));
    }

    #[test]
    fn rejects_zero_rank() {
        let yaml = "model: m.json\noutput_dir: o\nranks: [0]\nstrategies:\n  - kind: pod\n";
        assert!(matches!(parse_config(yaml), Err(AppError::Validation(_))));
    }

    #[test]
    fn rejects_bad_parameters_before_running() {
        let yaml = "model: m.json\noutput_dir: o\nranks: [1]\nstrategies:\n  - kind: grad_descent\n    ridge_regularization: -1.0\n";
        assert!(matches!(parse_config(yaml), Err(AppError::Reduction(_))));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let yaml = "model: m.json\noutput_dir: o\nranks: [1]\nstrategies:\n  - kind: lanczos\n";
        assert!(matches!(parse_config(yaml), Err(AppError::Config(_))));
    }
}
