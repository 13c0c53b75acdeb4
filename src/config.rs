//! Configuration management for the triangulator.
//!
//! The CLI surface mirrors the construction-options table: refinement vs
//! decimation, constrained vs unconstrained, the selection and termination
//! policies, and the decimation-specific removability flags.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::driver::decimate::DecimateConfig;
use crate::driver::refine::RefineConfig;
use crate::history::{Norm, Termination};

/// Which side of the pipeline to run, chosen by the input file's role
/// rather than its extension so the CLI stays in one flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Build up detail from a point set (`.pts`/`.seg`).
    Refine,
    /// Strip detail from an existing triangulation (`.tri`/`.cdt`).
    Decimate,
}

/// `termination` option: stop after a fixed update count, or once the
/// global error crosses a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TerminationKind {
    /// Stop after `num_upd` updates.
    Nupd,
    /// Stop once the global error crosses `error_level`.
    Err,
}

/// `norm` option: how per-triangle error is aggregated into a single
/// global figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NormKind {
    /// Maximum per-triangle error.
    Max,
    /// Mean per-triangle error.
    Med,
    /// Root-mean-square per-triangle error.
    Sqm,
}

/// Top-level configuration for one triangulator run, parsed directly from
/// the command line.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct TerraConfig {
    /// Input file (`.pts`, `.seg`, `.tri`, or `.cdt` depending on `mode`).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file for the resulting triangulation. Omit to skip writing.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Whether this run refines a point set or decimates a triangulation.
    #[arg(long, value_enum, default_value = "refine")]
    pub mode: Mode,

    /// Treat the input as a CDT (honor `.seg`/`.cdt` constraint segments).
    #[arg(long, default_value = "false")]
    pub constrained: bool,

    /// Random rather than error-driven point/vertex selection.
    #[arg(long, default_value = "false")]
    pub random: bool,

    /// de Berg independent-set batching (decimation only).
    #[arg(long, default_value = "false")]
    pub simultaneous: bool,

    /// What stops the run.
    #[arg(long, value_enum, default_value = "nupd")]
    pub termination: TerminationKind,

    /// Update count target when `termination = nupd`; -1 means all.
    #[arg(long, default_value = "-1")]
    pub num_upd: i64,

    /// Error target when `termination = err`.
    #[arg(long, default_value = "0.0")]
    pub error_level: f64,

    /// Norm used to aggregate per-triangle error.
    #[arg(long, value_enum, default_value = "max")]
    pub norm: NormKind,

    /// Cap on the degree of a removable vertex during decimation; 0 means
    /// unbounded.
    #[arg(long, default_value = "0")]
    pub max_degree: usize,

    /// Enable the §4.H extended-optimization variant during decimation.
    #[arg(long, default_value = "false")]
    pub extend_optimization: bool,

    /// Allow removing vertices incident on exactly one constraint.
    #[arg(long, default_value = "false")]
    pub allow_features_del: bool,

    /// Allow removing vertices incident on exactly two constraints.
    #[arg(long, default_value = "false")]
    pub allow_chain_brk: bool,

    /// Seed for the random selection policy.
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

impl TerraConfig {
    /// Builds a new instance of `TerraConfig` from command line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// The configured termination predicate.
    #[must_use]
    pub fn to_termination(&self) -> Termination {
        match self.termination {
            TerminationKind::Nupd => {
                Termination::UpdateCount(u32::try_from(self.num_upd).ok())
            }
            TerminationKind::Err => Termination::ErrorLevel(self.error_level),
        }
    }

    /// The configured error norm.
    #[must_use]
    pub const fn to_norm(&self) -> Norm {
        match self.norm {
            NormKind::Max => Norm::Max,
            NormKind::Med => Norm::Med,
            NormKind::Sqm => Norm::Sqm,
        }
    }

    /// Builds the refinement driver's config from this one.
    #[must_use]
    pub fn to_refine_config(&self) -> RefineConfig {
        RefineConfig {
            constrained: self.constrained,
            random: self.random,
            norm: self.to_norm(),
            termination: self.to_termination(),
            seed: self.seed,
        }
    }

    /// Builds the decimation driver's config from this one.
    #[must_use]
    pub const fn to_decimate_config(&self) -> DecimateConfig {
        DecimateConfig {
            max_degree: if self.max_degree == 0 { usize::MAX } else { self.max_degree },
            allow_features_del: self.allow_features_del,
            allow_chain_brk: self.allow_chain_brk,
            simultaneous: self.simultaneous,
        }
    }

    /// Validates option combinations the type system can't express.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message if any option is out of range or
    /// mutually inconsistent.
    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.termination, TerminationKind::Nupd) && self.num_upd < -1 {
            return Err("num_upd must be -1 or a non-negative update count".to_string());
        }
        if matches!(self.termination, TerminationKind::Err) && self.error_level < 0.0 {
            return Err("error_level must be non-negative".to_string());
        }
        if self.simultaneous && self.mode == Mode::Refine {
            return Err("simultaneous batching only applies to decimation".to_string());
        }
        if self.allow_chain_brk && !self.allow_features_del {
            return Err("allow_chain_brk implies allow_features_del".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> TerraConfig {
        TerraConfig {
            input: PathBuf::from("in.pts"),
            output: None,
            mode: Mode::Refine,
            constrained: false,
            random: false,
            simultaneous: false,
            termination: TerminationKind::Nupd,
            num_upd: -1,
            error_level: 0.0,
            norm: NormKind::Max,
            max_degree: 0,
            extend_optimization: false,
            allow_features_del: false,
            allow_chain_brk: false,
            seed: 0,
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn negative_num_upd_below_all_is_rejected() {
        let cfg = TerraConfig { num_upd: -2, ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_error_level_is_rejected() {
        let cfg = TerraConfig { termination: TerminationKind::Err, error_level: -1.0, ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn simultaneous_refinement_is_rejected() {
        let cfg = TerraConfig { simultaneous: true, mode: Mode::Refine, ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn chain_break_without_feature_deletion_is_rejected() {
        let cfg = TerraConfig { allow_chain_brk: true, allow_features_del: false, ..base() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn max_degree_zero_means_unbounded() {
        let decimate = base().to_decimate_config();
        assert_eq!(decimate.max_degree, usize::MAX);
    }

    #[test]
    fn update_count_termination_all_maps_to_none() {
        let termination = base().to_termination();
        assert!(matches!(termination, Termination::UpdateCount(None)));
    }
}
