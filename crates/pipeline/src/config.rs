// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pipeline configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! skip_int_normalization = false
//! skip_precision_narrowing = false
//! preserve_boundary_dtypes = true
//! target_output_dtype = "float32"
//! clamp_fp16 = true
//! min_positive_fp16 = 1e-7
//! max_finite_fp16 = 1e4
//! node_block_list = ["decoder/noise_scale"]
//! check_int32_range = false
//! verify_structure = true
//! ```
//!
//! Every key is optional; missing keys take their default.

use crate::PipelineError;
use compat_passes::{
    Float16Converter, IntWidthNormalizer, OutputDType, PrecisionNarrower, DEFAULT_OP_BLOCK_LIST,
};
use std::path::Path;
use tensor_core::{f16, Fp16Clamp, RangePolicy};

/// Configuration for a compatibility run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompatConfig {
    /// Leave 64-bit integer types in place.
    pub skip_int_normalization: bool,
    /// Leave scalar graph inputs at rank 0.
    pub skip_rank_normalization: bool,
    /// Keep the graph at `float32`.
    pub skip_precision_narrowing: bool,
    /// Keep external inputs and outputs at `float32` behind adapter casts.
    pub preserve_boundary_dtypes: bool,
    /// Element type every float graph output carries after narrowing.
    pub target_output_dtype: OutputDType,
    /// Clamp `float32` payloads into the `float16` range before rounding.
    pub clamp_fp16: bool,
    pub min_positive_fp16: f32,
    pub max_finite_fp16: f32,
    /// Operation kinds kept at `float32`.
    pub op_block_list: Vec<String>,
    /// Node names kept at `float32`.
    pub node_block_list: Vec<String>,
    /// Reject 64-bit integers outside the `i32` range instead of truncating.
    pub check_int32_range: bool,
    /// Check that every node input resolves before the result is written.
    pub verify_structure: bool,
}

impl Default for CompatConfig {
    fn default() -> Self {
        let clamp = Fp16Clamp::default();
        Self {
            skip_int_normalization: false,
            skip_rank_normalization: false,
            skip_precision_narrowing: false,
            preserve_boundary_dtypes: true,
            target_output_dtype: OutputDType::Float32,
            clamp_fp16: true,
            min_positive_fp16: clamp.min_positive,
            max_finite_fp16: clamp.max_finite,
            op_block_list: DEFAULT_OP_BLOCK_LIST.iter().map(|s| s.to_string()).collect(),
            node_block_list: Vec::new(),
            check_int32_range: false,
            verify_structure: true,
        }
    }
}

impl CompatConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| PipelineError::ConfigError(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Checks the clamp bounds.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.clamp_fp16 {
            return Ok(());
        }
        let min = self.min_positive_fp16;
        let max = self.max_finite_fp16;
        if !(min > 0.0 && min.is_finite()) {
            return Err(PipelineError::ConfigError(format!(
                "min_positive_fp16 must be a positive finite value, got {min}"
            )));
        }
        if !(max > min && max <= f16::MAX.to_f32()) {
            return Err(PipelineError::ConfigError(format!(
                "max_finite_fp16 must lie in ({min}, {}], got {max}",
                f16::MAX
            )));
        }
        Ok(())
    }

    /// Integer narrowing policy selected by `check_int32_range`.
    pub fn range_policy(&self) -> RangePolicy {
        if self.check_int32_range {
            RangePolicy::Checked
        } else {
            RangePolicy::Truncate
        }
    }

    /// The fp16 clamp, or `None` when clamping is disabled.
    pub fn fp16_clamp(&self) -> Option<Fp16Clamp> {
        self.clamp_fp16.then(|| Fp16Clamp {
            min_positive: self.min_positive_fp16,
            max_finite: self.max_finite_fp16,
        })
    }

    /// Builds the integer-width stage.
    pub fn int_width_normalizer(&self) -> IntWidthNormalizer {
        IntWidthNormalizer::with_policy(self.range_policy())
    }

    /// Builds the precision stage.
    pub fn precision_narrower(&self) -> PrecisionNarrower {
        let converter = Float16Converter::new()
            .keep_io_types(self.preserve_boundary_dtypes)
            .clamp(self.fp16_clamp())
            .op_block_list(self.op_block_list.iter().cloned())
            .node_block_list(self.node_block_list.iter().cloned());
        PrecisionNarrower::new(converter, self.target_output_dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = CompatConfig::default();
        assert!(!c.skip_int_normalization);
        assert!(!c.skip_precision_narrowing);
        assert!(c.preserve_boundary_dtypes);
        assert_eq!(c.target_output_dtype, OutputDType::Float32);
        assert_eq!(c.op_block_list.len(), DEFAULT_OP_BLOCK_LIST.len());
        assert_eq!(c.range_policy(), RangePolicy::Truncate);
        assert!(c.verify_structure);
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
skip_precision_narrowing = true
target_output_dtype = "float16"
check_int32_range = true
node_block_list = ["noise"]
"#;
        let c = CompatConfig::from_toml(toml).unwrap();
        assert!(c.skip_precision_narrowing);
        assert_eq!(c.target_output_dtype, OutputDType::Float16);
        assert_eq!(c.range_policy(), RangePolicy::Checked);
        assert_eq!(c.node_block_list, vec!["noise"]);
        // Unspecified keys keep their defaults.
        assert!(c.preserve_boundary_dtypes);
        assert!(c.clamp_fp16);
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = CompatConfig {
            skip_int_normalization: true,
            max_finite_fp16: 3e4,
            ..Default::default()
        };
        let back = CompatConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_unknown_output_dtype_rejected() {
        assert!(CompatConfig::from_toml("target_output_dtype = \"int8\"").is_err());
    }

    #[test]
    fn test_invalid_clamp_rejected() {
        assert!(CompatConfig::from_toml("min_positive_fp16 = 0.0").is_err());
        assert!(CompatConfig::from_toml("max_finite_fp16 = 1e6").is_err());
        // Bounds are irrelevant when clamping is off.
        assert!(CompatConfig::from_toml("clamp_fp16 = false\nmax_finite_fp16 = 1e6").is_ok());
    }

    #[test]
    fn test_fp16_clamp() {
        let c = CompatConfig::default();
        let clamp = c.fp16_clamp().unwrap();
        assert_eq!(clamp.max_finite, 1e4);
        let off = CompatConfig {
            clamp_fp16: false,
            ..Default::default()
        };
        assert!(off.fp16_clamp().is_none());
    }

    #[test]
    fn test_from_missing_file() {
        let err = CompatConfig::from_file(Path::new("/nonexistent/compat.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read config"));
    }
}
