// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-stage pipeline report.
//!
//! [`PipelineReport`] records, for every stage in order, whether it ran,
//! what it changed and how long it took. The counts are observability only;
//! no decision in the pipeline depends on them.

use compat_passes::PassStats;
use std::time::Duration;

/// Whether a stage ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Applied,
    Skipped,
}

/// Outcome of one stage.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StageReport {
    /// Stage name, as returned by the pass.
    pub stage: String,
    pub status: StageStatus,
    pub stats: PassStats,
    pub duration: Duration,
}

/// Outcome of a whole pipeline run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
    /// Whether the reference check ran on the final graph.
    pub structure_verified: bool,
    /// Size of the written document, once serialized.
    pub output_bytes: Option<u64>,
    pub total_duration: Duration,
}

impl PipelineReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stage that ran.
    pub fn record_applied(&mut self, stage: &str, stats: PassStats, duration: Duration) {
        self.stages.push(StageReport {
            stage: stage.to_string(),
            status: StageStatus::Applied,
            stats,
            duration,
        });
    }

    /// Records a stage disabled by configuration.
    pub fn record_skipped(&mut self, stage: &str) {
        self.stages.push(StageReport {
            stage: stage.to_string(),
            status: StageStatus::Skipped,
            stats: PassStats::default(),
            duration: Duration::ZERO,
        });
    }

    /// Looks up a stage by name.
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    /// Sum of rewrites over all applied stages.
    pub fn total_rewrites(&self) -> usize {
        self.stages.iter().map(|s| s.stats.rewrites).sum()
    }

    /// Sum of inserted casts over all applied stages.
    pub fn total_casts_inserted(&self) -> usize {
        self.stages.iter().map(|s| s.stats.casts_inserted).sum()
    }

    /// Serialises the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let applied = self
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::Applied)
            .count();
        let size = self
            .output_bytes
            .map(|b| format!(", {:.2} MB written", b as f64 / (1024.0 * 1024.0)))
            .unwrap_or_default();
        format!(
            "Pipeline: {applied}/{} stages applied, {} rewrites, {} casts inserted, {:.2}ms{size}",
            self.stages.len(),
            self.total_rewrites(),
            self.total_casts_inserted(),
            self.total_duration.as_secs_f64() * 1000.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(rewrites: usize, casts: usize) -> PassStats {
        PassStats {
            rewrites,
            casts_inserted: casts,
            ..Default::default()
        }
    }

    #[test]
    fn test_totals() {
        let mut r = PipelineReport::new();
        r.record_applied("int-width", stats(4, 0), Duration::from_millis(1));
        r.record_skipped("rank");
        r.record_applied("precision", stats(10, 3), Duration::from_millis(2));
        assert_eq!(r.total_rewrites(), 14);
        assert_eq!(r.total_casts_inserted(), 3);
        assert_eq!(r.stage("rank").unwrap().status, StageStatus::Skipped);
        assert!(r.stage("missing").is_none());
    }

    #[test]
    fn test_summary() {
        let mut r = PipelineReport::new();
        r.record_applied("int-width", stats(2, 0), Duration::ZERO);
        r.record_skipped("precision");
        r.output_bytes = Some(2 * 1024 * 1024);
        let s = r.summary();
        assert!(s.contains("1/2 stages applied"));
        assert!(s.contains("2.00 MB written"));
    }

    #[test]
    fn test_json_status_names() {
        let mut r = PipelineReport::new();
        r.record_skipped("int-width");
        let json = r.to_json().unwrap();
        assert!(json.contains("\"status\": \"skipped\""));
        assert!(json.contains("\"relaxed_retry\": false"));
    }
}
