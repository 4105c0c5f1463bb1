//! Multi-seed level survey
//!
//! Generates many levels from one parameter set, audits each, and summarizes
//! the spread: how often levels come out broken, how many locks and deadends
//! a typical level gets. Uses rayon to spread generation across cores; each
//! level's seed is derived from the base seed with SHA3, so a survey is
//! reproducible.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::info;

use crate::constants::MAX_LOCKS;
use crate::generation::audit::{audit_level, LevelAudit};
use crate::generation::{generate_level, LevelParams};

/// One surveyed level
#[derive(Debug, Clone, Serialize)]
pub struct LevelSample {
    pub seed: u64,
    pub rooms: usize,
    pub deadends: usize,
    pub locks: usize,
    pub corridors: usize,
    pub critters: usize,
    pub items: usize,
    pub audit: LevelAudit,
}

/// Overall health of a parameter set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurveyGrade {
    Flawless,   // no failed audits
    Acceptable, // < 1% failed
    Degraded,   // < 5% failed
    Broken,     // >= 5% failed
}

impl SurveyGrade {
    pub fn from_failure_rate(rate: f32) -> Self {
        if rate <= 0.0 {
            SurveyGrade::Flawless
        } else if rate < 0.01 {
            SurveyGrade::Acceptable
        } else if rate < 0.05 {
            SurveyGrade::Degraded
        } else {
            SurveyGrade::Broken
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SurveyReport {
    pub levels: u64,
    pub failed_seeds: Vec<u64>,
    pub avg_rooms: f32,
    pub avg_deadends: f32,
    pub avg_locks: f32,
    pub avg_corridors: f32,
    pub avg_open_cells: f32,
    /// Levels by number of locks, index = lock count
    pub lock_histogram: Vec<u64>,
    pub grade: SurveyGrade,
}

#[derive(Debug, Clone)]
pub struct SurveyConfig {
    pub level_count: u64,
    pub base_seed: u64,
    pub params: LevelParams,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            level_count: 200,
            base_seed: 42,
            params: LevelParams::default(),
        }
    }
}

/// Seed of the `index`-th surveyed level
pub fn sample_seed(base_seed: u64, index: u64) -> u64 {
    let mut hasher = Sha3_256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(index.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

pub fn sample_level(params: &LevelParams, seed: u64) -> LevelSample {
    let level = generate_level(params, seed);
    LevelSample {
        seed,
        rooms: level.rooms.len(),
        deadends: level.rooms.iter().filter(|r| r.is_deadend()).count(),
        locks: level.lock_chain.len(),
        corridors: level.connections.connection_count(),
        critters: level.critters.len(),
        items: level.items.len(),
        audit: audit_level(&level),
    }
}

/// Run the survey with rayon parallelism
pub fn run_level_survey(config: &SurveyConfig) -> SurveyReport {
    let seeds: Vec<u64> = (0..config.level_count)
        .map(|i| sample_seed(config.base_seed, i))
        .collect();

    let samples: Vec<LevelSample> = seeds
        .par_iter()
        .map(|seed| sample_level(&config.params, *seed))
        .collect();

    let report = summarize(&samples);
    info!(
        levels = report.levels,
        failed = report.failed_seeds.len(),
        grade = ?report.grade,
        "survey finished"
    );
    report
}

fn mean(samples: &[LevelSample], field: impl Fn(&LevelSample) -> usize) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| field(s) as f32).sum::<f32>() / samples.len() as f32
}

fn summarize(samples: &[LevelSample]) -> SurveyReport {
    let failed_seeds: Vec<u64> = samples
        .iter()
        .filter(|s| !s.audit.is_clean())
        .map(|s| s.seed)
        .collect();

    let mut lock_histogram = vec![0u64; MAX_LOCKS + 1];
    for sample in samples {
        if let Some(slot) = lock_histogram.get_mut(sample.locks) {
            *slot += 1;
        }
    }

    let rate = if samples.is_empty() {
        0.0
    } else {
        failed_seeds.len() as f32 / samples.len() as f32
    };

    SurveyReport {
        levels: samples.len() as u64,
        failed_seeds,
        avg_rooms: mean(samples, |s| s.rooms),
        avg_deadends: mean(samples, |s| s.deadends),
        avg_locks: mean(samples, |s| s.locks),
        avg_corridors: mean(samples, |s| s.corridors),
        avg_open_cells: mean(samples, |s| s.audit.open_cells),
        lock_histogram,
        grade: SurveyGrade::from_failure_rate(rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_survey_is_flawless() {
        let config = SurveyConfig {
            level_count: 40,
            ..SurveyConfig::default()
        };
        let report = run_level_survey(&config);
        assert_eq!(report.levels, 40);
        assert!(report.failed_seeds.is_empty(), "{:?}", report.failed_seeds);
        assert_eq!(report.grade, SurveyGrade::Flawless);
        assert_eq!(report.lock_histogram.iter().sum::<u64>(), 40);
        assert_eq!(report.avg_rooms, 10.0);
    }

    #[test]
    fn test_survey_deterministic() {
        let config = SurveyConfig {
            level_count: 12,
            base_seed: 7,
            ..SurveyConfig::default()
        };
        let a = run_level_survey(&config);
        let b = run_level_survey(&config);
        assert_eq!(a.avg_locks, b.avg_locks);
        assert_eq!(a.avg_open_cells, b.avg_open_cells);
        assert_eq!(a.lock_histogram, b.lock_histogram);
    }

    #[test]
    fn test_sample_seeds_differ() {
        assert_ne!(sample_seed(42, 0), sample_seed(42, 1));
        assert_eq!(sample_seed(42, 3), sample_seed(42, 3));
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(SurveyGrade::from_failure_rate(0.0), SurveyGrade::Flawless);
        assert_eq!(SurveyGrade::from_failure_rate(0.005), SurveyGrade::Acceptable);
        assert_eq!(SurveyGrade::from_failure_rate(0.02), SurveyGrade::Degraded);
        assert_eq!(SurveyGrade::from_failure_rate(0.5), SurveyGrade::Broken);
    }

    #[test]
    fn test_empty_survey() {
        let report = run_level_survey(&SurveyConfig {
            level_count: 0,
            ..SurveyConfig::default()
        });
        assert_eq!(report.levels, 0);
        assert_eq!(report.avg_rooms, 0.0);
        assert_eq!(report.grade, SurveyGrade::Flawless);
    }

    #[test]
    fn test_report_serialization() {
        let report = run_level_survey(&SurveyConfig {
            level_count: 3,
            ..SurveyConfig::default()
        });
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("lock_histogram"));
        assert!(json.contains("grade"));
    }
}
