use serde::Serialize;

use crate::compare::MatchReport;

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub report_version: u32,
    pub generated_at: String,
    pub reference_dir: String,
    pub candidate_dir: String,
    pub tolerance: f64,
    pub verdict: String,
    pub stage_counts: StageCounts,
    pub config_drift_count: usize,
    pub totals: MatchReport,
    pub stages: Vec<StageRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageCounts {
    pub matched: usize,
    pub mismatched: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub artifact_kind: Option<String>,
    pub state: String,
    pub skip_reason: Option<String>,
    pub ok: bool,
    pub report: MatchReport,
    pub artifacts: Vec<ArtifactRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub label: String,
    pub reference_path: String,
    pub candidate_path: String,
    pub reference_sha256: String,
    pub candidate_sha256: String,
    pub ok: bool,
    pub report: MatchReport,
}
