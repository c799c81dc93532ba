use super::*;

pub const REPORT_VERSION: u32 = 1;

pub fn write_text_report<W: Write>(verification: &Verification, output: &mut W) -> Result<()> {
    for stage in &verification.stages {
        let kind = stage.kind.map(ArtifactKind::as_str).unwrap_or("-");
        match &stage.skip_reason {
            Some(reason) => writeln!(
                output,
                "stage {}\t{}\t{}\t{}",
                stage.stage,
                kind,
                stage.state.as_str(),
                reason
            )?,
            None => writeln!(
                output,
                "stage {}\t{}\t{}\t{}",
                stage.stage,
                kind,
                stage.state.as_str(),
                format_counts(&stage.report)
            )?,
        }
    }

    writeln!(
        output,
        "Stages: matched={} mismatched={} skipped={}",
        verification.count(StageState::Matched),
        verification.count(StageState::Mismatched),
        verification.count(StageState::Skipped),
    )?;
    writeln!(output, "Totals: {}", format_counts(&verification.totals))?;
    writeln!(
        output,
        "Verdict: {} (tolerance={:e})",
        verdict_label(verification),
        verification.tolerance.epsilon()
    )?;
    Ok(())
}

fn format_counts(report: &MatchReport) -> String {
    format!(
        "matched={} mismatched={} missing_in_candidate={} missing_in_reference={} extra_in_candidate={}",
        report.matched,
        report.mismatched,
        report.missing_in_candidate,
        report.missing_in_reference,
        report.extra_in_candidate,
    )
}

fn verdict_label(verification: &Verification) -> &'static str {
    if verification.passed() { "pass" } else { "fail" }
}

pub fn build_json_report(
    manifest: &StageManifest,
    verification: &Verification,
) -> Result<VerificationReport> {
    let mut stages = Vec::with_capacity(verification.stages.len());
    for stage in &verification.stages {
        let mut artifacts = Vec::with_capacity(stage.artifacts.len());
        for artifact in &stage.artifacts {
            artifacts.push(ArtifactRecord {
                label: artifact.label.clone(),
                reference_path: artifact.reference_path.display().to_string(),
                candidate_path: artifact.candidate_path.display().to_string(),
                reference_sha256: sha256_file(&artifact.reference_path)?,
                candidate_sha256: sha256_file(&artifact.candidate_path)?,
                ok: artifact.report.ok(),
                report: artifact.report,
            });
        }

        stages.push(StageRecord {
            stage: stage.stage.clone(),
            artifact_kind: stage.kind.map(|kind| kind.as_str().to_string()),
            state: stage.state.as_str().to_string(),
            skip_reason: stage.skip_reason.clone(),
            ok: stage.state != StageState::Mismatched,
            report: stage.report,
            artifacts,
        });
    }

    Ok(VerificationReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        reference_dir: manifest.reference_dir.display().to_string(),
        candidate_dir: manifest.candidate_dir.display().to_string(),
        tolerance: verification.tolerance.epsilon(),
        verdict: verdict_label(verification).to_string(),
        stage_counts: StageCounts {
            matched: verification.count(StageState::Matched),
            mismatched: verification.count(StageState::Mismatched),
            skipped: verification.count(StageState::Skipped),
        },
        config_drift_count: manifest.drift.len(),
        totals: verification.totals,
        stages,
    })
}
