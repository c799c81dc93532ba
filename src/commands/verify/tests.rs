use std::fs;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;

use super::*;

const CONFIGS: &str = r#"{
  "ganesh": {"output_file": "ganesh.txt", "seed": 1, "num_runs": 2, "num_steps": 10},
  "tight_clusters": {"output_file": "tight_clusters.txt", "min_weight": 0.25},
  "regulators": {"output_file": "modules", "num_steps": 10, "reg_file": ""},
  "network": {"output_file": "network.dot"}
}"#;

const MODULE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ModuleNetwork>
  <Module id="0" score="1.5">
    <Gene name="g1"/>
    <Gene name="g2"/>
  </Module>
  <Module id="1" score="-0.25">
    <Gene name="g3"/>
  </Module>
</ModuleNetwork>
"#;

fn write_gz(path: &Path, text: &str) {
    let file = fs::File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn write_pipeline_run(dir: &Path) {
    fs::write(dir.join(CONFIG_FILE_NAME), CONFIGS).unwrap();
    fs::write(dir.join("ganesh.txt"), "ganesh.txt.0\nganesh.txt.1\n").unwrap();
    fs::write(dir.join("ganesh.txt.0"), "g1 1\ng2 1\ng3 2\n").unwrap();
    fs::write(dir.join("ganesh.txt.1"), "g1 4\ng2 3\ng3 3\n").unwrap();
    fs::write(dir.join("tight_clusters.txt"), "g1 0\ng2 0\ng3 1\n").unwrap();
    for suffix in DEFAULT_REGULATOR_SUFFIXES {
        fs::write(
            dir.join(format!("modules.{suffix}reg.txt")),
            "r1 0 0.750000\nr2 1 0.500000\n",
        )
        .unwrap();
    }
    write_gz(&dir.join("modules.xml.gz"), MODULE_XML);
    fs::write(
        dir.join("network.dot"),
        "digraph {\n  g1 ;\n  g2 ;\n  g3 ;\n  g1 -> g2 ;\n}\n",
    )
    .unwrap();
}

fn pipeline_pair() -> (tempfile::TempDir, tempfile::TempDir) {
    let reference = tempfile::tempdir().unwrap();
    let candidate = tempfile::tempdir().unwrap();
    write_pipeline_run(reference.path());
    write_pipeline_run(candidate.path());
    (reference, candidate)
}

fn verify(reference: &Path, candidate: &Path) -> Result<Verification> {
    let manifest = build_manifest(reference, candidate)?;
    verify_stages(&manifest, Tolerance::default())
}

fn stage<'a>(verification: &'a Verification, name: &str) -> &'a StageOutcome {
    verification
        .stages
        .iter()
        .find(|stage| stage.stage == name)
        .unwrap_or_else(|| panic!("stage {name} not in verification"))
}

fn configs(raw: &str) -> StageConfigs {
    serde_json::from_str(raw).expect("configs should deserialize")
}

#[test]
fn run_matches_itself() {
    let run = tempfile::tempdir().unwrap();
    write_pipeline_run(run.path());

    let verification = verify(run.path(), run.path()).unwrap();
    assert!(verification.passed());
    assert_eq!(verification.count(StageState::Matched), 4);
    // 2 runs x 3 items, 3 items, 3 suffixes x 2 pairs, 6 tree nodes, 1 edge.
    assert_eq!(verification.totals.matched, 22);
    assert_eq!(verification.totals.mismatched, 0);
}

#[test]
fn independent_runs_with_rounding_noise_match() {
    let (reference, candidate) = pipeline_pair();
    fs::write(
        candidate.path().join("modules.topreg.txt"),
        "r1 0 0.7500004\nr2 1 0.4999996\n",
    )
    .unwrap();
    write_gz(
        &candidate.path().join("modules.xml.gz"),
        &MODULE_XML.replace("score=\"1.5\"", "score=\"1.5000001\""),
    );

    let verification = verify(reference.path(), candidate.path()).unwrap();
    assert!(verification.passed());
    assert_eq!(stage(&verification, "regulators").state, StageState::Matched);
}

#[test]
fn label_change_fails_only_its_stage() {
    let (reference, candidate) = pipeline_pair();
    fs::write(
        candidate.path().join("tight_clusters.txt"),
        "g1 0\ng2 1\ng3 1\n",
    )
    .unwrap();

    let verification = verify(reference.path(), candidate.path()).unwrap();
    assert!(!verification.passed());
    let tight = stage(&verification, "tight_clusters");
    assert_eq!(tight.state, StageState::Mismatched);
    assert_eq!(tight.report.mismatched, 1);
    assert_eq!(stage(&verification, "ganesh").state, StageState::Matched);
    assert_eq!(stage(&verification, "regulators").state, StageState::Matched);
    assert_eq!(stage(&verification, "network").state, StageState::Matched);
}

#[test]
fn score_outside_tolerance_fails_regulators() {
    let (reference, candidate) = pipeline_pair();
    fs::write(
        candidate.path().join("modules.randomreg.txt"),
        "r1 0 0.7500011\nr2 1 0.500000\n",
    )
    .unwrap();

    let verification = verify(reference.path(), candidate.path()).unwrap();
    let regulators = stage(&verification, "regulators");
    assert_eq!(regulators.state, StageState::Mismatched);
    assert_eq!(regulators.report.mismatched, 1);
    assert_eq!(regulators.artifacts.len(), 4);
    assert!(!regulators.artifacts[2].report.ok());
    assert!(regulators.artifacts[3].report.ok());

    let manifest = build_manifest(reference.path(), candidate.path()).unwrap();
    let loose = verify_stages(&manifest, Tolerance::new(1e-5).unwrap()).unwrap();
    assert!(loose.passed());
}

#[test]
fn reordered_module_tree_fails() {
    let (reference, candidate) = pipeline_pair();
    let swapped = MODULE_XML.replace(
        "<Gene name=\"g1\"/>\n    <Gene name=\"g2\"/>",
        "<Gene name=\"g2\"/>\n    <Gene name=\"g1\"/>",
    );
    assert_ne!(swapped, MODULE_XML);
    write_gz(&candidate.path().join("modules.xml.gz"), &swapped);

    let verification = verify(reference.path(), candidate.path()).unwrap();
    let regulators = stage(&verification, "regulators");
    assert_eq!(regulators.state, StageState::Mismatched);
    assert_eq!(regulators.report.mismatched, 2);
}

#[test]
fn missing_edge_fails_network() {
    let (reference, candidate) = pipeline_pair();
    fs::write(
        candidate.path().join("network.dot"),
        "digraph {\n  g1 ;\n  g2 ;\n  g3 ;\n  g2 -> g3 ;\n}\n",
    )
    .unwrap();

    let verification = verify(reference.path(), candidate.path()).unwrap();
    let network = stage(&verification, "network");
    assert_eq!(network.state, StageState::Mismatched);
    assert_eq!(network.report.missing_in_candidate, 1);
    assert_eq!(network.report.mismatched, 1);
}

#[test]
fn differing_run_counts_fail_without_comparing_runs() {
    let (reference, candidate) = pipeline_pair();
    fs::write(candidate.path().join("ganesh.txt"), "ganesh.txt.0\n").unwrap();

    let verification = verify(reference.path(), candidate.path()).unwrap();
    let ganesh = stage(&verification, "ganesh");
    assert_eq!(ganesh.state, StageState::Mismatched);
    assert!(ganesh.artifacts.is_empty());
    assert_eq!(ganesh.report.mismatched, 1);
}

#[test]
fn runs_are_aligned_by_index() {
    let (reference, candidate) = pipeline_pair();
    fs::write(candidate.path().join("ganesh.txt"), "ganesh.txt.1\nganesh.txt.0\n").unwrap();

    let verification = verify(reference.path(), candidate.path()).unwrap();
    assert_eq!(stage(&verification, "ganesh").state, StageState::Mismatched);
}

#[test]
fn undeclared_output_skips_the_stage() {
    let (reference, candidate) = pipeline_pair();
    fs::write(
        candidate.path().join(CONFIG_FILE_NAME),
        CONFIGS.replace("\"output_file\": \"network.dot\"", "\"output_file\": null"),
    )
    .unwrap();

    let verification = verify(reference.path(), candidate.path()).unwrap();
    let network = stage(&verification, "network");
    assert_eq!(network.state, StageState::Skipped);
    assert!(network.skip_reason.is_some());
    assert!(verification.passed());
}

#[test]
fn missing_output_file_skips_the_stage() {
    let (reference, candidate) = pipeline_pair();
    fs::remove_file(candidate.path().join("modules.xml.gz")).unwrap();

    let verification = verify(reference.path(), candidate.path()).unwrap();
    assert_eq!(stage(&verification, "regulators").state, StageState::Skipped);
    assert_eq!(verification.count(StageState::Matched), 3);
    assert!(verification.passed());
}

#[test]
fn unknown_stage_is_skipped() {
    let run = tempfile::tempdir().unwrap();
    write_pipeline_run(run.path());
    fs::write(
        run.path().join(CONFIG_FILE_NAME),
        r#"{"discretize": {"output_file": "tight_clusters.txt"}}"#,
    )
    .unwrap();

    let verification = verify(run.path(), run.path()).unwrap();
    let discretize = stage(&verification, "discretize");
    assert_eq!(discretize.state, StageState::Skipped);
    assert_eq!(discretize.kind, None);
}

#[test]
fn malformed_partition_aborts_the_run() {
    let (reference, candidate) = pipeline_pair();
    fs::write(candidate.path().join("tight_clusters.txt"), "g1 0 extra\n").unwrap();

    let error = verify(reference.path(), candidate.path()).expect_err("malformed file");
    let chain = format!("{error:#}");
    assert!(chain.contains("tight_clusters"), "{chain}");
    assert!(chain.contains("expected 2 columns"), "{chain}");
}

#[test]
fn corrupt_gzip_aborts_the_run() {
    let (reference, candidate) = pipeline_pair();
    fs::write(candidate.path().join("modules.xml.gz"), "not gzip").unwrap();

    let error = verify(reference.path(), candidate.path()).expect_err("corrupt gzip");
    assert!(format!("{error:#}").contains("decompress"), "{error:#}");
}

#[test]
fn repeated_verification_is_deterministic() {
    let (reference, candidate) = pipeline_pair();
    fs::write(
        candidate.path().join("tight_clusters.txt"),
        "g1 0\ng3 1\ng4 1\n",
    )
    .unwrap();

    let first = verify(reference.path(), candidate.path()).unwrap();
    let second = verify(reference.path(), candidate.path()).unwrap();
    assert_eq!(first.totals, second.totals);
    assert_eq!(first, second);
    assert_eq!(first.totals.missing_in_candidate, 1);
    assert_eq!(first.totals.extra_in_candidate, 1);
}

#[test]
fn stage_configs_keep_file_order() {
    let parsed: StageConfigs =
        serde_json::from_str(r#"{"zeta": {"a": 1}, "alpha": {}, "mid": {"output_file": null}}"#)
            .unwrap();
    let names = parsed
        .0
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn stage_configs_reject_duplicates_and_non_objects() {
    assert!(serde_json::from_str::<StageConfigs>(r#"{"a": {}, "a": {}}"#).is_err());
    assert!(serde_json::from_str::<StageConfigs>(r#"{"a": 3}"#).is_err());
    assert!(serde_json::from_str::<StageConfigs>(r#"[]"#).is_err());
}

#[test]
fn config_drift_is_reported_without_failing() {
    let reference = configs(
        r#"{
            "ganesh": {"output_file": "g.txt", "seed": 1, "num_runs": 2},
            "tight_clusters": {"output_file": "t.txt"},
            "regulators": {"output_file": "m"}
        }"#,
    );
    let candidate = configs(
        r#"{
            "ganesh": {"output_file": "g2.txt", "seed": 7, "burn_in": 3},
            "regulators": {"output_file": "m"}
        }"#,
    );
    let reference_order = reference
        .0
        .iter()
        .map(|(stage, _)| stage.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(reference_order, vec!["ganesh", "tight_clusters", "regulators"]);

    let manifest = align_stage_configs(
        Path::new("ref"),
        Path::new("cand"),
        reference,
        candidate,
    )
    .unwrap();

    assert_eq!(manifest.stages.len(), 1);
    assert_eq!(manifest.stages[0].stage, "ganesh");
    assert_eq!(
        manifest.stages[0].reference_output.as_deref(),
        Some(Path::new("ref/g.txt"))
    );
    assert_eq!(
        manifest.stages[0].candidate_output.as_deref(),
        Some(Path::new("cand/g2.txt"))
    );
    assert!(manifest.drift.contains(&ConfigDrift::ParamValue {
        stage: "ganesh".to_string(),
        key: "seed".to_string(),
        reference: json!(1),
        candidate: json!(7),
    }));
    assert!(manifest.drift.contains(&ConfigDrift::ParamMissing {
        stage: "ganesh".to_string(),
        key: "num_runs".to_string(),
        missing_from: Side::Candidate,
    }));
    assert!(manifest.drift.contains(&ConfigDrift::ParamMissing {
        stage: "ganesh".to_string(),
        key: "burn_in".to_string(),
        missing_from: Side::Reference,
    }));
    assert!(manifest.drift.contains(&ConfigDrift::StageOrder {
        position: 1,
        reference: "tight_clusters".to_string(),
        candidate: "regulators".to_string(),
    }));
    assert!(manifest.drift.contains(&ConfigDrift::StageMissing {
        stage: "regulators".to_string(),
        missing_from: Side::Candidate,
    }));
}

#[test]
fn output_file_must_be_a_string_or_null() {
    let reference = configs(r#"{"ganesh": {"output_file": 3}}"#);
    let candidate = configs(r#"{"ganesh": {"output_file": "g.txt"}}"#);
    let error = align_stage_configs(Path::new("ref"), Path::new("cand"), reference, candidate)
        .expect_err("numeric output_file is invalid");
    assert!(error.to_string().contains("must be a string or null"), "{error}");
}

#[test]
fn empty_output_file_is_undeclared() {
    let reference = configs(r#"{"tight_clusters": {"output_file": ""}}"#);
    let candidate = configs(r#"{"tight_clusters": {"output_file": "t.txt"}}"#);
    let manifest =
        align_stage_configs(Path::new("ref"), Path::new("cand"), reference, candidate).unwrap();
    assert_eq!(manifest.stages[0].reference_output, None);
    assert_eq!(manifest.stages[0].kind, Some(ArtifactKind::Partition));
}

#[test]
fn run_paths_fall_back_to_the_run_directory() {
    let run = tempfile::tempdir().unwrap();
    fs::write(run.path().join("ganesh.txt.0"), "g1 1\n").unwrap();

    let resolved = resolve_run_path("/moved/elsewhere/ganesh.txt.0", run.path());
    assert_eq!(resolved, run.path().join("ganesh.txt.0"));

    let absolute = run.path().join("ganesh.txt.0");
    let listed = absolute.display().to_string();
    assert_eq!(resolve_run_path(&listed, Path::new("unused")), absolute);
}

#[test]
fn text_report_has_a_line_per_stage_and_a_verdict() {
    let (reference, candidate) = pipeline_pair();
    fs::write(
        candidate.path().join(CONFIG_FILE_NAME),
        CONFIGS.replace("\"output_file\": \"network.dot\"", "\"output_file\": \"\""),
    )
    .unwrap();
    fs::write(candidate.path().join("tight_clusters.txt"), "g1 0\ng2 0\n").unwrap();

    let verification = verify(reference.path(), candidate.path()).unwrap();
    let mut buffer = Vec::new();
    write_text_report(&verification, &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();

    assert!(text.contains("stage ganesh\tpartition_runs\tmatched"), "{text}");
    assert!(
        text.contains("stage tight_clusters\tpartition\tmismatched\tmatched=2 mismatched=0 missing_in_candidate=1"),
        "{text}"
    );
    assert!(text.contains("stage network\tgraph\tskipped"), "{text}");
    assert!(text.contains("Stages: matched=2 mismatched=1 skipped=1"), "{text}");
    assert!(text.contains("Verdict: fail"), "{text}");
}

#[test]
fn run_writes_json_report_and_fails_on_mismatch() {
    let (reference, candidate) = pipeline_pair();
    let out = tempfile::tempdir().unwrap();
    let report_path = out.path().join("reports").join("verification.json");

    let args = VerifyArgs {
        reference_dir: reference.path().to_path_buf(),
        candidate_dir: candidate.path().to_path_buf(),
        verbose: false,
        tolerance: 1e-6,
        report_path: Some(report_path.clone()),
    };
    run(args.clone()).expect("identical runs should pass");

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["verdict"], "pass");
    assert_eq!(report["report_version"], 1);
    assert_eq!(report["stages"].as_array().unwrap().len(), 4);
    let tree = &report["stages"][2]["artifacts"][3];
    assert_eq!(tree["label"], "modules.xml.gz");
    assert_eq!(tree["reference_sha256"], tree["candidate_sha256"]);
    assert_eq!(tree["reference_sha256"].as_str().unwrap().len(), 64);

    fs::write(candidate.path().join("ganesh.txt.1"), "g1 4\ng2 4\ng3 3\n").unwrap();
    let error = run(args).expect_err("label change should fail the run");
    assert!(error.to_string().contains("mismatches found"), "{error}");
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["verdict"], "fail");
    assert_eq!(report["stages"][0]["state"], "mismatched");
}

#[test]
fn run_rejects_invalid_tolerance() {
    let run_dir = tempfile::tempdir().unwrap();
    let args = VerifyArgs {
        reference_dir: run_dir.path().to_path_buf(),
        candidate_dir: run_dir.path().to_path_buf(),
        verbose: false,
        tolerance: 0.0,
        report_path: None,
    };
    assert!(run(args).is_err());
}
