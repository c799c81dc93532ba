use super::*;

/// Artifact kinds with a registered comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    PartitionRuns,
    Partition,
    ModuleNetwork,
    Graph,
}

impl ArtifactKind {
    pub fn for_stage(stage: &str) -> Option<Self> {
        match stage {
            "ganesh" => Some(Self::PartitionRuns),
            "tight_clusters" => Some(Self::Partition),
            "regulators" => Some(Self::ModuleNetwork),
            "network" | "bn" => Some(Self::Graph),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PartitionRuns => "partition_runs",
            Self::Partition => "partition",
            Self::ModuleNetwork => "module_network",
            Self::Graph => "graph",
        }
    }

    /// File whose presence decides whether the stage ran at all. Module
    /// network outputs are a prefix shared by several files.
    pub fn primary_artifact(self, output: &Path) -> PathBuf {
        match self {
            Self::ModuleNetwork => with_suffix(output, ".xml.gz"),
            _ => output.to_path_buf(),
        }
    }
}

pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Running,
    Matched,
    Mismatched,
    Skipped,
}

impl StageState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Matched => "matched",
            Self::Mismatched => "mismatched",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Matched | Self::Mismatched | Self::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactOutcome {
    pub label: String,
    pub reference_path: PathBuf,
    pub candidate_path: PathBuf,
    pub report: MatchReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: String,
    pub kind: Option<ArtifactKind>,
    pub state: StageState,
    pub skip_reason: Option<String>,
    pub report: MatchReport,
    pub artifacts: Vec<ArtifactOutcome>,
}

impl StageOutcome {
    fn pending(entry: &StageEntry) -> Self {
        Self {
            stage: entry.stage.clone(),
            kind: entry.kind,
            state: StageState::Pending,
            skip_reason: None,
            report: MatchReport::default(),
            artifacts: Vec::new(),
        }
    }

    fn transition(&mut self, next: StageState) {
        debug_assert!(
            !self.state.is_terminal(),
            "stage {} already finished as {}",
            self.stage,
            self.state.as_str()
        );
        debug!(
            stage = %self.stage,
            from = self.state.as_str(),
            to = next.as_str(),
            "stage transition"
        );
        self.state = next;
    }

    fn skip(&mut self, reason: String) {
        warn!(stage = %self.stage, reason = %reason, "skipping stage comparison");
        self.skip_reason = Some(reason);
        self.transition(StageState::Skipped);
    }

    fn record(&mut self, artifact: ArtifactOutcome) {
        info!(
            stage = %self.stage,
            artifact = %artifact.label,
            ok = artifact.report.ok(),
            matched = artifact.report.matched,
            mismatched = artifact.report.mismatched,
            "compared artifact"
        );
        self.report.merge(&artifact.report);
        self.artifacts.push(artifact);
    }

    /// Stage-level discrepancy that is not tied to a single sub-artifact.
    fn fail(&mut self) {
        self.report.mismatched += 1;
    }

    fn finish(&mut self) {
        let next = if self.report.ok() {
            StageState::Matched
        } else {
            StageState::Mismatched
        };
        self.transition(next);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub tolerance: Tolerance,
    pub stages: Vec<StageOutcome>,
    pub totals: MatchReport,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.stages
            .iter()
            .all(|stage| stage.state != StageState::Mismatched)
    }

    pub fn count(&self, state: StageState) -> usize {
        self.stages
            .iter()
            .filter(|stage| stage.state == state)
            .count()
    }
}

pub fn verify_stages(manifest: &StageManifest, tolerance: Tolerance) -> Result<Verification> {
    let mut stages = Vec::with_capacity(manifest.stages.len());
    let mut totals = MatchReport::default();

    for entry in &manifest.stages {
        let mut outcome = StageOutcome::pending(entry);
        verify_stage(manifest, entry, tolerance, &mut outcome)
            .with_context(|| format!("failed to compare outputs of stage {}", entry.stage))?;

        if outcome.state != StageState::Skipped {
            totals.merge(&outcome.report);
        }
        stages.push(outcome);
    }

    Ok(Verification {
        tolerance,
        stages,
        totals,
    })
}

fn verify_stage(
    manifest: &StageManifest,
    entry: &StageEntry,
    tolerance: Tolerance,
    outcome: &mut StageOutcome,
) -> Result<()> {
    let Some(kind) = entry.kind else {
        outcome.skip("no comparator registered for this stage".to_string());
        return Ok(());
    };
    let (Some(reference), Some(candidate)) = (&entry.reference_output, &entry.candidate_output)
    else {
        outcome.skip("output file is not declared by both runs".to_string());
        return Ok(());
    };

    for (side, output) in [(Side::Reference, reference), (Side::Candidate, candidate)] {
        let primary = kind.primary_artifact(output);
        if !primary.exists() {
            outcome.skip(format!(
                "{} output {} is missing",
                side.as_str(),
                primary.display()
            ));
            return Ok(());
        }
    }

    outcome.transition(StageState::Running);
    info!(stage = %entry.stage, kind = kind.as_str(), "comparing stage outputs");

    match kind {
        ArtifactKind::PartitionRuns => {
            compare_partition_runs(manifest, reference, candidate, outcome)?
        }
        ArtifactKind::Partition => outcome.record(compare_partition_files(reference, candidate)?),
        ArtifactKind::ModuleNetwork => {
            compare_module_network(reference, candidate, &entry.params, tolerance, outcome)?
        }
        ArtifactKind::Graph => outcome.record(compare_graph_files(reference, candidate)?),
    }

    outcome.finish();
    Ok(())
}

fn compare_partition_files(reference: &Path, candidate: &Path) -> Result<ArtifactOutcome> {
    info!(
        reference = %reference.display(),
        candidate = %candidate.display(),
        "comparing partitions"
    );
    let reference_partition = Partition::read(reference)?;
    let candidate_partition = Partition::read(candidate)?;
    if reference_partition.is_empty() {
        warn!(path = %reference.display(), "reference partition is empty");
    }
    debug!(
        reference_items = reference_partition.len(),
        candidate_items = candidate_partition.len(),
        "loaded partitions"
    );

    Ok(ArtifactOutcome {
        label: file_label(reference),
        reference_path: reference.to_path_buf(),
        candidate_path: candidate.to_path_buf(),
        report: compare_partitions(&reference_partition, &candidate_partition),
    })
}

/// Repeated randomized clustering runs are aligned by index only.
fn compare_partition_runs(
    manifest: &StageManifest,
    reference_list: &Path,
    candidate_list: &Path,
    outcome: &mut StageOutcome,
) -> Result<()> {
    let reference_runs = read_run_list(reference_list, manifest.run_dir(Side::Reference))?;
    let candidate_runs = read_run_list(candidate_list, manifest.run_dir(Side::Candidate))?;

    if reference_runs.len() != candidate_runs.len() {
        error!(
            stage = %outcome.stage,
            reference = reference_runs.len(),
            candidate = candidate_runs.len(),
            "mismatch in number of partition runs"
        );
        outcome.fail();
        return Ok(());
    }

    for (reference, candidate) in reference_runs.iter().zip(&candidate_runs) {
        outcome.record(compare_partition_files(reference, candidate)?);
    }
    Ok(())
}

fn read_run_list(list_path: &Path, run_dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(read_text(list_path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| resolve_run_path(line, run_dir))
        .collect())
}

/// Run lists record paths as the producer wrote them; fall back to the
/// file name inside the run directory when the run was moved.
pub fn resolve_run_path(listed: &str, run_dir: &Path) -> PathBuf {
    let path = PathBuf::from(listed);
    if path.exists() {
        return path;
    }
    if path.is_relative() {
        let joined = run_dir.join(&path);
        if joined.exists() {
            return joined;
        }
    }
    match path.file_name() {
        Some(name) => run_dir.join(name),
        None => path,
    }
}

fn compare_module_network(
    reference: &Path,
    candidate: &Path,
    params: &StageParams,
    tolerance: Tolerance,
    outcome: &mut StageOutcome,
) -> Result<()> {
    for suffix in &params.regulator_suffixes {
        let extension = format!(".{suffix}reg.txt");
        let reference_path = with_suffix(reference, &extension);
        let candidate_path = with_suffix(candidate, &extension);
        info!(
            reference = %reference_path.display(),
            candidate = %candidate_path.display(),
            "comparing regulators"
        );

        let reference_scores = ScoredAssignment::read(&reference_path)?;
        let candidate_scores = ScoredAssignment::read(&candidate_path)?;
        debug!(
            reference_pairs = reference_scores.len(),
            candidate_pairs = candidate_scores.len(),
            "loaded regulator scores"
        );

        let report = compare_scored_assignments(&reference_scores, &candidate_scores, tolerance);
        outcome.record(ArtifactOutcome {
            label: file_label(&reference_path),
            reference_path,
            candidate_path,
            report,
        });
    }

    let reference_path = with_suffix(reference, ".xml.gz");
    let candidate_path = with_suffix(candidate, ".xml.gz");
    info!(
        reference = %reference_path.display(),
        candidate = %candidate_path.display(),
        "comparing module networks"
    );
    let reference_tree = LabeledTree::read_gzip_xml(&reference_path)?;
    let candidate_tree = LabeledTree::read_gzip_xml(&candidate_path)?;
    debug!(
        reference_nodes = reference_tree.node_count(),
        candidate_nodes = candidate_tree.node_count(),
        "loaded module trees"
    );

    let comparison = compare_trees(&reference_tree, &candidate_tree, tolerance);
    if !comparison.is_match() {
        let first = &comparison.mismatches[0];
        warn!(
            first_path = %first.path,
            first_mismatch = %first.kind,
            total = comparison.mismatches.len(),
            "module networks diverge"
        );
    }
    outcome.record(ArtifactOutcome {
        label: file_label(&reference_path),
        reference_path,
        candidate_path,
        report: comparison.report(),
    });
    Ok(())
}

fn compare_graph_files(reference: &Path, candidate: &Path) -> Result<ArtifactOutcome> {
    let reference_format = GraphFormat::from_path(reference);
    let candidate_format = GraphFormat::from_path(candidate);
    info!(
        reference = %reference.display(),
        reference_format = reference_format.as_str(),
        candidate = %candidate.display(),
        candidate_format = candidate_format.as_str(),
        "comparing graphs"
    );

    let reference_graph = DirectedGraph::read(reference, reference_format)?;
    let candidate_graph = DirectedGraph::read(candidate, candidate_format)?;
    let comparison = compare_graphs(&reference_graph, &candidate_graph);
    info!(
        true_positive = comparison.true_positive,
        false_positive = comparison.false_positive,
        false_negative = comparison.false_negative,
        "edge comparison results"
    );

    Ok(ArtifactOutcome {
        label: file_label(reference),
        reference_path: reference.to_path_buf(),
        candidate_path: candidate.to_path_buf(),
        report: comparison.report(),
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
