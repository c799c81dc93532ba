use super::*;

pub const CONFIG_FILE_NAME: &str = "configs.json";
const OUTPUT_FILE_KEY: &str = "output_file";
pub const DEFAULT_REGULATOR_SUFFIXES: [&str; 3] = ["all", "top", "random"];

/// The top-level `configs.json` object, keeping stages in pipeline order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageConfigs(pub Vec<(String, Map<String, Value>)>);

impl<'de> Deserialize<'de> for StageConfigs {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StageConfigsVisitor;

        impl<'de> Visitor<'de> for StageConfigsVisitor {
            type Value = StageConfigs;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an object mapping stage names to stage configs")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut stages: Vec<(String, Map<String, Value>)> = Vec::new();
                while let Some((stage, params)) = map.next_entry::<String, Map<String, Value>>()? {
                    if stages.iter().any(|(existing, _)| *existing == stage) {
                        return Err(serde::de::Error::custom(format!("duplicate stage {stage}")));
                    }
                    stages.push((stage, params));
                }
                Ok(StageConfigs(stages))
            }
        }

        deserializer.deserialize_map(StageConfigsVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Reference,
    Candidate,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Candidate => "candidate",
        }
    }
}

/// Differences between the two runs' configurations. Never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigDrift {
    StageOrder {
        position: usize,
        reference: String,
        candidate: String,
    },
    StageMissing {
        stage: String,
        missing_from: Side,
    },
    ParamMissing {
        stage: String,
        key: String,
        missing_from: Side,
    },
    ParamValue {
        stage: String,
        key: String,
        reference: Value,
        candidate: Value,
    },
}

impl ConfigDrift {
    fn log(&self) {
        match self {
            Self::StageOrder {
                position,
                reference,
                candidate,
            } => warn!(
                position,
                reference = %reference,
                candidate = %candidate,
                "stage mismatch in configs"
            ),
            Self::StageMissing {
                stage,
                missing_from,
            } => warn!(
                stage = %stage,
                missing_from = missing_from.as_str(),
                "stage missing from configs"
            ),
            Self::ParamMissing {
                stage,
                key,
                missing_from,
            } => warn!(
                stage = %stage,
                key = %key,
                missing_from = missing_from.as_str(),
                "stage config key missing"
            ),
            Self::ParamValue {
                stage,
                key,
                reference,
                candidate,
            } => warn!(
                stage = %stage,
                key = %key,
                reference = %reference,
                candidate = %candidate,
                "stage config value mismatch"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageParams {
    pub regulator_suffixes: Vec<String>,
}

impl StageParams {
    pub fn for_kind(kind: Option<ArtifactKind>) -> Self {
        let regulator_suffixes = match kind {
            Some(ArtifactKind::ModuleNetwork) => DEFAULT_REGULATOR_SUFFIXES
                .iter()
                .map(|suffix| suffix.to_string())
                .collect(),
            _ => Vec::new(),
        };
        Self { regulator_suffixes }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEntry {
    pub stage: String,
    pub kind: Option<ArtifactKind>,
    pub reference_output: Option<PathBuf>,
    pub candidate_output: Option<PathBuf>,
    pub params: StageParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageManifest {
    pub reference_dir: PathBuf,
    pub candidate_dir: PathBuf,
    pub stages: Vec<StageEntry>,
    pub drift: Vec<ConfigDrift>,
}

impl StageManifest {
    pub fn run_dir(&self, side: Side) -> &Path {
        match side {
            Side::Reference => &self.reference_dir,
            Side::Candidate => &self.candidate_dir,
        }
    }
}

pub fn load_stage_configs(run_dir: &Path) -> Result<StageConfigs> {
    let path = run_dir.join(CONFIG_FILE_NAME);
    let raw = read_text(&path)?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn build_manifest(reference_dir: &Path, candidate_dir: &Path) -> Result<StageManifest> {
    let reference = load_stage_configs(reference_dir)?;
    let candidate = load_stage_configs(candidate_dir)?;
    align_stage_configs(reference_dir, candidate_dir, reference, candidate)
}

pub fn align_stage_configs(
    reference_dir: &Path,
    candidate_dir: &Path,
    reference: StageConfigs,
    candidate: StageConfigs,
) -> Result<StageManifest> {
    let mut stages = Vec::new();
    let mut drift = Vec::new();

    let reference_len = reference.0.len();
    let candidate_len = candidate.0.len();
    let mut reference_iter = reference.0.into_iter();
    let mut candidate_iter = candidate.0.into_iter();

    for position in 0..reference_len.max(candidate_len) {
        match (reference_iter.next(), candidate_iter.next()) {
            (Some((ref_stage, mut ref_params)), Some((cand_stage, mut cand_params))) => {
                if ref_stage != cand_stage {
                    drift.push(ConfigDrift::StageOrder {
                        position,
                        reference: ref_stage,
                        candidate: cand_stage,
                    });
                    continue;
                }

                let reference_output = take_output_file(&ref_stage, &mut ref_params, reference_dir)?;
                let candidate_output =
                    take_output_file(&cand_stage, &mut cand_params, candidate_dir)?;
                drift.extend(compare_stage_params(&ref_stage, &ref_params, &cand_params));

                let kind = ArtifactKind::for_stage(&ref_stage);
                stages.push(StageEntry {
                    stage: ref_stage,
                    kind,
                    reference_output,
                    candidate_output,
                    params: StageParams::for_kind(kind),
                });
            }
            (Some((stage, _)), None) => drift.push(ConfigDrift::StageMissing {
                stage,
                missing_from: Side::Candidate,
            }),
            (None, Some((stage, _))) => drift.push(ConfigDrift::StageMissing {
                stage,
                missing_from: Side::Reference,
            }),
            (None, None) => break,
        }
    }

    for entry in &drift {
        entry.log();
    }
    debug!(stages = stages.len(), drift = drift.len(), "built stage manifest");

    Ok(StageManifest {
        reference_dir: reference_dir.to_path_buf(),
        candidate_dir: candidate_dir.to_path_buf(),
        stages,
        drift,
    })
}

fn take_output_file(
    stage: &str,
    params: &mut Map<String, Value>,
    run_dir: &Path,
) -> Result<Option<PathBuf>> {
    match params.remove(OUTPUT_FILE_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) if name.trim().is_empty() => Ok(None),
        Some(Value::String(name)) => Ok(Some(run_dir.join(name))),
        Some(other) => bail!(
            "{OUTPUT_FILE_KEY} of stage {stage} in {} must be a string or null, found {other}",
            run_dir.join(CONFIG_FILE_NAME).display()
        ),
    }
}

pub fn compare_stage_params(
    stage: &str,
    reference: &Map<String, Value>,
    candidate: &Map<String, Value>,
) -> Vec<ConfigDrift> {
    let mut drift = Vec::new();

    for (key, ref_value) in reference {
        match candidate.get(key) {
            None => drift.push(ConfigDrift::ParamMissing {
                stage: stage.to_string(),
                key: key.clone(),
                missing_from: Side::Candidate,
            }),
            Some(cand_value) if cand_value != ref_value => drift.push(ConfigDrift::ParamValue {
                stage: stage.to_string(),
                key: key.clone(),
                reference: ref_value.clone(),
                candidate: cand_value.clone(),
            }),
            Some(_) => {}
        }
    }
    for key in candidate.keys().filter(|key| !reference.contains_key(*key)) {
        drift.push(ConfigDrift::ParamMissing {
            stage: stage.to_string(),
            key: key.clone(),
            missing_from: Side::Reference,
        });
    }

    drift
}
