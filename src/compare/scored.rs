use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{error, warn};

use super::{MatchReport, Tolerance};
use crate::util::read_text;

/// `(subject, group) -> score` relation, e.g. regulator to module scores.
/// Scores keep their text so identical values match even when not finite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoredAssignment {
    entries: Vec<ScoredPair>,
}

#[derive(Debug, Clone, PartialEq)]
struct ScoredPair {
    subject: String,
    group: String,
    score: String,
}

impl ScoredAssignment {
    pub fn read(path: &Path) -> Result<Self> {
        let text = read_text(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let fields = line.split_whitespace().collect::<Vec<&str>>();
            let (subject, group, score) = match fields.as_slice() {
                [] => continue,
                [subject, group, score] => (*subject, *group, *score),
                _ => bail!(
                    "{source}:{line_no}: expected 3 columns (subject group score), found {}",
                    fields.len()
                ),
            };

            score
                .parse::<f64>()
                .with_context(|| format!("{source}:{line_no}: invalid score {score}"))?;
            if !seen.insert((subject.to_string(), group.to_string())) {
                bail!("{source}:{line_no}: duplicate pair ({subject}, {group})");
            }

            entries.push(ScoredPair {
                subject: subject.to_string(),
                group: group.to_string(),
                score: score.to_string(),
            });
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub fn compare_scored_assignments(
    reference: &ScoredAssignment,
    candidate: &ScoredAssignment,
    tolerance: Tolerance,
) -> MatchReport {
    let mut report = MatchReport::default();
    let mut remaining = candidate
        .entries
        .iter()
        .map(|pair| ((pair.subject.as_str(), pair.group.as_str()), pair.score.as_str()))
        .collect::<HashMap<(&str, &str), &str>>();

    for pair in &reference.entries {
        let key = (pair.subject.as_str(), pair.group.as_str());
        match remaining.remove(&key) {
            None => {
                error!(
                    subject = %pair.subject,
                    group = %pair.group,
                    "scored pair missing from candidate"
                );
                report.missing_in_candidate += 1;
            }
            Some(score) if !tolerance.values_equal(&pair.score, score) => {
                error!(
                    subject = %pair.subject,
                    group = %pair.group,
                    reference = %pair.score,
                    candidate = %score,
                    "score outside tolerance"
                );
                report.mismatched += 1;
            }
            Some(_) => report.matched += 1,
        }
    }

    let mut leftover = remaining.into_keys().collect::<Vec<(&str, &str)>>();
    leftover.sort_unstable();
    for (subject, group) in &leftover {
        warn!(subject = %subject, group = %group, "scored pair present only in candidate");
    }
    report.missing_in_reference = leftover.len();

    report
}
