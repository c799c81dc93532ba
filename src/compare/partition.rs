use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Result, bail};
use tracing::{error, warn};

use super::MatchReport;
use crate::util::read_text;

/// Item to cluster-label assignment read from an `item label` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    entries: Vec<(String, String)>,
}

impl Partition {
    pub fn read(path: &Path) -> Result<Self> {
        let text = read_text(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for (index, line) in text.lines().enumerate() {
            let fields = line.split_whitespace().collect::<Vec<&str>>();
            match fields.as_slice() {
                [] => continue,
                [item, label] => {
                    if !seen.insert(item.to_string()) {
                        bail!("{source}:{}: duplicate item {item}", index + 1);
                    }
                    entries.push((item.to_string(), label.to_string()));
                }
                _ => bail!(
                    "{source}:{}: expected 2 columns (item label), found {}",
                    index + 1,
                    fields.len()
                ),
            }
        }

        Ok(Self { entries })
    }

    #[cfg(test)]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(item, label)| (item.into(), label.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(item, label)| (item.as_str(), label.as_str()))
    }
}

pub fn compare_partitions(reference: &Partition, candidate: &Partition) -> MatchReport {
    let mut report = MatchReport::default();
    let mut remaining = candidate.iter().collect::<HashMap<&str, &str>>();

    for (item, label) in reference.iter() {
        match remaining.remove(item) {
            None => {
                error!(item = %item, "item missing from candidate partition");
                report.missing_in_candidate += 1;
            }
            Some(other) if other != label => {
                error!(
                    item = %item,
                    reference = %label,
                    candidate = %other,
                    "cluster label mismatch"
                );
                report.mismatched += 1;
            }
            Some(_) => report.matched += 1,
        }
    }

    let mut extra = remaining.into_keys().collect::<Vec<&str>>();
    extra.sort_unstable();
    for item in &extra {
        warn!(item = %item, "item present only in candidate partition");
    }
    report.extra_in_candidate = extra.len();

    report
}
