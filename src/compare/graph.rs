use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use regex::Regex;
use tracing::{error, info, warn};

use super::{MatchReport, dot};
use crate::util::read_text;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum GraphFormat {
    Dot,
    #[value(name = "el")]
    EdgeList,
}

impl GraphFormat {
    pub fn from_path(path: &Path) -> Self {
        let is_dot = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("dot") || ext.eq_ignore_ascii_case("gv"))
            .unwrap_or(false);
        if is_dot { Self::Dot } else { Self::EdgeList }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dot => "dot",
            Self::EdgeList => "el",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GraphKind {
    Directed,
    Undirected,
}

impl GraphKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directed => "digraph",
            Self::Undirected => "graph",
        }
    }
}

/// Rewrites `A-B` to `A.B` so hyphenated variable names from different
/// producers resolve to the same node.
struct NameNormalizer {
    hyphen: Regex,
}

impl NameNormalizer {
    fn new() -> Result<Self> {
        let hyphen = Regex::new(r"(\w)-(\w)").context("failed to compile node name regex")?;
        Ok(Self { hyphen })
    }

    fn normalize(&self, name: &str) -> String {
        let mut current = name.to_string();
        loop {
            let next = self.hyphen.replace_all(&current, "$1.$2").into_owned();
            if next == current {
                return current;
            }
            current = next;
        }
    }
}

/// Named nodes plus collapsed edges. Undirected graphs keep each edge in the
/// orientation it was first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedGraph {
    kind: GraphKind,
    nodes: Vec<String>,
    node_set: HashSet<String>,
    edges: Vec<(String, String)>,
    edge_set: HashSet<(String, String)>,
}

impl DirectedGraph {
    pub fn new(kind: GraphKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            node_set: HashSet::new(),
            edges: Vec::new(),
            edge_set: HashSet::new(),
        }
    }

    pub fn read(path: &Path, format: GraphFormat) -> Result<Self> {
        let text = read_text(path)?;
        let source = path.display().to_string();
        match format {
            GraphFormat::Dot => Self::parse_dot(&text, &source),
            GraphFormat::EdgeList => Self::parse_edge_list(&text, &source),
        }
    }

    pub fn parse_dot(text: &str, source: &str) -> Result<Self> {
        let normalizer = NameNormalizer::new()?;
        let parsed = dot::parse(text, source)?;

        let mut graph = Self::new(parsed.kind);
        for node in &parsed.nodes {
            graph.add_node(&normalizer.normalize(node));
        }
        for (from, to) in &parsed.edges {
            graph.add_edge(&normalizer.normalize(from), &normalizer.normalize(to));
        }
        Ok(graph)
    }

    pub fn parse_edge_list(text: &str, source: &str) -> Result<Self> {
        let normalizer = NameNormalizer::new()?;
        let mut graph = Self::new(GraphKind::Undirected);

        for (index, line) in text.lines().enumerate() {
            let fields = line.split_whitespace().collect::<Vec<&str>>();
            match fields.as_slice() {
                [] => continue,
                [from, to] => graph.add_edge(&normalizer.normalize(from), &normalizer.normalize(to)),
                _ => bail!(
                    "{source}:{}: expected 2 columns (source target), found {}",
                    index + 1,
                    fields.len()
                ),
            }
        }

        Ok(graph)
    }

    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    pub fn add_node(&mut self, name: &str) {
        if self.node_set.insert(name.to_string()) {
            self.nodes.push(name.to_string());
        }
    }

    pub fn add_edge(&mut self, source: &str, target: &str) {
        self.add_node(source);
        self.add_node(target);

        let edge = (source.to_string(), target.to_string());
        let reversed_seen = self.kind == GraphKind::Undirected
            && self
                .edge_set
                .contains(&(target.to_string(), source.to_string()));
        if !reversed_seen && self.edge_set.insert(edge.clone()) {
            self.edges.push(edge);
        }
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.node_set.contains(name)
    }

    pub fn has_edge(&self, source: &str, target: &str, either_orientation: bool) -> bool {
        let forward = (source.to_string(), target.to_string());
        if self.edge_set.contains(&forward) {
            return true;
        }
        either_orientation
            && self
                .edge_set
                .contains(&(target.to_string(), source.to_string()))
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphComparison {
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub missing_nodes: usize,
    pub kind_mismatch: bool,
}

impl GraphComparison {
    /// A candidate-only edge counts as a mismatch; a reference edge the
    /// candidate lacks counts as missing.
    pub fn report(&self) -> MatchReport {
        MatchReport {
            matched: self.true_positive,
            mismatched: self.false_positive,
            missing_in_candidate: self.false_negative,
            ..MatchReport::default()
        }
    }
}

pub fn compare_graphs(reference: &DirectedGraph, candidate: &DirectedGraph) -> GraphComparison {
    let mut outcome = GraphComparison::default();

    if reference.kind() != candidate.kind() {
        warn!(
            reference = reference.kind().as_str(),
            candidate = candidate.kind().as_str(),
            "comparing graphs of different types; using directed semantics"
        );
        outcome.kind_mismatch = true;
    }

    for node in reference.nodes() {
        if !candidate.has_node(node) {
            info!(node = %node, "node not found in candidate graph");
            outcome.missing_nodes += 1;
        }
    }
    if outcome.missing_nodes > 0 {
        warn!(
            count = outcome.missing_nodes,
            "reference nodes were not found in the candidate graph"
        );
    }

    let either_orientation = reference.kind() == GraphKind::Undirected
        && candidate.kind() == GraphKind::Undirected;
    for (source, target) in reference.edges() {
        if candidate.has_edge(source, target, either_orientation) {
            outcome.true_positive += 1;
        } else {
            error!(edge = %format!("{source} -> {target}"), "edge not found in candidate graph");
            outcome.false_negative += 1;
        }
    }
    outcome.false_positive = candidate.edge_count().saturating_sub(outcome.true_positive);

    outcome
}
