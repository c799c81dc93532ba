//! Order-sensitive comparison of attributed trees.
//!
//! Module networks are written as gzip-compressed XML. Two runs of the same
//! producer must emit the same elements in the same order, so children and
//! attributes are aligned by position and never canonicalized.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::error;

use super::{MatchReport, Tolerance};
use crate::util::read_gzip_text;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledTree {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<LabeledTree>,
}

impl LabeledTree {
    pub fn read_gzip_xml(path: &Path) -> Result<Self> {
        let text = read_gzip_text(path)?;
        Self::parse_xml(&text, &path.display().to_string())
    }

    pub fn parse_xml(text: &str, source: &str) -> Result<Self> {
        let document = roxmltree::Document::parse(text)
            .with_context(|| format!("failed to parse xml document {source}"))?;
        Ok(Self::from_element(document.root_element()))
    }

    fn from_element(node: roxmltree::Node<'_, '_>) -> Self {
        let attributes = node
            .attributes()
            .map(|attr| (qualified_name(attr.namespace(), attr.name()), attr.value().to_string()))
            .collect();
        let children = node
            .children()
            .filter(|child| child.is_element())
            .map(Self::from_element)
            .collect();

        Self {
            tag: qualified_name(node.tag_name().namespace(), node.tag_name().name()),
            attributes,
            children,
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    #[cfg(test)]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    #[cfg(test)]
    pub fn child(mut self, child: LabeledTree) -> Self {
        self.children.push(child);
        self
    }
}

fn qualified_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(uri) => format!("{{{uri}}}{name}"),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeMismatch {
    pub path: String,
    pub kind: TreeMismatchKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeMismatchKind {
    Tag {
        reference: String,
        candidate: String,
    },
    AttributeCount {
        reference: usize,
        candidate: usize,
    },
    AttributeKey {
        position: usize,
        reference: String,
        candidate: String,
    },
    AttributeValue {
        key: String,
        reference: String,
        candidate: String,
    },
    ChildCount {
        reference: usize,
        candidate: usize,
    },
}

impl fmt::Display for TreeMismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag {
                reference,
                candidate,
            } => write!(f, "tag {reference} != {candidate}"),
            Self::AttributeCount {
                reference,
                candidate,
            } => write!(f, "attribute count {reference} != {candidate}"),
            Self::AttributeKey {
                position,
                reference,
                candidate,
            } => write!(f, "attribute key #{position} {reference} != {candidate}"),
            Self::AttributeValue {
                key,
                reference,
                candidate,
            } => write!(f, "value of {key} {reference} != {candidate}"),
            Self::ChildCount {
                reference,
                candidate,
            } => write!(f, "child count {reference} != {candidate}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeComparison {
    pub matched_nodes: usize,
    pub mismatched_nodes: usize,
    pub mismatches: Vec<TreeMismatch>,
}

impl TreeComparison {
    pub fn is_match(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn report(&self) -> MatchReport {
        MatchReport {
            matched: self.matched_nodes,
            mismatched: self.mismatched_nodes,
            ..MatchReport::default()
        }
    }

    fn record(&mut self, path: &str, kind: TreeMismatchKind) {
        error!(path = %path, mismatch = %kind, "tree mismatch");
        self.mismatches.push(TreeMismatch {
            path: path.to_string(),
            kind,
        });
    }
}

pub fn compare_trees(
    reference: &LabeledTree,
    candidate: &LabeledTree,
    tolerance: Tolerance,
) -> TreeComparison {
    let mut outcome = TreeComparison::default();
    compare_node(reference, candidate, &reference.tag, tolerance, &mut outcome);
    outcome
}

fn compare_node(
    reference: &LabeledTree,
    candidate: &LabeledTree,
    path: &str,
    tolerance: Tolerance,
    outcome: &mut TreeComparison,
) -> bool {
    if reference.tag != candidate.tag {
        outcome.record(
            path,
            TreeMismatchKind::Tag {
                reference: reference.tag.clone(),
                candidate: candidate.tag.clone(),
            },
        );
        outcome.mismatched_nodes += 1;
        return false;
    }

    if reference.attributes.len() != candidate.attributes.len() {
        outcome.record(
            path,
            TreeMismatchKind::AttributeCount {
                reference: reference.attributes.len(),
                candidate: candidate.attributes.len(),
            },
        );
        outcome.mismatched_nodes += 1;
        return false;
    }

    let mut attributes_ok = true;
    let pairs = reference.attributes.iter().zip(&candidate.attributes);
    for (position, ((ref_key, ref_value), (cand_key, cand_value))) in pairs.enumerate() {
        if ref_key != cand_key {
            outcome.record(
                path,
                TreeMismatchKind::AttributeKey {
                    position,
                    reference: ref_key.clone(),
                    candidate: cand_key.clone(),
                },
            );
            attributes_ok = false;
        } else if !tolerance.values_equal(ref_value, cand_value) {
            outcome.record(
                path,
                TreeMismatchKind::AttributeValue {
                    key: ref_key.clone(),
                    reference: ref_value.clone(),
                    candidate: cand_value.clone(),
                },
            );
            attributes_ok = false;
        }
    }
    if !attributes_ok {
        outcome.mismatched_nodes += 1;
        return false;
    }

    if reference.children.len() != candidate.children.len() {
        outcome.record(
            path,
            TreeMismatchKind::ChildCount {
                reference: reference.children.len(),
                candidate: candidate.children.len(),
            },
        );
        outcome.mismatched_nodes += 1;
        return false;
    }

    outcome.matched_nodes += 1;

    let mut subtree_ok = true;
    for (index, (ref_child, cand_child)) in
        reference.children.iter().zip(&candidate.children).enumerate()
    {
        let child_path = format!("{path}.{}[{index}]", ref_child.tag);
        subtree_ok &= compare_node(ref_child, cand_child, &child_path, tolerance, outcome);
    }
    subtree_ok
}
