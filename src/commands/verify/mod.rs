use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::cli::VerifyArgs;
use crate::compare::graph::{DirectedGraph, GraphFormat, compare_graphs};
use crate::compare::partition::{Partition, compare_partitions};
use crate::compare::scored::{ScoredAssignment, compare_scored_assignments};
use crate::compare::tree::{LabeledTree, compare_trees};
use crate::compare::{MatchReport, Tolerance};
use crate::model::{ArtifactRecord, StageCounts, StageRecord, VerificationReport};
use crate::util::{now_utc_string, read_text, sha256_file, write_json_pretty};

mod dispatch;
mod manifest;
mod output;
mod run;
#[cfg(test)]
mod tests;

use self::dispatch::*;
use self::manifest::*;
use self::output::*;

pub use self::run::run;
