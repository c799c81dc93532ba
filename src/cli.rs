use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::compare::DEFAULT_TOLERANCE;
use crate::compare::graph::GraphFormat;

#[derive(Parser, Debug)]
#[command(
    name = "mnets-verify",
    version,
    about = "Check that two module-network pipeline runs produced equivalent outputs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare every stage output of a reference run against a candidate run.
    Verify(VerifyArgs),
    /// Compare the edges of two graph files.
    Graph(GraphArgs),
}

impl Commands {
    pub fn verbose(&self) -> bool {
        match self {
            Self::Verify(args) => args.verbose,
            Self::Graph(args) => args.verbose,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Directory holding the reference run and its configs.json.
    pub reference_dir: PathBuf,

    /// Directory holding the candidate run and its configs.json.
    pub candidate_dir: PathBuf,

    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Absolute tolerance for all numeric comparisons.
    #[arg(long, value_name = "TOL", default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Optional path for a JSON copy of the verification report.
    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct GraphArgs {
    /// Reference graph file.
    pub first: PathBuf,

    /// Candidate graph file.
    pub second: PathBuf,

    #[arg(long, value_enum, default_value_t = GraphFormat::Dot)]
    pub first_format: GraphFormat,

    #[arg(long, value_enum, default_value_t = GraphFormat::Dot)]
    pub second_format: GraphFormat,

    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Exit with a failure status when the edge sets differ.
    #[arg(long, default_value_t = false)]
    pub fail_on_diff: bool,
}
