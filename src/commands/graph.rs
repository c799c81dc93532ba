use std::io::{self, Write};

use anyhow::{Result, bail};
use tracing::info;

use crate::cli::GraphArgs;
use crate::compare::graph::{DirectedGraph, GraphComparison, compare_graphs};

pub fn run(args: GraphArgs) -> Result<()> {
    let first = DirectedGraph::read(&args.first, args.first_format)?;
    let second = DirectedGraph::read(&args.second, args.second_format)?;

    info!(
        path = %args.first.display(),
        format = args.first_format.as_str(),
        kind = first.kind().as_str(),
        nodes = first.node_count(),
        edges = first.edge_count(),
        "loaded first graph"
    );
    info!(
        path = %args.second.display(),
        format = args.second_format.as_str(),
        kind = second.kind().as_str(),
        nodes = second.node_count(),
        edges = second.edge_count(),
        "loaded second graph"
    );

    let comparison = compare_graphs(&first, &second);

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_edge_summary(&args, &comparison, &mut output)?;
    output.flush()?;
    drop(output);

    if args.fail_on_diff && comparison.false_positive + comparison.false_negative > 0 {
        bail!(
            "edge sets differ ({} only in {}, {} only in {})",
            comparison.false_negative,
            args.first.display(),
            comparison.false_positive,
            args.second.display()
        );
    }
    Ok(())
}

fn write_edge_summary<W: Write>(
    args: &GraphArgs,
    comparison: &GraphComparison,
    output: &mut W,
) -> Result<()> {
    writeln!(output, "Edge comparison results")?;
    if comparison.kind_mismatch {
        writeln!(output, "Graph types differ; edges compared as directed")?;
    }
    writeln!(
        output,
        "# of edges found only in {}: {}",
        args.first.display(),
        comparison.false_negative
    )?;
    writeln!(
        output,
        "# of edges found only in {}: {}",
        args.second.display(),
        comparison.false_positive
    )?;
    writeln!(output, "# of edges common to both: {}", comparison.true_positive)?;
    writeln!(output, "Precision: {}", format_ratio(precision(comparison)))?;
    writeln!(output, "Recall: {}", format_ratio(recall(comparison)))?;
    if comparison.missing_nodes > 0 {
        writeln!(
            output,
            "{} nodes were not found in {}",
            comparison.missing_nodes,
            args.second.display()
        )?;
    }
    Ok(())
}

/// `tp / (tp + fp)`, undefined when the second graph has no edges.
fn precision(comparison: &GraphComparison) -> Option<f64> {
    ratio(
        comparison.true_positive,
        comparison.true_positive + comparison.false_positive,
    )
}

/// `tp / (tp + fn)`, undefined when the first graph has no edges.
fn recall(comparison: &GraphComparison) -> Option<f64> {
    ratio(
        comparison.true_positive,
        comparison.true_positive + comparison.false_negative,
    )
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn format_ratio(value: Option<f64>) -> String {
    value
        .map(|ratio| format!("{ratio:.6}"))
        .unwrap_or_else(|| "n/a".to_string())
}
