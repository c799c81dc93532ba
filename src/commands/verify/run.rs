use super::*;

pub fn run(args: VerifyArgs) -> Result<()> {
    let tolerance = Tolerance::new(args.tolerance)?;

    info!(
        reference = %args.reference_dir.display(),
        candidate = %args.candidate_dir.display(),
        tolerance = tolerance.epsilon(),
        "verification requested"
    );

    let manifest = build_manifest(&args.reference_dir, &args.candidate_dir)?;
    let verification = verify_stages(&manifest, tolerance)?;

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_text_report(&verification, &mut output)?;
    output.flush()?;
    drop(output);

    if let Some(report_path) = &args.report_path {
        let report = build_json_report(&manifest, &verification)?;
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote verification report");
    }

    if !verification.passed() {
        bail!("mismatches found in the output files");
    }

    info!(
        stages = verification.stages.len(),
        matched = verification.totals.matched,
        "verification passed"
    );
    Ok(())
}
