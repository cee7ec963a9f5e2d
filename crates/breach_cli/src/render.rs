//! Human and JSON output.

use crate::commands::{Output, ProbeReport};
use breach_core::Finding;
use breach_search::{RunReport, Verification};
use color_eyre::Result;
use console::style;

/// Print `output` to stdout
pub fn render(output: &Output, json: bool, verbose: u8) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(output)?);
        return Ok(());
    }
    match output {
        Output::Runs(reports) => reports.iter().for_each(|r| print_run(r, verbose)),
        Output::Probe(report) => print_probe(report),
    }
    Ok(())
}

fn print_run(report: &RunReport, verbose: u8) {
    let strategy = style(&report.strategy).bold();
    match &report.finding {
        Finding::Success { .. } => println!(
            "{strategy} {} {}",
            style("FOUND").green().bold(),
            report.finding.text()
        ),
        Finding::Exhausted { reason, .. } => println!(
            "{strategy} {} ({reason}) best guess: {}",
            style("EXHAUSTED").yellow().bold(),
            report.finding.text()
        ),
    }
    println!(
        "  {}",
        style(format!(
            "{} invocations, {} rejected",
            report.invocations, report.rejected
        ))
        .dim()
    );
    if let Some(hint) = resume_hint(report) {
        println!("  resume with {hint}");
    }
    if let Some(verification) = &report.verification {
        print_verification(verification);
    }
    if verbose > 0 {
        for round in &report.rounds {
            let chosen = round
                .chosen
                .map_or_else(|| "-".to_string(), |c| c.to_string());
            let previous = round
                .previous
                .map_or_else(|| "-".to_string(), |p| p.to_string());
            println!(
                "  [{:>3}] {chosen} signal {} (previous {previous}, {} tied)",
                round.position, round.best_signal, round.tied
            );
        }
    }
}

fn resume_hint(report: &RunReport) -> Option<String> {
    let index = report.resume_from?;
    Some(match report.resume_prefix {
        Some(prefix) => format!("--resume-prefix {prefix} --resume-from {index}"),
        None => format!("--resume-from {index}"),
    })
}

fn mark(ok: bool) -> console::StyledObject<&'static str> {
    if ok {
        style("ok").green()
    } else {
        style("FAIL").red().bold()
    }
}

fn print_verification(verification: &Verification) {
    println!(
        "  length {}  prefix {}  suffix {}  checksum {} ({:#06x})",
        mark(verification.length_ok),
        mark(verification.prefix_ok),
        mark(verification.suffix_ok),
        mark(verification.checksum_ok),
        verification.checksum
    );
}

fn print_probe(report: &ProbeReport) {
    let verdict = if report.verdict {
        style("true").green().bold()
    } else {
        style("false").red()
    };
    println!("verdict {verdict}  signal {}", report.signal);
    if !report.probe_args.is_empty() {
        println!("probe args {:?}", report.probe_args);
    }
    for (row, chunk) in report.window.chunks(16).enumerate() {
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        println!(
            "{:08x}  {:<47}  {}",
            report.offset + row * 16,
            hex_row(chunk),
            style(ascii).dim()
        );
    }
    if let Some(fingerprint) = &report.fingerprint {
        println!("{}", style(format!("module {fingerprint}")).dim());
    }
}

fn hex_row(chunk: &[u8]) -> String {
    chunk
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
