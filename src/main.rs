//! Thetagen CLI - theta table precomputation
//!
//! Precomputes resource-sensitivity tables from phase profiles for use by
//! a runtime scheduling controller.

use clap::Parser;
use thetagen::config::{CliArgs, Commands, ThetaConfig};
use thetagen::engine::ThetaEngine;
use thetagen::error::Result;
use thetagen::profile::AllocPoint;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let config = ThetaConfig::from_cli(&args)?;
    let workloads = ThetaConfig::selected_workloads(&args);
    let engine = ThetaEngine::new(config).with_progress(!args.quiet);

    match args.command {
        Commands::Precompute => {
            for workload in workloads {
                let summary = engine.precompute(workload)?;
                if !args.quiet {
                    summary.print_summary();
                }
            }
        }
        Commands::Show { cache, membw } => {
            let point = AllocPoint::new(cache, membw);
            for workload in workloads {
                match engine.get_theta_entries(workload, point)? {
                    Some(seq) => print_sequence(&seq),
                    None => println!("{workload} {point}: no profile data"),
                }
            }
        }
        Commands::Scan => {
            for workload in workloads {
                let points = engine.store().scan_points(workload)?;
                println!("{workload}: {} populated allocation points", points.len());
                for point in points {
                    println!("  {point}");
                }
            }
        }
    }

    engine.release_all();
    Ok(())
}

fn print_sequence(seq: &thetagen::PhaseSequence) {
    println!(
        "=== {} at {} ({} phases) ===",
        seq.workload(),
        seq.point(),
        seq.len()
    );
    for record in seq.records() {
        println!(
            "phase {}: insns {}..={}, rate {}/ms, {} theta entries",
            record.phase_idx,
            record.insn_start,
            record.insn_end,
            record.insn_rate,
            record.theta.len()
        );
        for (&(rem_cache, rem_membw), entry) in record.theta.iter() {
            let value = entry
                .value
                .map(|v| v.to_string())
                .unwrap_or_else(|| "undefined".to_string());
            println!(
                "  rem (c{rem_cache}, b{rem_membw}): theta {value}, prefer {:?}",
                entry.which
            );
        }
    }
}
