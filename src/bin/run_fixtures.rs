//! Run round-trip fixture suites.
//!
//! Usage:
//!   run_fixtures [--quiet] FILE.suite ...
//!
//! Prints one line per case and exits with status 1 if any case fails.

use fieldbus_codec::fixture::{load, run_suite};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let quiet = if let Some(pos) = args.iter().position(|a| a == "--quiet" || a == "-q") {
        args.remove(pos);
        true
    } else {
        false
    };
    if args.is_empty() {
        anyhow::bail!("usage: run_fixtures [--quiet] FILE.suite ...");
    }

    let mut passed = 0usize;
    let mut failed = 0usize;
    for path in &args {
        let path = Path::new(path);
        let suites = match load(path) {
            Ok(suites) => suites,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                failed += 1;
                continue;
            }
        };
        for suite in &suites {
            for case in run_suite(suite) {
                match case.result {
                    Ok(()) => {
                        passed += 1;
                        if !quiet {
                            println!("ok   {} / {}", case.suite, case.case);
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        println!("FAIL {} / {}: {}", case.suite, case.case, e);
                    }
                }
            }
        }
    }

    eprintln!("fixtures: {} passed, {} failed", passed, failed);
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
