use anyhow::{Context, Result, bail};
use clap::Parser;

use std::{fs, path::PathBuf};

/// Validate a captured indirect-branch trace document and summarize its
/// contents.
///
/// Runs the checks an annotation run would apply before touching an image:
/// the document parses, every address is hexadecimal, every snapshot carries
/// rip, and every event references a module from the module table.
///
/// Set the environment variable `RUST_LOG=debug` for parse details.
#[derive(Parser)]
struct Cmdline {
    /// Path of the trace document
    #[arg(short, long)]
    input: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();

    let Cmdline { input } = Cmdline::parse();

    let text = fs::read_to_string(&input).context("Failed to read input file")?;
    let trace =
        btlink_trace_reader::parse_trace(&text).context("Failed to parse trace document")?;

    let mut modules: Vec<_> = trace.modules.iter().collect();
    modules.sort_unstable();
    println!("modules: {}", trace.modules.len());
    for (name, base) in modules {
        println!("  {name} @ {base:#x}");
    }

    let mut same_module = 0;
    let mut cross_module = 0;
    let mut unknown: Vec<&str> = Vec::new();
    for event in &trace.branches {
        if event.before.module == event.after.module {
            same_module += 1;
        } else {
            cross_module += 1;
        }
        for module in [&event.before.module, &event.after.module] {
            if trace.modules.base_of(module).is_none() && !unknown.contains(&module.as_str()) {
                unknown.push(module);
            }
        }
    }
    println!(
        "branches: {} ({same_module} same-module, {cross_module} cross-module)",
        trace.branches.len()
    );

    if !unknown.is_empty() {
        bail!(
            "Events reference modules absent from the module table: {}",
            unknown.join(", ")
        );
    }

    Ok(())
}
