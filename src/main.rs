use anyhow::{Context, Result};
use clap::Parser;
use mutrep::codegen::MachineDescription;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "mutrep-gen - Generate the hierarchical lock topology of a machine"
)]
struct Cli {
    /// JSON machine description; the built-in 128-cpu machine when omitted
    description: Option<PathBuf>,

    /// Write the generated module here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only validate the description and print the lock tree shape
    #[arg(long)]
    check: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let description = match &cli.description {
        Some(path) => MachineDescription::load(path)?,
        None => MachineDescription::default(),
    };

    if cli.check {
        let topology = description.topology()?;
        println!(
            "{}: {} locks, levels {:?}, {} cpus per leaf",
            description.nomenclature,
            topology.lock_count(),
            topology.level_counts(),
            topology.cpus_per_leaf
        );
        return Ok(());
    }

    let source = description.render()?;
    match &cli.output {
        Some(path) => fs::write(path, source)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{source}"),
    }
    Ok(())
}
