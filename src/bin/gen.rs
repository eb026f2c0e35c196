//! ipdeny-gen: CLI tool for building and querying IPv4 deny-lists.

use clap::{Parser, Subcommand};
use ipdeny::build::Builder;
use ipdeny::decompose::{decompose, parse_bound};
use ipdeny::metadata::BuildMetadata;
use ipdeny::source::TextListSource;
use ipdeny::{BuildConfig, FailurePolicy, LogProgress, RangeIndex};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ipdeny-gen")]
#[command(version = "0.1.0")]
#[command(about = "Build and query minimal IPv4 deny-lists", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured feed and write the deduplicated list
    Build {
        /// YAML build configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Output list file (overrides the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the build if the existing list is younger than this many hours
        #[arg(long)]
        if_older_than: Option<u64>,
    },

    /// Deduplicate a local token list
    Dedup {
        /// Input list file
        #[arg(short, long)]
        input: PathBuf,

        /// Output list file
        #[arg(short, long)]
        output: PathBuf,

        /// Fail on the first malformed line instead of skipping it
        #[arg(long)]
        strict: bool,
    },

    /// Print the minimal CIDR blocks covering an inclusive range
    Decompose {
        /// First address (dotted quad or decimal)
        start: String,

        /// Last address (dotted quad or decimal)
        end: String,
    },

    /// Check addresses against a persisted list
    Check {
        /// List file
        #[arg(short, long)]
        list: PathBuf,

        /// Addresses to check
        #[arg(required = true)]
        addrs: Vec<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            config,
            output,
            if_older_than,
        } => build(&config, output, if_older_than),
        Commands::Dedup {
            input,
            output,
            strict,
        } => dedup(&input, &output, strict),
        Commands::Decompose { start, end } => print_decomposition(&start, &end),
        Commands::Check { list, addrs } => check(&list, &addrs),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build(
    config_path: &Path,
    output: Option<PathBuf>,
    if_older_than: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = BuildConfig::load(config_path)?;
    let output = output
        .or_else(|| config.output.clone())
        .ok_or("no output path given on the command line or in the config")?;

    if let Some(hours) = if_older_than {
        let meta = BuildMetadata::load_for(&output)?;
        if output.exists() && !meta.is_stale(Duration::from_secs(hours.saturating_mul(3600))) {
            println!("{:?} is newer than {}h, skipping build", output, hours);
            return Ok(());
        }
    }

    let progress = LogProgress::default();
    let result = Builder::from_config(&config, &progress).build()?;
    let meta = result.save(&output)?;

    for source in &result.sources {
        if source.failed {
            println!("  {}: unavailable", source.name);
        } else {
            println!(
                "  {}: {} entries, {} rejected",
                source.name, source.accepted, source.rejected
            );
        }
    }
    println!(
        "Wrote {:?}: {} entries covering {} addresses ({} redundant entries dropped)",
        output, meta.entries, meta.addresses, result.stats.discarded
    );
    Ok(())
}

fn dedup(input: &Path, output: &Path, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let name = input.display().to_string();
    let source = TextListSource::from_reader(name, fs::File::open(input)?)?;
    let policy = if strict {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Skip
    };

    let progress = LogProgress::default();
    let result = Builder::new(&progress)
        .on_failure(FailurePolicy::Abort)
        .on_invalid_entry(policy)
        .with_source(source)
        .build()?;
    result.save(output)?;

    println!(
        "Deduplicated {:?} -> {:?}: kept {} of {} entries",
        input, output, result.stats.kept, result.stats.input
    );
    Ok(())
}

fn print_decomposition(start: &str, end: &str) -> Result<(), Box<dyn std::error::Error>> {
    let blocks = decompose(parse_bound(start)?, parse_bound(end)?)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for block in blocks {
        writeln!(out, "{}", block)?;
    }
    Ok(())
}

fn check(list: &Path, addrs: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let index = RangeIndex::open(list)?;
    for addr in addrs {
        let verdict = if index.is_blocked_str(addr)? {
            "blocked"
        } else {
            "allowed"
        };
        println!("{} {}", addr, verdict);
    }
    Ok(())
}
