//! Implementation of the `promoter compare` command.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use promoter_engine::{compare, ComparisonResult, DiffStatus};

use super::Session;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Source environment
    pub source_env: String,

    /// Path of the source document
    pub source_path: String,

    /// Target environment
    pub target_env: String,

    /// Path of the target document (defaults to the source path)
    pub target_path: Option<String>,

    /// KV engine of the source (vault stores)
    #[arg(long)]
    pub source_kv: Option<String>,

    /// KV engine of the target (defaults to the source engine)
    #[arg(long)]
    pub target_kv: Option<String>,

    /// Print the comparison as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(config: &Path, args: CompareArgs) -> Result<()> {
    let session = Session::load(config)?;
    let target_path = args.target_path.as_deref().unwrap_or(&args.source_path);
    let target_kv = args.target_kv.as_deref().or(args.source_kv.as_deref());

    let source = session
        .endpoint(&args.source_env, &args.source_path, args.source_kv.as_deref())
        .await?;
    let target = session
        .endpoint(&args.target_env, target_path, target_kv)
        .await?;

    let result = compare(&source, &target, &session.policy()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &ComparisonResult) {
    println!(
        "Comparing {} -> {}",
        result.source_location, result.target_location
    );

    for entry in &result.entries {
        match entry.status {
            DiffStatus::Info => println!("  {}", entry.source_value),
            DiffStatus::Added => println!("+ {}: {}", entry.key, entry.source_value),
            DiffStatus::Removed => println!("- {}: {}", entry.key, entry.target_value),
            DiffStatus::Modified => {
                println!(
                    "~ {}: {} -> {}",
                    entry.key, entry.target_value, entry.source_value
                );
                for line in entry.diff.lines() {
                    println!("    {line}");
                }
            }
        }
    }

    let counts = result.counts();
    if result.is_identical() {
        println!("No differences");
    } else {
        println!(
            "{} added, {} removed, {} modified",
            counts.added, counts.removed, counts.modified
        );
    }
}
