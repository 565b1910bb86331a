//! Implementation of the `promoter split` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use promoter_engine::{plan_split, split, EngineError, OperationLog, OperationRecord};

use super::{confirm, record, Session};

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Environment holding the document to split
    pub source_env: String,

    /// Path of the document to split
    pub source_path: String,

    /// Path of the new document receiving the sensitive keys
    pub target_path: String,

    /// Environment for the new document (defaults to the source environment)
    #[arg(long)]
    pub target_env: Option<String>,

    /// KV engine of the source (vault stores)
    #[arg(long)]
    pub source_kv: Option<String>,

    /// KV engine of the target (defaults to the source engine)
    #[arg(long)]
    pub target_kv: Option<String>,

    /// Show the partition without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub approve: bool,

    /// Operation log file
    #[arg(long, default_value = "./promoter-split.log")]
    pub log_to: PathBuf,
}

pub async fn run(config: &Path, args: SplitArgs) -> Result<()> {
    let session = Session::load(config)?;
    let policy = session.policy();
    let target_env = args.target_env.as_deref().unwrap_or(&args.source_env);
    let target_kv = args.target_kv.as_deref().or(args.source_kv.as_deref());

    let source = session
        .endpoint(&args.source_env, &args.source_path, args.source_kv.as_deref())
        .await?;
    let target = session
        .endpoint(target_env, &args.target_path, target_kv)
        .await?;

    if args.dry_run {
        let plan = plan_split(&source, &target, &policy).await?;
        println!("Dry run: {} -> {}", source.location, target.location);
        for key in plan.moved_keys() {
            println!("  move {key}");
        }
        for key in plan.retained_keys() {
            println!("  keep {key}");
        }
        return Ok(());
    }

    if !args.approve {
        let question = format!(
            "Move sensitive keys from {} to {}?",
            source.location, target.location
        );
        if !confirm(&question)? {
            println!("Aborted");
            return Ok(());
        }
    }

    let log = OperationLog::new(&args.log_to);
    match split(&source, &target, &policy).await {
        Ok(outcome) => {
            record(&log, &OperationRecord::split(&source, &target, &outcome)).await;
            println!(
                "Moved {} key(s) from {} to {}",
                outcome.moved_keys.len(),
                outcome.source_location,
                outcome.target_location
            );
            for key in &outcome.moved_keys {
                println!("  {key}");
            }
            Ok(())
        }
        Err(err) => {
            record(&log, &OperationRecord::failed_split(&source, &target, &err)).await;
            if let EngineError::PartialFailure {
                source_location,
                moved_keys,
                ..
            } = &err
            {
                eprintln!("WARNING: the split did not complete.");
                eprintln!(
                    "The following keys now exist in both {} and {}; remove them from {} by hand:",
                    source_location, target.location, source_location
                );
                for key in moved_keys {
                    eprintln!("  {key}");
                }
            }
            Err(err.into())
        }
    }
}
