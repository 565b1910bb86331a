//! Implementation of the `promoter copy` command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use promoter_engine::{copy, plan_copy, CopyOptions, OperationLog, OperationRecord};

use super::{confirm, record, Session};

#[derive(Args, Debug)]
pub struct CopyArgs {
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

    /// Replace keys that already exist in the target
    #[arg(long)]
    pub overwrite: bool,

    /// Copy only keys that do not look sensitive
    #[arg(long)]
    pub copy_config: bool,

    /// Copy only keys that look sensitive
    #[arg(long)]
    pub copy_secrets: bool,

    /// Copy key names with empty values
    #[arg(long)]
    pub only_copy_keys: bool,

    /// Show what would be copied without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub approve: bool,

    /// Operation log file
    #[arg(long, default_value = "./promoter-copy.log")]
    pub log_to: PathBuf,
}

impl CopyArgs {
    fn options(&self) -> CopyOptions {
        CopyOptions {
            overwrite: self.overwrite,
            copy_config_only: self.copy_config,
            copy_secrets_only: self.copy_secrets,
            keys_only: self.only_copy_keys,
        }
    }
}

pub async fn run(config: &Path, args: CopyArgs) -> Result<()> {
    let session = Session::load(config)?;
    let policy = session.policy();
    let options = args.options();
    let target_path = args.target_path.as_deref().unwrap_or(&args.source_path);
    let target_kv = args.target_kv.as_deref().or(args.source_kv.as_deref());

    let source = session
        .endpoint(&args.source_env, &args.source_path, args.source_kv.as_deref())
        .await?;
    let target = session
        .endpoint(&args.target_env, target_path, target_kv)
        .await?;

    if args.dry_run {
        let plan = plan_copy(&source, &target, options, &policy).await?;
        println!("Dry run: {} -> {}", source.location, target.location);
        if plan.keys.is_empty() {
            println!("Nothing to copy");
        }
        for (key, shown) in &plan.keys {
            println!("  copy {key}: {shown}");
        }
        for key in &plan.kept_existing {
            println!("  keep {key} (already in target)");
        }
        for key in &plan.filtered_out {
            println!("  skip {key} (filtered)");
        }
        return Ok(());
    }

    if !args.approve {
        let question = format!("Copy {} to {}?", source.location, target.location);
        if !confirm(&question)? {
            println!("Aborted");
            return Ok(());
        }
    }

    let log = OperationLog::new(&args.log_to);
    match copy(&source, &target, options, &policy).await {
        Ok(outcome) => {
            record(&log, &OperationRecord::copied(&source, &target, &outcome)).await;
            println!("{}", outcome.message);
            for (key, shown) in &outcome.keys {
                println!("  {key}: {shown}");
            }
            Ok(())
        }
        Err(err) => {
            record(&log, &OperationRecord::failed_copy(&source, &target, &err)).await;
            Err(err.into())
        }
    }
}
