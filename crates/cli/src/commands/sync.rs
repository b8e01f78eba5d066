use std::sync::Arc;

use studentsync_core::models::sync::SchoolScope;
use studentsync_core::source::SqliteEnrollmentSource;
use studentsync_core::sync::ReconcileEngine;
use studentsync_google::GoogleDirectory;
use tracing::info;

use super::check::load_config;

/// Run the `sync` command: reconcile enrollment into the directory.
pub async fn run(config_path: &str, mode: &str, dry_run: bool) -> anyhow::Result<()> {
    let scope: SchoolScope = mode.parse()?;
    let config = load_config(config_path)?;

    let source = SqliteEnrollmentSource::connect(&config.source.database_url).await?;
    let directory = GoogleDirectory::from_config(&config)?;

    info!(%scope, dry_run, source = "sqlite", "starting sync");

    let engine = ReconcileEngine::new(Arc::new(source), Arc::new(directory), config)?
        .with_dry_run(dry_run);
    let today = chrono::Local::now().date_naive();
    let summary = engine.run(scope, today).await?;

    println!(
        "Student account sync {}! (run {})",
        if dry_run { "preview" } else { "completed" },
        summary.run_id
    );
    println!("  Schools:           {}", summary.schools_processed);
    println!("  Schools failed:    {}", summary.schools_failed);
    println!("  Students seen:     {}", summary.students_seen);
    println!("  Accounts created:  {}", summary.accounts_created);
    println!("  Accounts updated:  {}", summary.accounts_updated);
    println!("  Suspended:         {}", summary.accounts_suspended);
    println!("  Groups left:       {}", summary.groups_left);
    println!("  Unchanged:         {}", summary.unchanged);
    println!("  Skipped:           {}", summary.skipped);
    println!("  Missing suspended: {}", summary.missing_suspended);
    println!("  Frozen OU holds:   {}", summary.frozen_holds);
    println!("  Errors:            {}", summary.errors);
    if dry_run {
        println!();
        println!("This was a dry run. No changes were made to the directory.");
    }

    Ok(())
}
