use std::path::Path;

use studentsync_core::config::{SyncConfig, ENV_NEW_USER_PASSWORD};
use tracing::info;

/// Run the `init` command: write a default configuration file.
pub async fn run(path: &str) -> anyhow::Result<()> {
    let config_path = Path::new(path);
    if config_path.exists() {
        anyhow::bail!("{path} already exists, refusing to overwrite it");
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let toml = SyncConfig::generate_default().to_toml()?;
    std::fs::write(config_path, toml)?;
    info!(path, "wrote default configuration");

    println!("Wrote default configuration to {path}");
    println!();
    println!("Next steps:");
    println!("  1. Set district.email_domain and the OU names for your tenant");
    println!("  2. Point source.database_url at the enrollment mirror");
    println!("  3. Set {ENV_NEW_USER_PASSWORD} or district.new_user_password");
    println!("  4. Run: studentsync --config {path} check");

    Ok(())
}
