use std::path::Path;

use studentsync_core::config::SyncConfig;

/// Load, override, and validate the configuration.
pub fn load_config(path: &str) -> anyhow::Result<SyncConfig> {
    let mut config = SyncConfig::load(Path::new(path))?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Run the `check` command: validate configuration and show the resolved OU layout.
pub async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let district = &config.district;

    println!("Configuration OK: {config_path}");
    println!("  Email domain:     {}", district.email_domain);
    println!("  Search domain:    {}", config.search_domain());
    println!("  Suspended OU:     {}", district.suspended_ou);
    println!("  Graduated OU:     {}", district.graduated_ou);
    println!("  Frozen OUs:       {}", district.frozen_ous.join(", "));
    println!(
        "  Summer grace:     {}",
        if district.graduated_active_summer {
            format!("months {:?}", district.grace_months)
        } else {
            "off".to_string()
        }
    );
    println!("  Concurrency:      {}", config.sync.concurrency);
    println!("  Deadline:         {}s", config.sync.deadline_secs);
    println!();
    println!("Grade table ({}<SCHOOL>{}<sub-path>):", district.ou_prefix, district.school_ou_suffix);
    for row in &district.grades {
        let sub_path = if row.sub_path.is_empty() {
            "(building OU)"
        } else {
            row.sub_path.as_str()
        };
        println!("  {:>4}  {}", row.grade, sub_path);
    }

    Ok(())
}
