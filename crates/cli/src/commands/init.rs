//! `loopevents init`: emit the default configuration.

use loopevents_config::AppConfig;
use std::path::Path;

pub async fn run(write: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !write {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config_path = AppConfig::config_path();
    if write_default(&config_path)? {
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("   Add [[schedulers]] entries, then run: loopevents check");
    } else {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run init.");
    }

    Ok(())
}

/// Write the default configuration to `path`, creating parent directories.
///
/// Returns `false` without touching anything if the file already exists.
pub fn write_default(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    tracing::info!(path = %path.display(), "Wrote default configuration");
    Ok(true)
}
