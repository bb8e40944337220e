//! `loopevents check`: validate configuration and show what a session
//! would run with.

use loopevents_config::{AppConfig, ConfigError};
use std::fmt::Write;
use std::path::{Path, PathBuf};

pub async fn run(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.unwrap_or_else(AppConfig::config_path);
    println!("🔍 Checking {}", path.display());

    let config = match load(&path) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };

    println!("   ✅ Config valid\n");
    print!("{}", render(&config));
    Ok(())
}

/// Load `path` the way a session would, environment overrides included.
pub fn load(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::load_from(path)?;
    config.apply_env_overrides();
    Ok(config)
}

/// Human-readable summary of the effective settings.
pub fn render(config: &AppConfig) -> String {
    let o = &config.orchestrator;
    let mut out = String::new();

    let _ = writeln!(out, "   Provider:           {}", o.default_provider);
    let _ = writeln!(out, "   Model:              {}", o.model);
    let _ = writeln!(out, "   Temperature:        {}", o.temperature);
    let _ = writeln!(out, "   Max tokens:         {}", o.max_tokens);
    let _ = writeln!(out, "   Max iterations:     {}", o.max_iterations);
    let _ = writeln!(out, "   Broadcast timeout:  {}ms", o.broadcast_timeout_ms);
    let _ = writeln!(
        out,
        "   API key:            {}",
        if config.has_api_key() { "set" } else { "not set" }
    );

    if config.schedulers.is_empty() {
        let _ = writeln!(out, "\n   ⚠️  No schedulers configured: every decision will use the fallback");
        return out;
    }

    let _ = writeln!(out, "\n   Schedulers (tie-break order):");
    let mut rank = 0;
    for scheduler in &config.schedulers {
        if !scheduler.enabled {
            let _ = writeln!(out, "     -. {} ({}) [disabled]", scheduler.id, scheduler.module);
            continue;
        }
        rank += 1;
        let _ = write!(out, "     {rank}. {} ({})", scheduler.id, scheduler.module);
        if !scheduler.config.is_empty() {
            let _ = write!(out, " {}", serde_json::Value::Object(scheduler.config.clone()));
        }
        let _ = writeln!(out);
    }

    out
}
