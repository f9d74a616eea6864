//! `rollcall onboard`: First-time setup.

use std::path::Path;

use rollcall_config::AppConfig;

use crate::runtime;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = runtime::config_file(config_path);

    println!("📋 rollcall — First-Time Setup");
    println!("==============================\n");

    if let Some(dir) = config_path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        } else {
            println!("  Config directory exists: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());

    let defaults = AppConfig::default();
    if !defaults.artifacts.dir.exists() {
        std::fs::create_dir_all(&defaults.artifacts.dir)?;
        println!("✅ Created working sheet directory: {}", defaults.artifacts.dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Set [roster] path to your attendance sheet (CSV)");
    println!("   2. Add your bot token under [telegram], or export ROLLCALL_BOT_TOKEN");
    println!("   3. List who may use the bot in telegram.allowed_users");
    println!("   4. Run: rollcall doctor, then rollcall serve\n");

    Ok(())
}
