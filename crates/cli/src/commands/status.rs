//! `rollcall status`: show roster and working sheet state.

use std::path::Path;

use rollcall_core::store::RosterStore;

use crate::runtime;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let stack = runtime::build(&config)?;

    println!("📋 rollcall Status");
    println!("==================");
    println!("  Config:       {}", runtime::config_file(config_path).display());
    println!("  Roster:       {}", config.roster.path.display());
    match stack.roster.row_count().await {
        Ok(rows) => {
            println!("  Students:     {rows}");
            println!("  Fingerprint:  {}", stack.roster.fingerprint().await?);
        }
        Err(e) => println!("  ⚠️  Roster unreadable: {e}"),
    }
    println!(
        "  Name list:    {}",
        config
            .roster
            .name_list
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none (names from email)".into())
    );
    println!("  Telegram:     {:?}", config.telegram.mode);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);

    let root = stack.archive.root();
    println!("\n  Working sheets in {}:", root.display());
    let latest = runtime::latest_artifacts(root)?;
    if latest.is_empty() {
        println!("    (none yet)");
    }
    for (lineage, path, versions) in latest {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("    {lineage}: {name} ({versions} kept)");
    }

    Ok(())
}
