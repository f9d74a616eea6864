//! `rollcall doctor`: Diagnose configuration, roster and Telegram access.

use std::path::Path;

use rollcall_channels::{TelegramChannel, TelegramConfig};
use rollcall_core::error::StorageError;
use rollcall_core::store::{NameSource, RosterStore};
use rollcall_storage::{CsvNameList, CsvRosterStore};

use crate::runtime;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 rollcall Doctor");
    println!("==================\n");

    let mut issues = 0;

    let file = runtime::config_file(config_path);
    if !file.exists() {
        println!("  ⚠️  No config file at {}, using defaults. Run `rollcall onboard`", file.display());
        issues += 1;
    }
    let config = match runtime::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  Cannot continue without a valid config.");
            return Ok(());
        }
    };

    let stack = runtime::build(&config)?;

    // Roster
    match check_roster(&stack.roster).await {
        Ok(RosterCheck::Stable { rows }) => {
            println!("  ✅ Roster readable: {rows} students");
            println!("  ✅ Roster unchanged since load");
        }
        Ok(RosterCheck::Reloaded { before, after }) => {
            println!("  ⚠️  Roster changed on disk while being checked ({before} -> {after} students)");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    if let Some(path) = &config.roster.name_list {
        match CsvNameList::new(path.clone()).load().await {
            Ok(names) => println!("  ✅ Name list readable: {} names", names.len()),
            Err(e) => {
                println!("  ⚠️  Name list unreadable, emails will be used: {e}");
                issues += 1;
            }
        }
    }

    // Working sheet directory
    let marker = stack.archive.root().join(".rollcall-doctor");
    let writable = std::fs::create_dir_all(stack.archive.root())
        .and_then(|_| std::fs::write(&marker, b"ok"))
        .and_then(|_| std::fs::remove_file(&marker));
    match writable {
        Ok(()) => println!("  ✅ Working sheet directory writable: {}", stack.archive.root().display()),
        Err(e) => {
            println!("  ❌ Cannot write to {}: {e}", stack.archive.root().display());
            issues += 1;
        }
    }

    // Telegram
    if config.has_bot_token() {
        let telegram = TelegramChannel::new(TelegramConfig::from(&config.telegram));
        match telegram.bot_identity().await {
            Ok(bot) => println!(
                "  ✅ Telegram bot reachable: @{}",
                bot.username.unwrap_or(bot.first_name)
            ),
            Err(e) => {
                println!("  ❌ Telegram check failed: {e}");
                issues += 1;
            }
        }
        if config.telegram.allowed_users.is_empty() {
            println!("  ⚠️  telegram.allowed_users is empty, every sender will be refused");
            issues += 1;
        }
    } else {
        println!("  ⚠️  No Telegram bot token. Set telegram.bot_token or ROLLCALL_BOT_TOKEN");
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum RosterCheck {
    Stable { rows: usize },
    /// The file no longer matched its fingerprint and was read again.
    Reloaded { before: usize, after: usize },
}

/// Load the roster, then confirm the file still hashes the same. A changed
/// file is reloaded so the reported count is the one on disk.
async fn check_roster(roster: &CsvRosterStore) -> Result<RosterCheck, StorageError> {
    let before = roster.row_count().await?;
    if roster.verify_unchanged().await? {
        return Ok(RosterCheck::Stable { rows: before });
    }
    let after = roster.reload().await?.row_count();
    Ok(RosterCheck::Reloaded { before, after })
}
