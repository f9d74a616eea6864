//! Wiring shared by the commands: config loading and the controller stack.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rollcall_config::AppConfig;
use rollcall_core::store::{NameSource, NoNames};
use rollcall_session::{AuditLogger, AuditSink, JsonLinesSink, SessionController, TracingSink};
use rollcall_storage::{CsvNameList, CsvRosterStore, FileSnapshotArchive};

/// Load `path` if given, the default config otherwise. Environment
/// overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let loaded = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    Ok(loaded.map_err(|e| format!("Failed to load config: {e}"))?)
}

pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Everything a command needs to run sessions against the configured roster.
pub struct Stack {
    pub roster: Arc<CsvRosterStore>,
    pub archive: Arc<FileSnapshotArchive>,
    pub controller: Arc<SessionController>,
}

pub fn build(config: &AppConfig) -> Result<Stack, Box<dyn std::error::Error>> {
    let roster = Arc::new(CsvRosterStore::new(
        config.roster.path.clone(),
        config.roster.schema(),
    ));
    let archive = Arc::new(
        FileSnapshotArchive::new(
            config.artifacts.dir.clone(),
            config.artifacts.file_stem.clone(),
            config.artifacts.keep,
        )
        .protecting(config.roster.path.clone()),
    );
    let names: Arc<dyn NameSource> = match &config.roster.name_list {
        Some(path) => Arc::new(CsvNameList::new(path.clone())),
        None => Arc::new(NoNames),
    };

    let mut sinks: Vec<Box<dyn AuditSink>> = vec![Box::new(TracingSink)];
    if let Some(path) = &config.audit.path {
        let sink = JsonLinesSink::open(path)
            .map_err(|e| format!("Failed to open audit log {}: {e}", path.display()))?;
        sinks.push(Box::new(sink));
    }

    let controller = Arc::new(
        SessionController::new(roster.clone(), archive.clone())
            .with_names(names)
            .with_class_name(config.roster.class_name.clone())
            .with_audit(Arc::new(
                AuditLogger::with_sinks(sinks).retaining(config.audit.retain),
            )),
    );

    Ok(Stack {
        roster,
        archive,
        controller,
    })
}

/// Latest artifact file per lineage directory under the archive root,
/// sorted by lineage.
pub fn latest_artifacts(root: &Path) -> std::io::Result<Vec<(String, PathBuf, usize)>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let mut versions: Vec<PathBuf> = std::fs::read_dir(entry.path())?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        // version numbers are zero-padded, so name order is version order
        versions.sort();
        let count = versions.len();
        if let Some(latest) = versions.pop() {
            found.push((entry.file_name().to_string_lossy().into_owned(), latest, count));
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::session::{RequesterId, SessionMode};

    const ROSTER: &str = "Registration Id,Email Id,Attendance *\n\
                          2403001,amy@x.edu,PRESENT\n\
                          2403002,ben@x.edu,PRESENT\n";

    fn config(dir: &Path) -> AppConfig {
        let roster = dir.join("roster.csv");
        std::fs::write(&roster, ROSTER).unwrap();
        let mut config = AppConfig::default();
        config.roster.path = roster;
        config.artifacts.dir = dir.join("working");
        config.audit.path = Some(dir.join("audit").join("log.jsonl"));
        config
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = Path::new("/etc/rollcall.toml");
        assert_eq!(config_file(Some(path)), path);
        assert!(config_file(None).ends_with(".rollcall/config.toml"));
    }

    #[tokio::test]
    async fn stack_marks_and_archives() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let stack = build(&config).unwrap();

        let requester = RequesterId::scoped("cli", "local");
        stack
            .controller
            .select_mode(&requester, SessionMode::New)
            .await
            .unwrap();
        let outcome = stack.controller.submit_text(&requester, "2").await.unwrap();
        assert_eq!(outcome.result.updated.len(), 1);

        let latest = latest_artifacts(&config.artifacts.dir).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].2, 2);
        assert!(latest[0].1.ends_with("attendance-000002.csv"));

        let audit = std::fs::read_to_string(config.audit.path.unwrap()).unwrap();
        assert_eq!(audit.lines().count(), 2);
        assert_eq!(std::fs::read_to_string(&config.roster.path).unwrap(), ROSTER);
    }

    #[test]
    fn missing_archive_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_artifacts(&dir.path().join("absent")).unwrap().is_empty());
    }
}
