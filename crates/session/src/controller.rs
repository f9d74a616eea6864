//! The session controller.
//!
//! Sessions are kept in a registry keyed by [`RequesterId`]. An entry is
//! created the first time a requester shows up, replaced whenever they pick a
//! mode again and never dropped while the process runs.
//!
//! # Concurrency
//!
//! Each requester's slot sits behind its own `tokio::sync::Mutex`, held for
//! the whole resolve-then-mutate-then-export sequence. Calls for one
//! requester therefore run strictly one after another even if the transport
//! delivers them concurrently; different requesters never contend beyond the
//! brief registry lookup.
//!
//! # Atomicity
//!
//! Every operation builds its new state off to the side and commits it only
//! after storage succeeded. A failed load or export leaves the session
//! exactly as it was before the call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use rollcall_core::error::{Result, SessionStateError, StorageError};
use rollcall_core::matcher::match_suffixes;
use rollcall_core::outcome::{ModeFallback, ModeOutcome, SubmitOutcome};
use rollcall_core::report::{AbsenteeReport, NameDirectory};
use rollcall_core::session::{RequesterId, SessionId, SessionMode, SessionPhase};
use rollcall_core::snapshot::WorkingSnapshot;
use rollcall_core::store::{ArtifactHandle, NameSource, NoNames, RosterStore, SnapshotArchive};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::apply::apply_plan;
use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};

struct Session {
    id: SessionId,
    mode: SessionMode,
    snapshot: WorkingSnapshot,
    /// Artifact matching `snapshot`.
    artifact: ArtifactHandle,
    created_at: DateTime<Utc>,
}

enum Slot {
    NoSession,
    AwaitingMode,
    Active(Box<Session>),
}

impl Slot {
    fn phase(&self) -> SessionPhase {
        match self {
            Slot::NoSession => SessionPhase::NoSession,
            Slot::AwaitingMode => SessionPhase::AwaitingMode,
            Slot::Active(s) => SessionPhase::Active {
                session_id: s.id.clone(),
                mode: s.mode,
                absent: s.snapshot.absent_count(),
                rows: s.snapshot.len(),
                artifact_version: s.artifact.version,
            },
        }
    }
}

pub struct SessionController {
    roster: Arc<dyn RosterStore>,
    archive: Arc<dyn SnapshotArchive>,
    names: Arc<dyn NameSource>,
    class_name: Option<String>,
    sessions: RwLock<HashMap<RequesterId, Arc<Mutex<Slot>>>>,
    audit: Arc<AuditLogger>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("roster", &self.roster.name())
            .field("archive", &self.archive.name())
            .field("class_name", &self.class_name)
            .finish()
    }
}

impl SessionController {
    pub fn new(roster: Arc<dyn RosterStore>, archive: Arc<dyn SnapshotArchive>) -> Self {
        Self {
            roster,
            archive,
            names: Arc::new(NoNames),
            class_name: None,
            sessions: RwLock::new(HashMap::new()),
            audit: Arc::new(AuditLogger::new()),
        }
    }

    pub fn with_names(mut self, names: Arc<dyn NameSource>) -> Self {
        self.names = names;
        self
    }

    pub fn with_class_name(mut self, class_name: Option<String>) -> Self {
        self.class_name = class_name;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// Put the requester in AWAITING_MODE, detaching any active snapshot.
    pub async fn await_mode(&self, requester: &RequesterId) -> SessionPhase {
        let slot = self.slot(requester).await;
        let mut slot = slot.lock().await;
        if let Slot::Active(session) = &*slot {
            debug!(requester = %requester, session = %session.id, "Detaching session snapshot");
        }
        *slot = Slot::AwaitingMode;
        self.audit.log(
            None,
            requester.as_str(),
            AuditEvent::ModePrompt,
            AuditOutcome::Success,
            None,
        );
        slot.phase()
    }

    /// Start a session in `mode`, replacing whatever the requester had.
    ///
    /// CONTINUE without a prior artifact is served as NEW and reported via
    /// [`ModeOutcome::fallback`].
    pub async fn select_mode(&self, requester: &RequesterId, mode: SessionMode) -> Result<ModeOutcome> {
        let slot = self.slot(requester).await;
        let mut slot = slot.lock().await;

        let (session, fallback) = match self.open_session(requester, mode).await {
            Ok(opened) => opened,
            Err(e) => {
                warn!(requester = %requester, mode = %mode, error = %e, "Mode selection failed");
                self.audit.log(
                    None,
                    requester.as_str(),
                    AuditEvent::ModeSelected {
                        requested: mode.to_string(),
                        effective: mode.to_string(),
                    },
                    AuditOutcome::Failed,
                    Some(e.to_string()),
                );
                return Err(e.into());
            }
        };

        let outcome = ModeOutcome {
            session_id: session.id.clone(),
            requested: mode,
            effective: session.mode,
            fallback,
            artifact: session.artifact.clone(),
            rows: session.snapshot.len(),
            absent: session.snapshot.absent_count(),
        };

        info!(
            requester = %requester,
            session = %session.id,
            requested = %mode,
            effective = %session.mode,
            absent = outcome.absent,
            version = session.artifact.version,
            "Session started"
        );
        self.audit.log(
            Some(&session.id.0),
            requester.as_str(),
            AuditEvent::ModeSelected {
                requested: mode.to_string(),
                effective: session.mode.to_string(),
            },
            AuditOutcome::Success,
            fallback.map(|_| "no prior artifact, started fresh".to_string()),
        );

        *slot = Slot::Active(Box::new(session));
        Ok(outcome)
    }

    /// Apply absentee text to the requester's active snapshot.
    ///
    /// The session is checked before the text is parsed, so a requester
    /// without a session is always told to pick a mode first.
    pub async fn submit_text(&self, requester: &RequesterId, raw_text: &str) -> Result<SubmitOutcome> {
        let slot = self.slot(requester).await;
        let mut slot = slot.lock().await;

        let Slot::Active(session) = &mut *slot else {
            let err = SessionStateError::NoActiveSession {
                requester: requester.to_string(),
            };
            self.reject(None, requester, &err.to_string());
            return Err(err.into());
        };

        let plan = match match_suffixes(raw_text, &session.snapshot.rows()) {
            Ok(plan) => plan,
            Err(e) => {
                self.reject(Some(&session.id), requester, &e.to_string());
                return Err(e.into());
            }
        };

        let mut next = session.snapshot.clone();
        let result = apply_plan(&mut next, plan);

        let (artifact, exported) = if result.changed() {
            match self.archive.export(requester, &next).await {
                Ok(handle) => (handle, true),
                Err(e) => {
                    warn!(requester = %requester, session = %session.id, error = %e, "Export failed, submission discarded");
                    self.audit.log(
                        Some(&session.id.0),
                        requester.as_str(),
                        submission_event(&result),
                        AuditOutcome::Failed,
                        Some(e.to_string()),
                    );
                    return Err(e.into());
                }
            }
        } else {
            (session.artifact.clone(), false)
        };

        let names = self.names().await;
        let report = AbsenteeReport::build(
            &next,
            &names,
            self.class_name.as_deref(),
            Local::now().naive_local(),
        );

        info!(
            requester = %requester,
            session = %session.id,
            updated = result.updated.len(),
            already_absent = result.already_absent.len(),
            not_found = result.not_found.len(),
            ambiguous = result.ambiguous.len(),
            malformed = result.malformed.len(),
            version = artifact.version,
            "Submission applied"
        );
        self.audit.log(
            Some(&session.id.0),
            requester.as_str(),
            submission_event(&result),
            AuditOutcome::Success,
            None,
        );

        session.snapshot = next;
        session.artifact = artifact.clone();

        Ok(SubmitOutcome {
            session_id: session.id.clone(),
            mode: session.mode,
            result,
            artifact,
            exported,
            report,
        })
    }

    /// Current phase of a requester's session.
    pub async fn phase(&self, requester: &RequesterId) -> SessionPhase {
        let slot = self.sessions.read().await.get(requester).cloned();
        match slot {
            Some(slot) => slot.lock().await.phase(),
            None => SessionPhase::NoSession,
        }
    }

    /// When the requester's active session was started.
    pub async fn started_at(&self, requester: &RequesterId) -> Option<DateTime<Utc>> {
        let slot = self.sessions.read().await.get(requester).cloned()?;
        let slot = slot.lock().await;
        match &*slot {
            Slot::Active(session) => Some(session.created_at),
            _ => None,
        }
    }

    /// Number of requesters with an ACTIVE session.
    pub async fn session_count(&self) -> usize {
        let slots: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if matches!(*slot.lock().await, Slot::Active(_)) {
                count += 1;
            }
        }
        count
    }

    async fn slot(&self, requester: &RequesterId) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.sessions.read().await.get(requester) {
            return slot.clone();
        }
        self.sessions
            .write()
            .await
            .entry(requester.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Slot::NoSession)))
            .clone()
    }

    async fn open_session(
        &self,
        requester: &RequesterId,
        mode: SessionMode,
    ) -> std::result::Result<(Session, Option<ModeFallback>), StorageError> {
        let roster = self.roster.load().await?;

        let prior = match mode {
            SessionMode::New => None,
            SessionMode::Continue => self.archive.latest(requester).await?,
        };

        let (effective, snapshot, artifact, fallback) = match (mode, prior) {
            (SessionMode::Continue, Some(handle)) => {
                let sheet = self.archive.open(&handle).await?;
                let snapshot = WorkingSnapshot::reopen(roster, &sheet)?;
                (SessionMode::Continue, snapshot, handle, None)
            }
            (requested, _) => {
                let snapshot = WorkingSnapshot::fresh(roster);
                let artifact = self.archive.export(requester, &snapshot).await?;
                let fallback = (requested == SessionMode::Continue).then_some(ModeFallback::NoPriorArtifact);
                (SessionMode::New, snapshot, artifact, fallback)
            }
        };

        let session = Session {
            id: SessionId(uuid::Uuid::new_v4().to_string()),
            mode: effective,
            snapshot,
            artifact,
            created_at: Utc::now(),
        };
        Ok((session, fallback))
    }

    async fn names(&self) -> NameDirectory {
        match self.names.load().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Name list unavailable, using email names");
                NameDirectory::new()
            }
        }
    }

    fn reject(&self, session: Option<&SessionId>, requester: &RequesterId, reason: &str) {
        debug!(requester = %requester, reason, "Submission rejected");
        self.audit.log(
            session.map(|s| s.0.as_str()),
            requester.as_str(),
            AuditEvent::Submission {
                updated: 0,
                already_absent: 0,
                unapplied: 0,
                malformed: 0,
            },
            AuditOutcome::Rejected,
            Some(reason.to_string()),
        );
    }
}

fn submission_event(result: &rollcall_core::outcome::UpdateResult) -> AuditEvent {
    AuditEvent::Submission {
        updated: result.updated.len(),
        already_absent: result.already_absent.len(),
        unapplied: result.unapplied_suffixes().len(),
        malformed: result.malformed.len(),
    }
}
