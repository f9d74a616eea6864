//! User-facing text for controller outcomes.
//!
//! The controller only returns structured data; every string an operator
//! reads is built here, so all transports word things the same way.

use rollcall_core::error::{Error, InputError};
use rollcall_core::channel::OutboundMessage;
use rollcall_core::outcome::{ModeFallback, ModeOutcome, UpdateResult};
use rollcall_core::report::AbsenteeReport;
use rollcall_core::roster::RosterRow;
use rollcall_core::session::{SessionMode, SessionPhase};

pub const ADD_ABSENT_LABEL: &str = "➕ Add Absent";
pub const NEW_ABSENT_LABEL: &str = "🆕 New Absent";
pub const ADD_ABSENT_DATA: &str = "add_absent";
pub const NEW_ABSENT_DATA: &str = "new_absent";

/// File name shown for delivered artifacts.
pub const ARTIFACT_FILE_NAME: &str = "Updated_Attendance.csv";

const EXAMPLES: &str = "e.g. '1' or '1,3,5,7' or '11,22,33'";

pub fn welcome() -> String {
    format!(
        "👋 Welcome to rollcall!\n\n\
         I mark students absent in a copy of the attendance sheet. \
         The original sheet is never modified.\n\n\
         📝 How to use:\n\
         1. Choose '{ADD_ABSENT_LABEL}' to keep editing your last sheet, \
         or '{NEW_ABSENT_LABEL}' to start over with everyone PRESENT\n\
         2. Send registration number endings, {EXAMPLES}\n\
         3. Get the updated sheet and the absentee list\n\n\
         Use /help for more information."
    )
}

pub fn choose_mode() -> OutboundMessage {
    OutboundMessage::with_modes("Choose your session mode:")
}

pub fn next_step() -> OutboundMessage {
    OutboundMessage::with_modes("What would you like to do next?")
}

pub fn help() -> String {
    format!(
        "📚 rollcall help\n\n\
         Commands:\n\
         /start - choose a session mode\n\
         /new - start fresh from the original sheet\n\
         /continue - keep editing your latest sheet\n\
         /status - show your current session\n\
         /help - show this message\n\n\
         Session modes:\n\
         • {ADD_ABSENT_LABEL} - continue your latest working sheet\n\
         • {NEW_ABSENT_LABEL} - fresh copy of the original, all PRESENT\n\n\
         Marking absent:\n\
         • '1' matches registrations ending in 01\n\
         • '11' matches registrations ending in 11\n\
         • several at once: '1,3,5,7' (spaces are ignored)\n\n\
         Notes:\n\
         • the original sheet is never modified\n\
         • a student already absent stays absent\n\
         • an ending shared by several students marks nobody; use a different ending"
    )
}

pub fn mode_selected(outcome: &ModeOutcome) -> String {
    let how = match (outcome.effective, outcome.fallback) {
        (_, Some(ModeFallback::NoPriorArtifact)) => {
            "No previous sheet found, so I started a fresh copy of the original (all PRESENT).".to_string()
        }
        (SessionMode::New, None) => "Started a fresh copy of the original (all PRESENT).".to_string(),
        (SessionMode::Continue, None) => format!(
            "Continuing your latest sheet (version {}, {} absent).",
            outcome.artifact.version, outcome.absent
        ),
    };
    let title = match outcome.requested {
        SessionMode::Continue => ADD_ABSENT_LABEL,
        SessionMode::New => NEW_ABSENT_LABEL,
    };
    format!("✅ {title} mode\n\n{how}\nSend registration number endings, {EXAMPLES}.")
}

fn row_line(row: &RosterRow) -> String {
    format!("  • [{}] {}", row.suffix(), row.identity)
}

/// Summary of one submission.
pub fn submission(result: &UpdateResult) -> String {
    let mut lines = Vec::new();

    if !result.updated.is_empty() {
        lines.push(format!(
            "✅ Marked {} student(s) as ABSENT:",
            result.updated.len()
        ));
        for row in &result.updated {
            lines.push(row_line(row));
            lines.push(format!("    Reg: {}", row.registration_number));
        }
    }

    if !result.already_absent.is_empty() {
        lines.push(String::new());
        lines.push("ℹ️ Already absent:".to_string());
        lines.extend(result.already_absent.iter().map(row_line));
    }

    if !result.not_found.is_empty() {
        lines.push(String::new());
        lines.push(format!("⚠️ Not found: {}", result.not_found.join(", ")));
    }

    for ambiguous in &result.ambiguous {
        lines.push(String::new());
        lines.push(format!(
            "⚠️ {} matches {} students, nobody was marked:",
            ambiguous.suffix,
            ambiguous.rows.len()
        ));
        for row in &ambiguous.rows {
            lines.push(format!("  • {} {}", row.registration_number, row.identity));
        }
    }

    if !result.malformed.is_empty() {
        let tokens: Vec<&str> = result.malformed.iter().map(|m| m.token.as_str()).collect();
        lines.push(String::new());
        lines.push(format!(
            "🚫 Ignored (not a 1-2 digit ending): {}",
            tokens.join(", ")
        ));
    }

    if lines.is_empty() {
        return "ℹ️ No changes made.".to_string();
    }
    lines.join("\n").trim_start().to_string()
}

pub fn document_caption(marked: usize) -> String {
    format!("✅ Updated attendance file ({marked} student(s) marked as ABSENT)")
}

/// The absentee list, or `None` when nobody is absent.
pub fn report(report: &AbsenteeReport) -> Option<String> {
    if report.is_empty() {
        return None;
    }
    let mut text = format!(
        "{} {}\n",
        report.date.format("%d-%m-%Y"),
        report.sitting.code()
    );
    if let Some(class) = &report.class_name {
        text.push_str(class);
        text.push('\n');
    }
    text.push_str("\nABSENTEES:\n\n");
    for absentee in &report.absentees {
        text.push_str(&format!("{}-{}\n", absentee.suffix, absentee.name));
    }
    Some(text)
}

pub fn status(phase: &SessionPhase) -> OutboundMessage {
    match phase {
        SessionPhase::NoSession => OutboundMessage::with_modes("No session yet. Choose your session mode:"),
        SessionPhase::AwaitingMode => OutboundMessage::with_modes("Waiting for you to choose a session mode:"),
        SessionPhase::Active {
            mode,
            absent,
            rows,
            artifact_version,
            ..
        } => OutboundMessage::text(format!(
            "📋 Session: {}\nAbsent: {absent} of {rows}\nSheet version: {artifact_version}",
            match mode {
                SessionMode::New => NEW_ABSENT_LABEL,
                SessionMode::Continue => ADD_ABSENT_LABEL,
            }
        )),
    }
}

pub fn unknown_command(name: &str) -> String {
    format!("Unknown command /{name}. Use /help for the list of commands.")
}

/// Operator-facing text for a failed call.
pub fn error(err: &Error) -> OutboundMessage {
    match err {
        Error::SessionState(_) => OutboundMessage::with_modes("⚠️ Please choose a session mode first:"),
        Error::Input(InputError::Empty) => OutboundMessage::text(format!(
            "⚠️ Please send registration number endings, {EXAMPLES}.\nUse /help for more information."
        )),
        Error::Storage(e) => OutboundMessage::text(format!(
            "❌ Nothing was changed: {e}\nPlease try again."
        )),
        other => OutboundMessage::text(format!("❌ {other}")),
    }
}
