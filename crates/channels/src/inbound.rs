//! Classifying free-form chat text.

use rollcall_core::channel::InboundKind;
use rollcall_core::session::SessionMode;

/// Turn raw chat text into an [`InboundKind`].
///
/// `/name args` is a command (a `@botname` suffix on the name is dropped).
/// `/new`, `/continue` and `/add` select a session mode directly; anything
/// else is absentee text.
pub fn classify(text: &str) -> InboundKind {
    let trimmed = text.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return InboundKind::Text {
            text: trimmed.to_string(),
        };
    };

    let (head, args) = command
        .split_once(char::is_whitespace)
        .unwrap_or((command, ""));
    let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

    match name.parse::<SessionMode>() {
        Ok(mode) => InboundKind::ModeSelected {
            mode,
            callback_id: None,
        },
        Err(_) => InboundKind::Command {
            name,
            args: args.trim().to_string(),
        },
    }
}
