//! # rollcall core
//!
//! Domain types, traits, and error definitions for the rollcall attendance
//! bot. This crate does no I/O of its own: it defines the roster model, the
//! suffix matcher, and the seams (`RosterStore`, `SnapshotArchive`,
//! `NameSource`, `Channel`) that the other crates implement.
//!
//! ## Data flow
//!
//! 1. A `RosterStore` loads the original sheet into an immutable [`Roster`].
//! 2. A session clones it into a [`WorkingSnapshot`] (or reopens an archived one).
//! 3. Operator text is turned into an [`UpdatePlan`] by [`match_suffixes`].
//! 4. The session controller applies the plan and exports the snapshot.

pub mod channel;
pub mod error;
pub mod matcher;
pub mod outcome;
pub mod report;
pub mod roster;
pub mod session;
pub mod sheet;
pub mod snapshot;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage, InboundKind, OutboundDocument, OutboundMessage};
pub use error::{Error, Result};
pub use matcher::{match_suffixes, parse_input, MalformedToken, ParsedInput, PlanEntry, Resolution, Suffix, TypedSuffix, UpdatePlan};
pub use outcome::{AmbiguousMatch, ModeFallback, ModeOutcome, SubmitOutcome, UpdateResult};
pub use report::{AbsenteeReport, NameDirectory, Sitting};
pub use roster::{Roster, RosterRow, RosterSchema, Status};
pub use session::{RequesterId, SessionId, SessionMode, SessionPhase};
pub use sheet::Sheet;
pub use snapshot::{Transition, WorkingSnapshot};
pub use store::{ArtifactHandle, NameSource, NoNames, RosterStore, SnapshotArchive};
