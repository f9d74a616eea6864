//! Storage backends for rollcall.
//!
//! - **CSV roster**: the original attendance sheet, loaded once and cached
//! - **Snapshot archive**: versioned CSV artifacts, one lineage per requester
//! - **Name list**: optional suffix -> name sheet for absentee reports
//! - **In-memory**: roster and archive doubles for tests and dry runs

pub mod archive;
pub mod csv_sheet;
pub mod in_memory;
pub mod names;
pub mod roster_file;

pub use archive::FileSnapshotArchive;
pub use in_memory::{InMemoryArchive, InMemoryRosterStore};
pub use names::CsvNameList;
pub use roster_file::CsvRosterStore;
