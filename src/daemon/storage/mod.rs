//!  Storage is organized through [record_storage::SqliteStore].
//!  The basic idea is:
//!   - There is one SQLite database holding the activity log, calendar events and manual tags.
//!   - Records are stored as intervals from time a, for duration b.
//!   - Only the sampling pipeline appends records; tag columns may be rewritten by retagging.

pub mod entities;
pub mod record_storage;
pub mod schema;
