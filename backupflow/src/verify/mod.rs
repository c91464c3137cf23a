//! Verification data model.
//!
//! One [`VerifyEntry`] is produced per checked file. Entries are accumulated
//! in the execution context under `all` and, when the hashes differ, under
//! `failed`; [`VerifyReport`] reads both back out once the run is over.

mod entry;
mod hash;
mod manifest;
mod report;

pub use entry::{record_entry, OutputFormat, VerifyEntry};
pub use hash::HashAlgorithm;
pub use manifest::{Manifest, ManifestError, MANIFEST_HEADER};
pub use report::VerifyReport;
