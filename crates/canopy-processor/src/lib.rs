//! Canopy Processor - concurrent analysis of files, projects and solutions.
//!
//! ```text
//! Solution ──▶ SolutionManifestParser ──▶ projects (fan-out, no permits)
//!    Project ──▶ ProjectManifestParser ──▶ files (fan-out, largest first)
//!       File ──▶ [permit] read ──▶ Analyzer::analyze (blocking pool)
//! ```
//!
//! Every parse at every level shares one semaphore, so at most
//! `max_concurrency` files are parsed at once. Aggregates are sorted by
//! path; failures below the solution root become error nodes.

mod aggregate;
mod classify;
mod error;
mod partition;
mod processor;

pub use aggregate::{
    batch_root, directory_root, error_count, project_root, solution_root, sorted_by_path,
    BATCH_KIND, BATCH_TYPE, DIRECTORY_KIND, DIRECTORY_TYPE, PROJECT_KIND, PROJECT_TYPE,
    SOLUTION_KIND, SOLUTION_TYPE,
};
pub use classify::{classify, InputKind};
pub use error::{Error, Result};
pub use partition::{largest_first, order_by_size};
pub use processor::{default_max_concurrency, Processor, ProcessorOptions, MAX_DEFAULT_CONCURRENCY};
