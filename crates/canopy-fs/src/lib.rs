//! Async filesystem abstraction for canopy.
//!
//! This crate provides a `FileSystem` trait with a native implementation
//! (std::fs on the blocking pool, gitignore-aware discovery) and an
//! in-memory implementation for tests.
//!
//! # Example
//!
//! ```no_run
//! use canopy_fs::{FileSystem, NativeFileSystem};
//! use std::sync::Arc;
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> std::io::Result<()> {
//! let fs = Arc::new(NativeFileSystem::new(".")?);
//! let contents = fs.read_to_string(Path::new("App.csproj")).await?;
//! println!("{}", contents);
//! # Ok(())
//! # }
//! ```

mod file_system;
pub use file_system::{normalize_lexically, DiscoveryOptions, FileMetadata, FileSystem};

#[cfg(feature = "native")]
pub mod native;
#[cfg(feature = "native")]
pub use native::NativeFileSystem;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "memory")]
pub use memory::MemoryFileSystem;
