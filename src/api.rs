//! The boolean boundary the CLI and foreign callers go through.
//!
//! Nothing crosses this surface but `true`/`false`; failures are emitted on
//! the diagnostic channel (`tracing`) instead of propagating.

use std::path::Path;

use tracing::error;

use crate::container::{pack_container, unpack_container, UnpackOptions};

/// Unpack `source_file` into `dest_dir` with default options.
pub fn parse_container(source_file: &Path, dest_dir: &Path) -> bool {
    match unpack_container(source_file, dest_dir, &UnpackOptions::default()) {
        Ok(()) => true,
        Err(e) => {
            error!(source = %source_file.display(), "parse failed: {e}");
            false
        }
    }
}

/// Pack the tree at `source_dir` into a container at `dest_file`.
pub fn build_container(source_dir: &Path, dest_file: &Path) -> bool {
    match pack_container(source_dir, dest_file) {
        Ok(()) => true,
        Err(e) => {
            error!(source = %source_dir.display(), "build failed: {e}");
            false
        }
    }
}
