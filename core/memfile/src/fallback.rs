use common::error::IngestError;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// Non-Linux fallback: an unlinked temp file. `tempfile::tempfile()` already
/// creates the file and removes its directory entry on platforms that
/// support it (matching the upstream macOS `/tmp` + `unlink` dance), so all
/// that's left is sizing it.
pub fn create_fd(size_bytes: u64) -> Result<OwnedFd, IngestError> {
    let file = tempfile::tempfile()
        .map_err(|err| IngestError::io_with_source("Failed to create temp memfile", err))?;

    file.set_len(size_bytes)
        .map_err(|err| IngestError::io_with_source("Failed to set size of temp memfile", err))?;

    let raw_fd = file.as_raw_fd();
    std::mem::forget(file);
    // Safety: `raw_fd` came from `file`, which we just `forget`-ed, so
    // ownership of the descriptor is uniquely transferred into `OwnedFd`.
    Ok(unsafe { OwnedFd::from_raw_fd(raw_fd) })
}
