use common::error::IngestError;
use nix::sys::memfd::{memfd_create, MFdFlags};
use nix::unistd::ftruncate;
use std::os::fd::OwnedFd;

/// `memfd_create` gives us an anonymous RAM-backed file with no directory
/// entry at all; `MFD_CLOEXEC` keeps it from leaking across `execve`.
pub fn create_fd(size_bytes: u64) -> Result<OwnedFd, IngestError> {
    let name = c"fivetran_decrypted.csv";
    let fd = memfd_create(name, MFdFlags::MFD_CLOEXEC | MFdFlags::MFD_ALLOW_SEALING)
        .map_err(|errno| IngestError::io(format!("Failed to create memfd: {errno}")))?;

    ftruncate(&fd, size_bytes as i64)
        .map_err(|errno| IngestError::io(format!("Failed to set size of temp memfile: {errno}")))?;

    Ok(fd)
}
