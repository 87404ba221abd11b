//! Anonymous, filesystem-invisible, RAII-released staging file (spec §4.2).

use common::error::IngestError;
use std::os::fd::OwnedFd;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod fallback;

#[cfg(target_os = "linux")]
use linux::create_fd;
#[cfg(not(target_os = "linux"))]
use fallback::create_fd;

/// A RAM-backed file. Its descriptor is the only handle; once it's closed
/// the `/dev/fd/<N>` path stops resolving. Moving a `MemFile` transfers the
/// descriptor via ordinary Rust ownership — there is no explicit move
/// constructor to write, `OwnedFd` already does the right thing.
pub struct MemFile {
    fd: OwnedFd,
    path: String,
}

impl MemFile {
    #[track_caller]
    pub fn create(size_bytes: u64) -> Result<Self, IngestError> {
        let fd = create_fd(size_bytes)?;
        let path = format!("/dev/fd/{}", std::os::fd::AsRawFd::as_raw_fd(&fd));
        Ok(Self { fd, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn as_raw_fd(&self) -> std::os::fd::RawFd {
        std::os::fd::AsRawFd::as_raw_fd(&self.fd)
    }

    /// Shrinks the file to exactly `len` bytes. Used once a writer has
    /// finished: `create` sizes the file up front (so the writer can use a
    /// plain `Write` without pre-knowing the final length), which leaves the
    /// zero-filled tail beyond whatever was actually written unless this is
    /// called afterward.
    #[track_caller]
    pub fn set_len(&self, len: u64) -> Result<(), IngestError> {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|err| IngestError::io_with_source(format!("Failed to reopen {} to resize", self.path), err))?;
        file.set_len(len)
            .map_err(|err| IngestError::io_with_source(format!("Failed to truncate {} to {len} bytes", self.path), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn created_file_reads_back_as_zeros() {
        let mem = MemFile::create(64).expect("memfile create");
        let mut file = std::fs::File::open(mem.path()).expect("open /dev/fd path");
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).expect("read memfile");
        assert_eq!(buf, vec![0u8; 64]);
    }

    #[test]
    fn set_len_shrinks_away_the_zero_filled_tail() {
        let mem = MemFile::create(64).expect("memfile create");
        {
            let mut out = std::fs::OpenOptions::new().write(true).open(mem.path()).expect("open for write");
            out.write_all(b"hello").expect("write");
        }
        mem.set_len(5).expect("set_len");

        let mut file = std::fs::File::open(mem.path()).expect("open /dev/fd path");
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).expect("read memfile");
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn path_stops_resolving_after_drop() {
        let path = {
            let mem = MemFile::create(16).expect("memfile create");
            mem.path().to_string()
        };
        assert!(std::fs::File::open(&path).is_err());
    }
}
