//! Object pinning.
//!
//! A pin names a handle at a path under the bpf filesystem mount. The
//! pin's lifetime is independent of this process: the object survives
//! process exit, and an unrelated process can reopen it with [`get`].
//! No path validation happens here beyond NUL-freedom; the kernel
//! enforces the filesystem rules.

use std::ffi::CString;
use std::os::fd::{BorrowedFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::Result;
use crate::sys;

/// Persist `fd` at `path`.
pub fn pin(fd: BorrowedFd<'_>, path: impl AsRef<Path>) -> Result<()> {
    let path = cstring(path.as_ref())?;
    sys::obj_pin(fd, &path)?;
    Ok(())
}

/// Reopen the object pinned at `path`.
pub fn get(path: impl AsRef<Path>) -> Result<OwnedFd> {
    let path = cstring(path.as_ref())?;
    Ok(sys::obj_get(&path)?)
}

fn cstring(path: &Path) -> Result<CString> {
    Ok(CString::new(path.as_os_str().as_bytes())?)
}
