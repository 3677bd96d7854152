//! Event source binding.
//!
//! Opens a performance-counter or software event descriptor that a
//! program can later be attached to. The attribute record is passed
//! through opaquely; interpreting it is not this layer's business.

use std::ffi::{c_int, c_ulong};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};

use ebpf_abi::NR_PERF_EVENT_OPEN;
use log::trace;

use crate::error::Result;

/// Open an event source descriptor.
///
/// `pid` and `cpu` scope the event the way the kernel call does: -1
/// means any process or any CPU respectively. `group` joins an
/// existing event group.
pub fn event_open(
    attr: &libc::perf_event_attr,
    pid: i32,
    cpu: i32,
    group: Option<BorrowedFd<'_>>,
    flags: u64,
) -> Result<OwnedFd> {
    trace!("perf_event_open pid={pid} cpu={cpu} flags={flags:#x}");
    let group_fd = group.map_or(-1, |fd| fd.as_raw_fd());
    // SAFETY: attr points to a live attribute record; the kernel only
    // reads it.
    let ret = unsafe {
        libc::syscall(
            NR_PERF_EVENT_OPEN,
            attr as *const libc::perf_event_attr,
            pid as c_int,
            cpu as c_int,
            group_fd as c_int,
            flags as c_ulong,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error().into());
    }
    // SAFETY: the kernel just returned this descriptor to us and
    // nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(ret as c_int) })
}
