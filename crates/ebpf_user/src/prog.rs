//! Program lifecycle.
//!
//! A program moves through instructions-ready → loaded → attached →
//! detached; load is the verification gate, and the handle returned by
//! it is the only artifact that survives. [`Program`] owns that handle
//! and releases it on drop.
//!
//! Detach comes in two deliberately different shapes. The plain
//! [`detach`] form clears whatever holds the hook and treats an
//! already-empty hook as success. [`Program::detach_from`] names the
//! program and fails when a different one holds the hook - that check
//! protects co-tenants from being detached by accident and must not be
//! folded into the plain form.

use std::ffi::CString;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;
use std::time::Duration;

use ebpf_abi::AttachFlags;
use log::debug;

use crate::bytecode::InsnSeq;
use crate::error::{Error, Result};
use crate::{obj, sys};

/// Kernel program type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ProgType {
    /// Unspecified
    #[default]
    Unspec = 0,
    /// Socket filter
    SocketFilter = 1,
    /// Kernel probe
    Kprobe = 2,
    /// Traffic-control classifier
    SchedCls = 3,
    /// Traffic-control action
    SchedAct = 4,
    /// Static tracepoint
    Tracepoint = 5,
    /// Express data path
    Xdp = 6,
    /// Perf event handler
    PerfEvent = 7,
    /// Cgroup socket buffer filter
    CgroupSkb = 8,
    /// Cgroup socket lifecycle hook
    CgroupSock = 9,
    /// Lightweight tunnel input
    LwtIn = 10,
    /// Lightweight tunnel output
    LwtOut = 11,
    /// Lightweight tunnel transmit
    LwtXmit = 12,
    /// Socket operations
    SockOps = 13,
    /// Socket buffer redirection
    SkSkb = 14,
    /// Cgroup device access control
    CgroupDevice = 15,
    /// Socket message redirection
    SkMsg = 16,
    /// Raw tracepoint
    RawTracepoint = 17,
    /// Cgroup socket address hook
    CgroupSockAddr = 18,
}

/// Kernel hook points a program can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttachType {
    /// Cgroup ingress socket buffers
    CgroupInetIngress = 0,
    /// Cgroup egress socket buffers
    CgroupInetEgress = 1,
    /// Cgroup socket creation
    CgroupInetSockCreate = 2,
    /// Cgroup socket operations
    CgroupSockOps = 3,
    /// Socket map stream parser
    SkSkbStreamParser = 4,
    /// Socket map stream verdict
    SkSkbStreamVerdict = 5,
    /// Cgroup device access
    CgroupDevice = 6,
    /// Socket message verdict
    SkMsgVerdict = 7,
    /// Cgroup IPv4 bind
    CgroupInet4Bind = 8,
    /// Cgroup IPv6 bind
    CgroupInet6Bind = 9,
    /// Cgroup IPv4 connect
    CgroupInet4Connect = 10,
    /// Cgroup IPv6 connect
    CgroupInet6Connect = 11,
    /// Cgroup IPv4 post-bind
    CgroupInet4PostBind = 12,
    /// Cgroup IPv6 post-bind
    CgroupInet6PostBind = 13,
    /// Cgroup IPv4 sendmsg
    CgroupUdp4Sendmsg = 14,
    /// Cgroup IPv6 sendmsg
    CgroupUdp6Sendmsg = 15,
}

/// Everything a load needs besides the instructions.
#[derive(Debug, Clone)]
pub struct LoadSpec {
    /// Program type tag.
    pub prog_type: ProgType,
    /// Optional name, truncated to the ABI limit.
    pub name: Option<String>,
    /// License string; GPL-compatible licenses unlock kernel helpers.
    pub license: String,
    /// Kernel version stamp, required by some program types.
    pub kern_version: u32,
    /// Capacity of the verifier log buffer. Zero disables log
    /// collection entirely.
    pub log_capacity: usize,
}

impl LoadSpec {
    /// Default capacity for the verifier log buffer.
    pub const DEFAULT_LOG_CAPACITY: usize = 64 * 1024;

    /// A load spec for the given program type with GPL license and the
    /// default log capacity.
    pub fn new(prog_type: ProgType) -> Self {
        Self {
            prog_type,
            name: None,
            license: "GPL".to_owned(),
            kern_version: 0,
            log_capacity: Self::DEFAULT_LOG_CAPACITY,
        }
    }

    /// Set the program name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the license string.
    #[must_use]
    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    /// Set the kernel version stamp.
    #[must_use]
    pub fn kern_version(mut self, version: u32) -> Self {
        self.kern_version = version;
        self
    }

    /// Set the verifier log capacity.
    #[must_use]
    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }
}

/// Outcome of a test run.
#[derive(Debug, Clone)]
pub struct TestRun {
    /// Program return value.
    pub return_value: u32,
    /// Output data, truncated to what the program produced.
    pub output: Vec<u8>,
    /// Mean execution time per iteration.
    pub duration: Duration,
}

/// A loaded program, held by its handle.
#[derive(Debug)]
pub struct Program {
    fd: OwnedFd,
}

impl Program {
    /// Load and verify an instruction sequence.
    ///
    /// The verifier can reject a program for reasons opaque to this
    /// layer; the only recourse is its log, surfaced through
    /// [`Error::Verifier`].
    pub fn load(spec: &LoadSpec, insns: &InsnSeq) -> Result<Self> {
        let license = CString::new(spec.license.as_str())?;
        let mut log = vec![0u8; spec.log_capacity];
        match sys::prog_load_named(
            spec.prog_type,
            spec.name.as_deref(),
            insns.as_slice(),
            &license,
            spec.kern_version,
            &mut log,
        ) {
            Ok(fd) => Ok(Self { fd }),
            Err(err) => {
                let text = log_text(&log);
                if text.is_empty() {
                    Err(err.into())
                } else {
                    debug!("verifier rejected program: {text}");
                    Err(Error::Verifier {
                        source: err,
                        log: text,
                    })
                }
            }
        }
    }

    /// Reopen a pinned program.
    pub fn open_pinned(path: impl AsRef<Path>) -> Result<Self> {
        let fd = obj::get(path)?;
        Ok(Self { fd })
    }

    /// Attach this program to a target hook.
    pub fn attach(
        &self,
        target: BorrowedFd<'_>,
        attach_type: AttachType,
        flags: AttachFlags,
    ) -> Result<()> {
        sys::prog_attach(self.fd.as_fd(), target, attach_type, flags)?;
        Ok(())
    }

    /// Detach this specific program from a target hook.
    ///
    /// Fails with the kernel's mismatch error when the hook is held by
    /// a different program, leaving that attachment intact.
    pub fn detach_from(&self, target: BorrowedFd<'_>, attach_type: AttachType) -> Result<()> {
        sys::prog_detach2(self.fd.as_fd(), target, attach_type)?;
        Ok(())
    }

    /// Run the program synchronously against `input` and report the
    /// return value, output data and measured duration. Nothing is
    /// attached and no attachment state changes.
    pub fn test_run(&self, input: &[u8], repeat: u32) -> Result<TestRun> {
        // Room for programs that grow their input, e.g. encapsulation.
        let mut output = vec![0u8; input.len() + 256];
        // SAFETY: the output buffer carries headroom beyond the input
        // size and its capacity is declared to the kernel.
        let out = unsafe { sys::prog_test_run(self.fd.as_fd(), repeat, input, &mut output) }?;
        output.truncate(out.data_len as usize);
        Ok(TestRun {
            return_value: out.retval,
            output,
            duration: Duration::from_nanos(u64::from(out.duration_ns)),
        })
    }

    /// Persist the handle at `path` so the program outlives this
    /// process.
    pub fn pin(&self, path: impl AsRef<Path>) -> Result<()> {
        obj::pin(self.fd.as_fd(), path)
    }

    /// Borrow the underlying handle.
    pub fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    /// Take ownership of the handle, giving up the lifecycle guard.
    pub fn into_fd(self) -> OwnedFd {
        self.fd
    }
}

impl AsFd for Program {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Detach whatever program is attached to `(target, attach_type)`.
///
/// An already-empty hook is a no-op success; this form is idempotent at
/// the relation level.
pub fn detach(target: BorrowedFd<'_>, attach_type: AttachType) -> Result<()> {
    match sys::prog_detach(target, attach_type) {
        Ok(()) => Ok(()),
        Err(err) if err.raw_os_error() == Some(libc::ENOENT) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// The NUL-terminated text the verifier left in its log buffer.
fn log_text(log: &[u8]) -> String {
    let end = log.iter().position(|&b| b == 0).unwrap_or(log.len());
    String::from_utf8_lossy(&log[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_spec_defaults() {
        let spec = LoadSpec::new(ProgType::SocketFilter);
        assert_eq!(spec.license, "GPL");
        assert_eq!(spec.kern_version, 0);
        assert_eq!(spec.log_capacity, LoadSpec::DEFAULT_LOG_CAPACITY);
        assert!(spec.name.is_none());
    }

    #[test]
    fn log_text_stops_at_nul() {
        let mut buf = vec![0u8; 16];
        buf[..5].copy_from_slice(b"R0 !r");
        assert_eq!(log_text(&buf), "R0 !r");
        assert_eq!(log_text(&[]), "");
    }
}
