//! Per-architecture syscall numbers.
//!
//! The multiplexed bpf entry point and the perf event open call have no
//! libc wrapper on all targets, so both are invoked through `syscall(2)`
//! with these numbers. Resolved at build time per target architecture.

use core::ffi::c_long;

#[cfg(target_arch = "x86_64")]
pub const NR_BPF: c_long = 321;
#[cfg(target_arch = "x86")]
pub const NR_BPF: c_long = 357;
#[cfg(target_arch = "aarch64")]
pub const NR_BPF: c_long = 280;
#[cfg(target_arch = "riscv64")]
pub const NR_BPF: c_long = 280;

#[cfg(target_arch = "x86_64")]
pub const NR_PERF_EVENT_OPEN: c_long = 298;
#[cfg(target_arch = "x86")]
pub const NR_PERF_EVENT_OPEN: c_long = 336;
#[cfg(target_arch = "aarch64")]
pub const NR_PERF_EVENT_OPEN: c_long = 241;
#[cfg(target_arch = "riscv64")]
pub const NR_PERF_EVENT_OPEN: c_long = 241;

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "aarch64",
    target_arch = "riscv64"
)))]
compile_error!("no bpf syscall number known for this target architecture");
