//! Raw ABI surface of the eBPF kernel interface.
//!
//! Everything in this crate is a compile-time constant or a `#[repr(C)]`
//! record whose layout is fixed by the kernel. There is no behavior here;
//! the syscall wrapper in `ebpf_user` is the only consumer that turns
//! these definitions into kernel calls.

#![no_std]

mod attr;
mod cmd;
mod flags;
mod syscall;

pub use attr::*;
pub use cmd::*;
pub use flags::*;
pub use syscall::*;

/// Maximum length of a map or program name, including the NUL terminator.
pub const OBJ_NAME_LEN: usize = 16;

/// Source-register tag marking a wide immediate load as a map handle
/// reference instead of a literal value.
pub const PSEUDO_MAP_FD: u8 = 1;
