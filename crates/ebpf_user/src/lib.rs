//! Userspace support layer for kernel-verified bytecode objects.
//!
//! This crate builds, loads and manages the kernel objects behind the
//! multiplexed bpf entry point: instruction sequences, maps, programs,
//! pins and event sources. It is deliberately a narrow translation
//! layer - it does not interpret bytecode, reimplement the verifier, or
//! decide what gets attached where.
//!
//! # Modules
//!
//! - [`bytecode`] - pure instruction encoding, no kernel interaction
//! - [`sys`] - the syscall wrapper, one typed façade per command
//! - [`map`] - map creation, element access and iteration
//! - [`prog`] - program load, attach/detach and test runs
//! - [`obj`] - pinning handles to the bpf filesystem
//! - [`perf`] - event source descriptors for later attachment
//!
//! # Quick start
//!
//! ```no_run
//! use ebpf_user::bytecode::{Insn, InsnSeq, Register};
//! use ebpf_user::prog::{LoadSpec, ProgType, Program};
//!
//! # fn main() -> ebpf_user::Result<()> {
//! // A program that returns 42.
//! let mut seq = InsnSeq::new();
//! seq.push(Insn::mov64_imm(Register::R0, 42))
//!     .push(Insn::exit());
//!
//! let prog = Program::load(&LoadSpec::new(ProgType::SocketFilter), &seq)?;
//! let run = prog.test_run(&[0u8; 14], 1)?;
//! assert_eq!(run.return_value, 42);
//! # Ok(())
//! # }
//! ```
//!
//! # Ownership
//!
//! Kernel objects are referenced only by handles. [`map::Map`] and
//! [`prog::Program`] own theirs and close on drop; neither is
//! cloneable, and `into_fd()` is the escape hatch when the caller wants
//! to manage the descriptor lifetime manually. Nothing here reference
//! counts, retries, or recovers - errors carry the raw kernel errno to
//! the caller.

pub mod bytecode;
mod error;
pub mod map;
pub mod obj;
pub mod perf;
pub mod prog;
pub mod sys;

pub use error::{Error, Result};
pub use map::{Map, MapConfig, MapType, UpdateFlags};
pub use prog::{LoadSpec, ProgType, Program, TestRun};

// Flag types travel with the requests they configure.
pub use ebpf_abi::{AttachFlags, MapFlags};
