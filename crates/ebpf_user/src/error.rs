//! Error types.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by this layer.
///
/// Kernel rejections travel as the raw OS error; nothing is rewritten
/// or retried here. Expected not-found outcomes (map lookup misses,
/// end of iteration) are `Ok(None)` at the call sites, never an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The kernel rejected the request; the original errno is inside.
    #[error(transparent)]
    Sys(#[from] io::Error),

    /// The verifier rejected the program at load time. The log text is
    /// the kernel's own diagnostic, the only in-band channel there is.
    #[error("program rejected by verifier: {log}")]
    Verifier {
        /// The load failure as reported by the kernel.
        source: io::Error,
        /// Verifier diagnostic, up to the configured log capacity.
        log: String,
    },

    /// A caller buffer does not match the declared key or value size.
    #[error("buffer size mismatch: declared {declared}, got {got}")]
    BufferSize {
        /// Size declared when the map was created.
        declared: usize,
        /// Length of the buffer the caller passed.
        got: usize,
    },

    /// A pin path or license string contains an interior NUL byte and
    /// cannot cross the C boundary.
    #[error("string not representable in the kernel interface: {0}")]
    InteriorNul(#[from] std::ffi::NulError),
}

impl Error {
    /// The underlying OS error number, when the kernel produced one.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Self::Sys(err) => err.raw_os_error(),
            Self::Verifier { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
