//! Flag words carried in the command attribute structs.

use bitflags::bitflags;

bitflags! {
    /// Map creation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MapFlags: u32 {
        /// Allocate entries on demand instead of up front.
        const NO_PREALLOC   = 1 << 0;
        /// Give each CPU its own LRU list.
        const NO_COMMON_LRU = 1 << 1;
        /// Honor the numa_node field of the create request.
        const NUMA_NODE     = 1 << 2;
        /// Map is read-only from userspace.
        const RDONLY        = 1 << 3;
        /// Map is write-only from userspace.
        const WRONLY        = 1 << 4;
    }
}

bitflags! {
    /// Program attachment flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AttachFlags: u32 {
        /// Descendant cgroups may override this program.
        const ALLOW_OVERRIDE = 1 << 0;
        /// Multiple programs may coexist on the target.
        const ALLOW_MULTI    = 1 << 1;
        /// Atomically replace an existing program.
        const REPLACE        = 1 << 2;
    }
}

/// Element update: create or overwrite.
pub const BPF_ANY: u64 = 0;
/// Element update: create only, fail if the key exists.
pub const BPF_NOEXIST: u64 = 1;
/// Element update: overwrite only, fail if the key is absent.
pub const BPF_EXIST: u64 = 2;
