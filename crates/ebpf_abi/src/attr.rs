//! Command attribute structs.
//!
//! The kernel entry point takes a pointer to a per-command attribute
//! record plus its size. In the kernel header this is one big union; here
//! each command family gets its own `#[repr(C)]` struct carrying only the
//! fields that command reads, so the compiler checks field usage per
//! command. Field offsets must match the kernel union exactly; the tests
//! below lock them down.
//!
//! The kernel requires every byte it does not consume to be zero, so
//! attribute values are built from [`zeroed`](MapCreateAttr::zeroed)
//! before individual fields are filled in. All-zero is a valid value for
//! every field, padding included.

use crate::OBJ_NAME_LEN;

macro_rules! zeroed_ctor {
    ($name:ident) => {
        impl $name {
            /// An all-zero attribute record, padding bytes included.
            #[must_use]
            pub fn zeroed() -> Self {
                // SAFETY: the struct holds only integers and byte arrays;
                // the all-zero bit pattern is a valid value.
                unsafe { core::mem::zeroed() }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::zeroed()
            }
        }
    };
}

/// BPF_MAP_CREATE.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MapCreateAttr {
    pub map_type: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub map_flags: u32,
    /// Handle of the inner map for map-in-map types, 0 otherwise.
    pub inner_map_fd: u32,
    /// Only honored when `map_flags` carries the NUMA_NODE bit.
    pub numa_node: u32,
    pub map_name: [u8; OBJ_NAME_LEN],
}

zeroed_ctor!(MapCreateAttr);

/// BPF_MAP_LOOKUP_ELEM / UPDATE_ELEM / DELETE_ELEM / GET_NEXT_KEY.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MapElemAttr {
    pub map_fd: u32,
    pub key: u64,
    /// Value pointer for lookup/update, next-key pointer for iteration.
    pub value: u64,
    pub flags: u64,
}

zeroed_ctor!(MapElemAttr);

/// BPF_PROG_LOAD.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProgLoadAttr {
    pub prog_type: u32,
    pub insn_cnt: u32,
    pub insns: u64,
    pub license: u64,
    pub log_level: u32,
    pub log_size: u32,
    pub log_buf: u64,
    pub kern_version: u32,
    pub prog_flags: u32,
    pub prog_name: [u8; OBJ_NAME_LEN],
}

zeroed_ctor!(ProgLoadAttr);

/// BPF_OBJ_PIN / BPF_OBJ_GET.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ObjAttr {
    pub pathname: u64,
    pub bpf_fd: u32,
    pub file_flags: u32,
}

zeroed_ctor!(ObjAttr);

/// BPF_PROG_ATTACH / BPF_PROG_DETACH.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProgAttachAttr {
    pub target_fd: u32,
    pub attach_bpf_fd: u32,
    pub attach_type: u32,
    pub attach_flags: u32,
}

zeroed_ctor!(ProgAttachAttr);

/// BPF_PROG_TEST_RUN.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TestRunAttr {
    pub prog_fd: u32,
    pub retval: u32,
    pub data_size_in: u32,
    /// In: capacity of the output buffer. Out: bytes produced.
    pub data_size_out: u32,
    pub data_in: u64,
    pub data_out: u64,
    pub repeat: u32,
    pub duration: u32,
}

zeroed_ctor!(TestRunAttr);

#[cfg(test)]
mod tests {
    use core::mem::{offset_of, size_of};

    use super::*;

    #[test]
    fn map_create_layout() {
        assert_eq!(size_of::<MapCreateAttr>(), 44);
        assert_eq!(offset_of!(MapCreateAttr, map_type), 0);
        assert_eq!(offset_of!(MapCreateAttr, key_size), 4);
        assert_eq!(offset_of!(MapCreateAttr, value_size), 8);
        assert_eq!(offset_of!(MapCreateAttr, max_entries), 12);
        assert_eq!(offset_of!(MapCreateAttr, map_flags), 16);
        assert_eq!(offset_of!(MapCreateAttr, inner_map_fd), 20);
        assert_eq!(offset_of!(MapCreateAttr, numa_node), 24);
        assert_eq!(offset_of!(MapCreateAttr, map_name), 28);
    }

    #[test]
    fn map_elem_layout() {
        assert_eq!(size_of::<MapElemAttr>(), 32);
        assert_eq!(offset_of!(MapElemAttr, map_fd), 0);
        assert_eq!(offset_of!(MapElemAttr, key), 8);
        assert_eq!(offset_of!(MapElemAttr, value), 16);
        assert_eq!(offset_of!(MapElemAttr, flags), 24);
    }

    #[test]
    fn prog_load_layout() {
        assert_eq!(size_of::<ProgLoadAttr>(), 64);
        assert_eq!(offset_of!(ProgLoadAttr, prog_type), 0);
        assert_eq!(offset_of!(ProgLoadAttr, insn_cnt), 4);
        assert_eq!(offset_of!(ProgLoadAttr, insns), 8);
        assert_eq!(offset_of!(ProgLoadAttr, license), 16);
        assert_eq!(offset_of!(ProgLoadAttr, log_level), 24);
        assert_eq!(offset_of!(ProgLoadAttr, log_size), 28);
        assert_eq!(offset_of!(ProgLoadAttr, log_buf), 32);
        assert_eq!(offset_of!(ProgLoadAttr, kern_version), 40);
        assert_eq!(offset_of!(ProgLoadAttr, prog_flags), 44);
        assert_eq!(offset_of!(ProgLoadAttr, prog_name), 48);
    }

    #[test]
    fn obj_layout() {
        assert_eq!(size_of::<ObjAttr>(), 16);
        assert_eq!(offset_of!(ObjAttr, pathname), 0);
        assert_eq!(offset_of!(ObjAttr, bpf_fd), 8);
        assert_eq!(offset_of!(ObjAttr, file_flags), 12);
    }

    #[test]
    fn prog_attach_layout() {
        assert_eq!(size_of::<ProgAttachAttr>(), 16);
        assert_eq!(offset_of!(ProgAttachAttr, target_fd), 0);
        assert_eq!(offset_of!(ProgAttachAttr, attach_bpf_fd), 4);
        assert_eq!(offset_of!(ProgAttachAttr, attach_type), 8);
        assert_eq!(offset_of!(ProgAttachAttr, attach_flags), 12);
    }

    #[test]
    fn test_run_layout() {
        assert_eq!(size_of::<TestRunAttr>(), 40);
        assert_eq!(offset_of!(TestRunAttr, prog_fd), 0);
        assert_eq!(offset_of!(TestRunAttr, data_in), 16);
        assert_eq!(offset_of!(TestRunAttr, data_out), 24);
        assert_eq!(offset_of!(TestRunAttr, repeat), 32);
        assert_eq!(offset_of!(TestRunAttr, duration), 36);
    }

    #[test]
    fn zeroed_is_all_zero_bytes() {
        let attr = ProgLoadAttr::zeroed();
        // SAFETY: reading the object representation of a plain-integer
        // struct as bytes.
        let bytes = unsafe {
            core::slice::from_raw_parts(
                (&attr as *const ProgLoadAttr).cast::<u8>(),
                size_of::<ProgLoadAttr>(),
            )
        };
        assert!(bytes.iter().all(|&b| b == 0));
    }
}
