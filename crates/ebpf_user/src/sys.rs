//! Syscall wrapper.
//!
//! Every kernel object in this crate is created and driven through one
//! multiplexed entry point: `syscall(NR_BPF, cmd, attr, size)`. [`Cmd`]
//! models each sub-command as a variant carrying only the fields that
//! command reads, and [`bpf`] is the single dispatch point that marshals
//! the variant into its `#[repr(C)]` attribute record and performs the
//! call.
//!
//! The thin per-command functions below are the public surface; they are
//! façades over the dispatch, nothing more. No retries, no error
//! rewriting - a negative return surfaces as the raw OS error.

use std::ffi::{CStr, c_int, c_long, c_void};
use std::io;
use std::mem::size_of;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};

use ebpf_abi::{
    AttachFlags, BPF_MAP_CREATE, BPF_MAP_DELETE_ELEM, BPF_MAP_GET_NEXT_KEY, BPF_MAP_LOOKUP_ELEM,
    BPF_MAP_UPDATE_ELEM, BPF_OBJ_GET, BPF_OBJ_PIN, BPF_PROG_ATTACH, BPF_PROG_DETACH,
    BPF_PROG_LOAD, BPF_PROG_TEST_RUN, MapCreateAttr, MapElemAttr, MapFlags, NR_BPF,
    OBJ_NAME_LEN, ObjAttr, ProgAttachAttr, ProgLoadAttr, TestRunAttr,
};
use log::trace;

use crate::bytecode::Insn;
use crate::map::MapType;
use crate::prog::{AttachType, ProgType};

/// Outputs of a test run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestRunOut {
    /// Program return value (r0 of the last iteration).
    pub retval: u32,
    /// Bytes of output data produced.
    pub data_len: u32,
    /// Mean execution time per iteration, nanoseconds.
    pub duration_ns: u32,
}

/// One kernel command, carrying only the fields that command reads.
///
/// Key and value buffers are caller-owned and must match the sizes
/// declared when the map was created; the kernel reads and writes the
/// declared sizes regardless of the slice lengths here. The safe
/// lifecycle types in [`map`](crate::map) and [`prog`](crate::prog)
/// enforce that before anything reaches this layer.
pub enum Cmd<'a> {
    /// Create a map; the handle is the return value.
    MapCreate {
        map_type: MapType,
        name: Option<&'a str>,
        key_size: u32,
        value_size: u32,
        max_entries: u32,
        flags: MapFlags,
        numa_node: Option<u32>,
        inner_map: Option<BorrowedFd<'a>>,
    },
    /// Read the value stored under `key` into `value`.
    MapLookup {
        map: BorrowedFd<'a>,
        key: &'a [u8],
        value: &'a mut [u8],
    },
    /// Insert or overwrite the value under `key`.
    MapUpdate {
        map: BorrowedFd<'a>,
        key: &'a [u8],
        value: &'a [u8],
        flags: u64,
    },
    /// Remove the entry under `key`.
    MapDelete { map: BorrowedFd<'a>, key: &'a [u8] },
    /// Write the key following `key` into `next_key`; `None` starts
    /// iteration from the beginning.
    MapNextKey {
        map: BorrowedFd<'a>,
        key: Option<&'a [u8]>,
        next_key: &'a mut [u8],
    },
    /// Load a program; the handle is the return value. On verifier
    /// rejection the kernel fills `log` up to its length.
    ProgLoad {
        prog_type: ProgType,
        name: Option<&'a str>,
        insns: &'a [Insn],
        license: &'a CStr,
        kern_version: u32,
        log: &'a mut [u8],
    },
    /// Persist `fd` at `path` in the bpf filesystem.
    ObjPin { fd: BorrowedFd<'a>, path: &'a CStr },
    /// Reopen a pinned object; the handle is the return value.
    ObjGet { path: &'a CStr },
    /// Attach `prog` to `target` for the given hook.
    ProgAttach {
        prog: BorrowedFd<'a>,
        target: BorrowedFd<'a>,
        attach_type: AttachType,
        flags: AttachFlags,
    },
    /// Detach whatever is attached to `(target, attach_type)`.
    ProgDetach {
        target: BorrowedFd<'a>,
        attach_type: AttachType,
    },
    /// Detach `prog` specifically; fails if another program holds the
    /// hook.
    ProgDetachProg {
        prog: BorrowedFd<'a>,
        target: BorrowedFd<'a>,
        attach_type: AttachType,
    },
    /// Run the program against `data_in` without attaching it.
    ProgTestRun {
        prog: BorrowedFd<'a>,
        repeat: u32,
        data_in: &'a [u8],
        data_out: &'a mut [u8],
        out: &'a mut TestRunOut,
    },
}

/// Dispatch one command to the kernel.
///
/// Returns the raw non-negative syscall result: a fresh descriptor for
/// the handle-returning commands, zero otherwise.
///
/// # Safety
///
/// For `MapLookup`, `MapUpdate`, `MapDelete` and `MapNextKey` the key
/// and value slices must be at least the corresponding sizes declared
/// at map creation: the kernel transfers the declared sizes through the
/// raw pointers, not the slice lengths. For `ProgTestRun` the output
/// buffer capacity is handed to the kernel, but kernels predating the
/// size-hint check may write the full output regardless, so the buffer
/// should be sized for the largest output the program can produce.
pub unsafe fn bpf(cmd: Cmd<'_>) -> io::Result<c_int> {
    match cmd {
        Cmd::MapCreate {
            map_type,
            name,
            key_size,
            value_size,
            max_entries,
            flags,
            numa_node,
            inner_map,
        } => {
            trace!(
                "map_create type={map_type:?} key_size={key_size} value_size={value_size} \
                 max_entries={max_entries}"
            );
            let mut attr = MapCreateAttr::zeroed();
            attr.map_type = map_type as u32;
            attr.key_size = key_size;
            attr.value_size = value_size;
            attr.max_entries = max_entries;
            attr.map_flags = flags.bits();
            if let Some(name) = name {
                write_name(&mut attr.map_name, name);
            }
            if let Some(node) = numa_node {
                attr.numa_node = node;
                attr.map_flags |= MapFlags::NUMA_NODE.bits();
            }
            if let Some(inner) = inner_map {
                attr.inner_map_fd = inner.as_raw_fd() as u32;
            }
            // SAFETY: attr is a live, zero-padded record of the matching
            // size; no user pointers are embedded.
            unsafe { sys_bpf(BPF_MAP_CREATE, (&raw const attr).cast(), size_of::<MapCreateAttr>()) }
        }

        Cmd::MapLookup { map, key, value } => {
            let mut attr = MapElemAttr::zeroed();
            attr.map_fd = map.as_raw_fd() as u32;
            attr.key = key.as_ptr() as u64;
            attr.value = value.as_mut_ptr() as u64;
            // SAFETY: caller guarantees the buffers cover the declared
            // key and value sizes.
            unsafe { sys_bpf(BPF_MAP_LOOKUP_ELEM, (&raw const attr).cast(), size_of::<MapElemAttr>()) }
        }

        Cmd::MapUpdate {
            map,
            key,
            value,
            flags,
        } => {
            let mut attr = MapElemAttr::zeroed();
            attr.map_fd = map.as_raw_fd() as u32;
            attr.key = key.as_ptr() as u64;
            attr.value = value.as_ptr() as u64;
            attr.flags = flags;
            // SAFETY: caller guarantees the buffers cover the declared
            // key and value sizes.
            unsafe { sys_bpf(BPF_MAP_UPDATE_ELEM, (&raw const attr).cast(), size_of::<MapElemAttr>()) }
        }

        Cmd::MapDelete { map, key } => {
            let mut attr = MapElemAttr::zeroed();
            attr.map_fd = map.as_raw_fd() as u32;
            attr.key = key.as_ptr() as u64;
            // SAFETY: caller guarantees the key buffer covers the
            // declared key size.
            unsafe { sys_bpf(BPF_MAP_DELETE_ELEM, (&raw const attr).cast(), size_of::<MapElemAttr>()) }
        }

        Cmd::MapNextKey { map, key, next_key } => {
            let mut attr = MapElemAttr::zeroed();
            attr.map_fd = map.as_raw_fd() as u32;
            // Null key starts iteration from the first key.
            attr.key = key.map_or(0, |k| k.as_ptr() as u64);
            attr.value = next_key.as_mut_ptr() as u64;
            // SAFETY: caller guarantees both key buffers cover the
            // declared key size.
            unsafe { sys_bpf(BPF_MAP_GET_NEXT_KEY, (&raw const attr).cast(), size_of::<MapElemAttr>()) }
        }

        Cmd::ProgLoad {
            prog_type,
            name,
            insns,
            license,
            kern_version,
            log,
        } => {
            trace!(
                "prog_load type={prog_type:?} insns={} log_capacity={}",
                insns.len(),
                log.len()
            );
            let mut attr = ProgLoadAttr::zeroed();
            attr.prog_type = prog_type as u32;
            attr.insn_cnt = insns.len() as u32;
            attr.insns = insns.as_ptr() as u64;
            attr.license = license.as_ptr() as u64;
            attr.kern_version = kern_version;
            if let Some(name) = name {
                write_name(&mut attr.prog_name, name);
            }
            if !log.is_empty() {
                log[0] = 0;
                attr.log_level = 1;
                attr.log_size = log.len() as u32;
                attr.log_buf = log.as_mut_ptr() as u64;
            }
            // SAFETY: instruction, license and log pointers all come
            // from live slices whose lengths ride in the record.
            unsafe { sys_bpf(BPF_PROG_LOAD, (&raw const attr).cast(), size_of::<ProgLoadAttr>()) }
        }

        Cmd::ObjPin { fd, path } => {
            trace!("obj_pin path={path:?}");
            let mut attr = ObjAttr::zeroed();
            attr.pathname = path.as_ptr() as u64;
            attr.bpf_fd = fd.as_raw_fd() as u32;
            // SAFETY: the pathname is a live NUL-terminated string.
            unsafe { sys_bpf(BPF_OBJ_PIN, (&raw const attr).cast(), size_of::<ObjAttr>()) }
        }

        Cmd::ObjGet { path } => {
            trace!("obj_get path={path:?}");
            let mut attr = ObjAttr::zeroed();
            attr.pathname = path.as_ptr() as u64;
            // SAFETY: the pathname is a live NUL-terminated string.
            unsafe { sys_bpf(BPF_OBJ_GET, (&raw const attr).cast(), size_of::<ObjAttr>()) }
        }

        Cmd::ProgAttach {
            prog,
            target,
            attach_type,
            flags,
        } => {
            trace!("prog_attach type={attach_type:?} flags={flags:?}");
            let mut attr = ProgAttachAttr::zeroed();
            attr.target_fd = target.as_raw_fd() as u32;
            attr.attach_bpf_fd = prog.as_raw_fd() as u32;
            attr.attach_type = attach_type as u32;
            attr.attach_flags = flags.bits();
            // SAFETY: only descriptors and tags, no user pointers.
            unsafe { sys_bpf(BPF_PROG_ATTACH, (&raw const attr).cast(), size_of::<ProgAttachAttr>()) }
        }

        Cmd::ProgDetach {
            target,
            attach_type,
        } => {
            trace!("prog_detach type={attach_type:?}");
            let mut attr = ProgAttachAttr::zeroed();
            attr.target_fd = target.as_raw_fd() as u32;
            attr.attach_type = attach_type as u32;
            // SAFETY: only descriptors and tags, no user pointers.
            unsafe { sys_bpf(BPF_PROG_DETACH, (&raw const attr).cast(), size_of::<ProgAttachAttr>()) }
        }

        Cmd::ProgDetachProg {
            prog,
            target,
            attach_type,
        } => {
            trace!("prog_detach2 type={attach_type:?}");
            let mut attr = ProgAttachAttr::zeroed();
            attr.target_fd = target.as_raw_fd() as u32;
            attr.attach_bpf_fd = prog.as_raw_fd() as u32;
            attr.attach_type = attach_type as u32;
            // SAFETY: only descriptors and tags, no user pointers.
            unsafe { sys_bpf(BPF_PROG_DETACH, (&raw const attr).cast(), size_of::<ProgAttachAttr>()) }
        }

        Cmd::ProgTestRun {
            prog,
            repeat,
            data_in,
            data_out,
            out,
        } => {
            trace!("prog_test_run repeat={repeat} data_in={}", data_in.len());
            let mut attr = TestRunAttr::zeroed();
            attr.prog_fd = prog.as_raw_fd() as u32;
            attr.repeat = repeat;
            attr.data_size_in = data_in.len() as u32;
            attr.data_in = data_in.as_ptr() as u64;
            attr.data_size_out = data_out.len() as u32;
            attr.data_out = data_out.as_mut_ptr() as u64;
            // SAFETY: caller guarantees the output buffer is large
            // enough for the program's output.
            let ret = unsafe {
                sys_bpf(BPF_PROG_TEST_RUN, (&raw const attr).cast(), size_of::<TestRunAttr>())
            }?;
            out.retval = attr.retval;
            out.data_len = attr.data_size_out;
            out.duration_ns = attr.duration;
            Ok(ret)
        }
    }
}

/// One raw call into the multiplexed entry point.
///
/// # Safety
///
/// `attr` must point to a live attribute record of `size` bytes whose
/// embedded pointers, if any, satisfy the command's contract.
unsafe fn sys_bpf(cmd: u32, attr: *const c_void, size: usize) -> io::Result<c_int> {
    // SAFETY: upheld by the caller.
    let ret = unsafe { libc::syscall(NR_BPF, cmd as c_long, attr, size) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as c_int)
    }
}

/// Copy a name into its fixed attribute field, truncating to the ABI
/// limit and leaving the NUL terminator in place.
fn write_name(dst: &mut [u8; OBJ_NAME_LEN], name: &str) {
    let bytes = name.as_bytes();
    let n = bytes.len().min(OBJ_NAME_LEN - 1);
    dst[..n].copy_from_slice(&bytes[..n]);
}

/// Wrap a fresh descriptor returned by a handle-producing command.
fn owned_fd(raw: c_int) -> OwnedFd {
    // SAFETY: the kernel just returned this descriptor to us and nothing
    // else owns it.
    unsafe { OwnedFd::from_raw_fd(raw) }
}

// ---- Per-command façades ----

/// Create a map.
pub fn map_create(
    map_type: MapType,
    key_size: u32,
    value_size: u32,
    max_entries: u32,
    flags: MapFlags,
) -> io::Result<OwnedFd> {
    map_create_node(map_type, None, key_size, value_size, max_entries, flags, None)
}

/// Create a named map.
pub fn map_create_named(
    map_type: MapType,
    name: &str,
    key_size: u32,
    value_size: u32,
    max_entries: u32,
    flags: MapFlags,
) -> io::Result<OwnedFd> {
    map_create_node(
        map_type,
        Some(name),
        key_size,
        value_size,
        max_entries,
        flags,
        None,
    )
}

/// Create a map with an explicit NUMA node affinity.
pub fn map_create_node(
    map_type: MapType,
    name: Option<&str>,
    key_size: u32,
    value_size: u32,
    max_entries: u32,
    flags: MapFlags,
    numa_node: Option<u32>,
) -> io::Result<OwnedFd> {
    // SAFETY: no caller buffers involved in map creation.
    let fd = unsafe {
        bpf(Cmd::MapCreate {
            map_type,
            name,
            key_size,
            value_size,
            max_entries,
            flags,
            numa_node,
            inner_map: None,
        })
    }?;
    Ok(owned_fd(fd))
}

/// Create a nested-map outer map; values are handles to maps shaped
/// like `inner_map`.
pub fn map_create_in_map(
    map_type: MapType,
    name: Option<&str>,
    key_size: u32,
    inner_map: BorrowedFd<'_>,
    max_entries: u32,
    flags: MapFlags,
) -> io::Result<OwnedFd> {
    map_create_in_map_node(map_type, name, key_size, inner_map, max_entries, flags, None)
}

/// Nested-map creation with an explicit NUMA node affinity.
pub fn map_create_in_map_node(
    map_type: MapType,
    name: Option<&str>,
    key_size: u32,
    inner_map: BorrowedFd<'_>,
    max_entries: u32,
    flags: MapFlags,
    numa_node: Option<u32>,
) -> io::Result<OwnedFd> {
    // The value of a nested-map entry is always a 4-byte map handle.
    // SAFETY: no caller buffers involved in map creation.
    let fd = unsafe {
        bpf(Cmd::MapCreate {
            map_type,
            name,
            key_size,
            value_size: 4,
            max_entries,
            flags,
            numa_node,
            inner_map: Some(inner_map),
        })
    }?;
    Ok(owned_fd(fd))
}

/// Look up the value stored under `key`.
///
/// A miss surfaces as the kernel's not-found error.
///
/// # Safety
///
/// `key` and `value` must be at least the map's declared key and value
/// sizes; the kernel transfers the declared sizes through the pointers.
pub unsafe fn map_lookup_elem(
    map: BorrowedFd<'_>,
    key: &[u8],
    value: &mut [u8],
) -> io::Result<()> {
    // SAFETY: upheld by the caller.
    unsafe { bpf(Cmd::MapLookup { map, key, value }) }.map(drop)
}

/// Insert or overwrite an element.
///
/// # Safety
///
/// `key` and `value` must be at least the map's declared key and value
/// sizes.
pub unsafe fn map_update_elem(
    map: BorrowedFd<'_>,
    key: &[u8],
    value: &[u8],
    flags: u64,
) -> io::Result<()> {
    // SAFETY: upheld by the caller.
    unsafe {
        bpf(Cmd::MapUpdate {
            map,
            key,
            value,
            flags,
        })
    }
    .map(drop)
}

/// Remove an element.
///
/// # Safety
///
/// `key` must be at least the map's declared key size.
pub unsafe fn map_delete_elem(map: BorrowedFd<'_>, key: &[u8]) -> io::Result<()> {
    // SAFETY: upheld by the caller.
    unsafe { bpf(Cmd::MapDelete { map, key }) }.map(drop)
}

/// Fetch the key after `key`, or the first key when `key` is `None`.
///
/// End of iteration surfaces as the kernel's not-found error.
///
/// # Safety
///
/// Both key buffers must be at least the map's declared key size.
pub unsafe fn map_get_next_key(
    map: BorrowedFd<'_>,
    key: Option<&[u8]>,
    next_key: &mut [u8],
) -> io::Result<()> {
    // SAFETY: upheld by the caller.
    unsafe { bpf(Cmd::MapNextKey { map, key, next_key }) }.map(drop)
}

/// Load a program. On verifier rejection the kernel fills `log` with
/// its diagnostic text, up to the buffer length.
pub fn prog_load(
    prog_type: ProgType,
    insns: &[Insn],
    license: &CStr,
    kern_version: u32,
    log: &mut [u8],
) -> io::Result<OwnedFd> {
    prog_load_named(prog_type, None, insns, license, kern_version, log)
}

/// Load a named program.
pub fn prog_load_named(
    prog_type: ProgType,
    name: Option<&str>,
    insns: &[Insn],
    license: &CStr,
    kern_version: u32,
    log: &mut [u8],
) -> io::Result<OwnedFd> {
    // SAFETY: slice lengths accompany every pointer in the record.
    let fd = unsafe {
        bpf(Cmd::ProgLoad {
            prog_type,
            name,
            insns,
            license,
            kern_version,
            log,
        })
    }?;
    Ok(owned_fd(fd))
}

/// Persist an object handle at a path in the bpf filesystem.
pub fn obj_pin(fd: BorrowedFd<'_>, path: &CStr) -> io::Result<()> {
    // SAFETY: the path outlives the call.
    unsafe { bpf(Cmd::ObjPin { fd, path }) }.map(drop)
}

/// Reopen a pinned object.
pub fn obj_get(path: &CStr) -> io::Result<OwnedFd> {
    // SAFETY: the path outlives the call.
    let fd = unsafe { bpf(Cmd::ObjGet { path }) }?;
    Ok(owned_fd(fd))
}

/// Attach a program to a target hook.
pub fn prog_attach(
    prog: BorrowedFd<'_>,
    target: BorrowedFd<'_>,
    attach_type: AttachType,
    flags: AttachFlags,
) -> io::Result<()> {
    // SAFETY: only descriptors and tags.
    unsafe {
        bpf(Cmd::ProgAttach {
            prog,
            target,
            attach_type,
            flags,
        })
    }
    .map(drop)
}

/// Detach whatever program is attached to `(target, attach_type)`.
pub fn prog_detach(target: BorrowedFd<'_>, attach_type: AttachType) -> io::Result<()> {
    // SAFETY: only descriptors and tags.
    unsafe {
        bpf(Cmd::ProgDetach {
            target,
            attach_type,
        })
    }
    .map(drop)
}

/// Detach a specific program. Fails when the hook is held by a
/// different program, leaving that attachment in place.
pub fn prog_detach2(
    prog: BorrowedFd<'_>,
    target: BorrowedFd<'_>,
    attach_type: AttachType,
) -> io::Result<()> {
    // SAFETY: only descriptors and tags.
    unsafe {
        bpf(Cmd::ProgDetachProg {
            prog,
            target,
            attach_type,
        })
    }
    .map(drop)
}

/// Run a loaded program against `data_in` without attaching it.
///
/// # Safety
///
/// `data_out` must be large enough for the program's output; kernels
/// predating the size-hint check ignore the capacity handed to them.
pub unsafe fn prog_test_run(
    prog: BorrowedFd<'_>,
    repeat: u32,
    data_in: &[u8],
    data_out: &mut [u8],
) -> io::Result<TestRunOut> {
    let mut out = TestRunOut::default();
    // SAFETY: upheld by the caller.
    unsafe {
        bpf(Cmd::ProgTestRun {
            prog,
            repeat,
            data_in,
            data_out,
            out: &mut out,
        })
    }?;
    Ok(out)
}
