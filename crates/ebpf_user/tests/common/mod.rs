//! Shared helpers for kernel-facing tests.
//!
//! These tests need a kernel that lets this process create bpf objects
//! (root, CAP_BPF, or unprivileged bpf enabled). Environments without
//! that are common in CI, so every test probes first and skips with a
//! note instead of failing.

// Not every test binary uses every helper.
#![allow(dead_code)]

use ebpf_user::{Map, MapConfig, MapType};

/// Whether this process may create bpf objects at all.
pub fn bpf_available() -> bool {
    match Map::create(&MapConfig::new(MapType::Hash, 4, 4, 1)) {
        Ok(_) => true,
        Err(err) => {
            eprintln!("skipping: cannot create bpf objects here ({err})");
            false
        }
    }
}

/// Whether the bpf filesystem is mounted at its usual place.
pub fn bpffs_available() -> bool {
    let ok = std::path::Path::new("/sys/fs/bpf").is_dir();
    if !ok {
        eprintln!("skipping: /sys/fs/bpf is not mounted");
    }
    ok
}

/// A per-process unique object name for pins and cgroups.
pub fn scratch_name(tag: &str) -> String {
    format!("ebpf_user_{tag}_{}", std::process::id())
}
