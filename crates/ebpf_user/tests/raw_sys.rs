//! The raw per-command façades, driven without the lifecycle types.

mod common;

use std::os::fd::AsFd;

use ebpf_user::MapFlags;
use ebpf_user::map::MapType;
use ebpf_user::sys;

#[test]
fn element_commands_through_the_raw_facades() {
    if !common::bpf_available() {
        return;
    }
    let fd = sys::map_create(MapType::Hash, 4, 8, 8, MapFlags::empty()).unwrap();

    let key = 5u32.to_ne_bytes();
    let value = 77u64.to_ne_bytes();
    // SAFETY: buffers match the sizes declared three lines up.
    unsafe {
        sys::map_update_elem(fd.as_fd(), &key, &value, 0).unwrap();

        let mut read_back = [0u8; 8];
        sys::map_lookup_elem(fd.as_fd(), &key, &mut read_back).unwrap();
        assert_eq!(read_back, value);

        let mut first = [0u8; 4];
        sys::map_get_next_key(fd.as_fd(), None, &mut first).unwrap();
        assert_eq!(first, key);

        sys::map_delete_elem(fd.as_fd(), &key).unwrap();
        let err = sys::map_lookup_elem(fd.as_fd(), &key, &mut read_back).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}

#[test]
fn named_create_facade() {
    if !common::bpf_available() {
        return;
    }
    // Older kernels reject names entirely; either way the call must not
    // mangle the request.
    match sys::map_create_named(MapType::Array, "raw_named", 4, 4, 1, MapFlags::empty()) {
        Ok(fd) => drop(fd),
        Err(err) => {
            eprintln!("skipping: named maps unavailable here ({err})");
        }
    }
}
