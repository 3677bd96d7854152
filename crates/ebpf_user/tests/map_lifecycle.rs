//! Map lifecycle against a live kernel.

mod common;

use std::collections::BTreeSet;

use ebpf_user::{Error, Map, MapConfig, MapType, UpdateFlags};

fn u32_key(k: u32) -> [u8; 4] {
    k.to_ne_bytes()
}

fn u64_value(v: u64) -> [u8; 8] {
    v.to_ne_bytes()
}

#[test]
fn update_lookup_delete_cycle() {
    if !common::bpf_available() {
        return;
    }
    let map = Map::create(&MapConfig::new(MapType::Hash, 4, 8, 10)).unwrap();

    map.update(&u32_key(1), &u64_value(42), UpdateFlags::Any)
        .unwrap();
    let value = map.lookup(&u32_key(1)).unwrap().expect("key 1 present");
    assert_eq!(value, u64_value(42));

    map.delete(&u32_key(1)).unwrap();
    assert_eq!(map.lookup(&u32_key(1)).unwrap(), None);

    // Deleting an absent key surfaces the kernel error, unlike lookup.
    let err = map.delete(&u32_key(1)).unwrap_err();
    assert_eq!(err.os_error(), Some(libc::ENOENT));
}

#[test]
fn update_flags_are_honored() {
    if !common::bpf_available() {
        return;
    }
    let map = Map::create(&MapConfig::new(MapType::Hash, 4, 8, 4)).unwrap();

    map.update(&u32_key(7), &u64_value(1), UpdateFlags::NoExist)
        .unwrap();
    let err = map
        .update(&u32_key(7), &u64_value(2), UpdateFlags::NoExist)
        .unwrap_err();
    assert_eq!(err.os_error(), Some(libc::EEXIST));

    let err = map
        .update(&u32_key(8), &u64_value(3), UpdateFlags::Exist)
        .unwrap_err();
    assert_eq!(err.os_error(), Some(libc::ENOENT));
}

#[test]
fn iteration_visits_every_key_once() {
    if !common::bpf_available() {
        return;
    }
    let map = Map::create(&MapConfig::new(MapType::Hash, 4, 8, 10)).unwrap();
    for k in [1u32, 2, 3] {
        map.update(&u32_key(k), &u64_value(u64::from(k)), UpdateFlags::Any)
            .unwrap();
    }

    let keys: BTreeSet<u32> = map
        .keys()
        .map(|k| u32::from_ne_bytes(k.unwrap().try_into().unwrap()))
        .collect();
    assert_eq!(keys, BTreeSet::from([1, 2, 3]));

    // The protocol signals the end explicitly once the set is exhausted.
    let mut cursor = None;
    let mut steps = 0;
    loop {
        match map.next_key(cursor.as_deref()).unwrap() {
            Some(next) => {
                cursor = Some(next);
                steps += 1;
                assert!(steps <= 3, "iteration failed to terminate");
            }
            None => break,
        }
    }
    assert_eq!(steps, 3);
}

#[test]
fn empty_map_iterates_to_nothing() {
    if !common::bpf_available() {
        return;
    }
    let map = Map::create(&MapConfig::new(MapType::Hash, 4, 8, 10)).unwrap();
    assert_eq!(map.next_key(None).unwrap(), None);
    assert_eq!(map.keys().count(), 0);
}

#[test]
fn short_buffers_never_reach_the_kernel() {
    if !common::bpf_available() {
        return;
    }
    let map = Map::create(&MapConfig::new(MapType::Hash, 4, 8, 4)).unwrap();

    let err = map
        .update(&[0u8; 2], &u64_value(0), UpdateFlags::Any)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::BufferSize {
            declared: 4,
            got: 2
        }
    ));

    let err = map.lookup(&[0u8; 7]).unwrap_err();
    assert!(matches!(
        err,
        Error::BufferSize {
            declared: 4,
            got: 7
        }
    ));
}

#[test]
fn named_array_map() {
    if !common::bpf_available() {
        return;
    }
    let map = Map::create(
        &MapConfig::new(MapType::Array, 4, 8, 4).name("lb_stats"),
    )
    .unwrap();
    // Array entries exist from creation; slot 0 starts zeroed.
    let value = map.lookup(&u32_key(0)).unwrap().expect("slot 0 exists");
    assert_eq!(value, u64_value(0));
}

#[test]
fn nested_map_create() {
    if !common::bpf_available() {
        return;
    }
    let inner = Map::create(&MapConfig::new(MapType::Array, 4, 8, 4)).unwrap();
    let outer = match Map::create_in_map(
        &MapConfig::new(MapType::ArrayOfMaps, 4, 4, 2),
        &inner,
    ) {
        Ok(outer) => outer,
        Err(err) => {
            eprintln!("skipping: nested maps unavailable ({err})");
            return;
        }
    };
    assert_eq!(outer.value_size(), 4);
}

#[test]
fn pinned_map_survives_the_handle() {
    if !common::bpf_available() || !common::bpffs_available() {
        return;
    }
    let path = format!("/sys/fs/bpf/{}", common::scratch_name("map"));

    let map = Map::create(&MapConfig::new(MapType::Hash, 4, 8, 4)).unwrap();
    map.update(&u32_key(9), &u64_value(99), UpdateFlags::Any)
        .unwrap();
    if let Err(err) = map.pin(&path) {
        eprintln!("skipping: cannot pin here ({err})");
        return;
    }
    drop(map);

    let reopened = Map::open_pinned(&path, 4, 8).unwrap();
    let value = reopened.lookup(&u32_key(9)).unwrap().expect("pin kept it");
    assert_eq!(value, u64_value(99));

    std::fs::remove_file(&path).unwrap();
}
