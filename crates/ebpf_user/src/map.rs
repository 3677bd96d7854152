//! Map lifecycle.
//!
//! A map is created once from an immutable [`MapConfig`], lives in the
//! kernel, and is referenced afterward only through its handle. [`Map`]
//! owns that handle and releases it on drop; it is deliberately not
//! cloneable, so a closed handle cannot be reused.
//!
//! Element operations validate caller buffers against the sizes
//! declared at creation before any pointer reaches the kernel - the
//! kernel transfers the declared sizes unconditionally, so a short
//! buffer would otherwise be an out-of-bounds access in this process.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;

use ebpf_abi::{BPF_ANY, BPF_EXIST, BPF_NOEXIST, MapFlags};

use crate::error::{Error, Result};
use crate::{obj, sys};

/// Kernel map type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum MapType {
    /// Unspecified
    #[default]
    Unspec = 0,
    /// Hash table
    Hash = 1,
    /// Array
    Array = 2,
    /// Array of program handles for tail calls
    ProgArray = 3,
    /// Perf event ring array
    PerfEventArray = 4,
    /// Per-CPU hash table
    PercpuHash = 5,
    /// Per-CPU array
    PercpuArray = 6,
    /// Stack trace storage
    StackTrace = 7,
    /// Array of cgroup handles
    CgroupArray = 8,
    /// Hash table with LRU eviction
    LruHash = 9,
    /// Per-CPU LRU hash table
    LruPercpuHash = 10,
    /// Longest-prefix-match trie
    LpmTrie = 11,
    /// Array whose values are other maps
    ArrayOfMaps = 12,
    /// Hash table whose values are other maps
    HashOfMaps = 13,
    /// Device redirect array
    DevMap = 14,
    /// Socket redirect array
    SockMap = 15,
    /// CPU redirect array
    CpuMap = 16,
}

/// Element update dispositions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateFlags {
    /// Create the element or overwrite an existing one.
    #[default]
    Any,
    /// Create only; fail if the key already exists.
    NoExist,
    /// Overwrite only; fail if the key is absent.
    Exist,
}

impl UpdateFlags {
    fn bits(self) -> u64 {
        match self {
            Self::Any => BPF_ANY,
            Self::NoExist => BPF_NOEXIST,
            Self::Exist => BPF_EXIST,
        }
    }
}

/// Immutable description of a map, consumed by [`Map::create`].
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    /// Kernel map type.
    pub map_type: MapType,
    /// Optional name, truncated to the ABI limit.
    pub name: Option<String>,
    /// Key size in bytes.
    pub key_size: u32,
    /// Value size in bytes. Forced to 4 for nested-map types, whose
    /// values are inner-map handles.
    pub value_size: u32,
    /// Maximum number of entries.
    pub max_entries: u32,
    /// Creation flags.
    pub flags: MapFlags,
    /// NUMA node to allocate on.
    pub numa_node: Option<u32>,
}

impl MapConfig {
    /// Describe a map of the given shape.
    pub fn new(map_type: MapType, key_size: u32, value_size: u32, max_entries: u32) -> Self {
        Self {
            map_type,
            key_size,
            value_size,
            max_entries,
            ..Self::default()
        }
    }

    /// Set the map name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set creation flags.
    #[must_use]
    pub fn flags(mut self, flags: MapFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Pin allocation to a NUMA node.
    #[must_use]
    pub fn numa_node(mut self, node: u32) -> Self {
        self.numa_node = Some(node);
        self
    }
}

/// A kernel-resident key/value table, held by its handle.
#[derive(Debug)]
pub struct Map {
    fd: OwnedFd,
    key_size: u32,
    value_size: u32,
}

impl Map {
    /// Create a map. This is the only operation that allocates a
    /// handle; everything else requires one.
    pub fn create(config: &MapConfig) -> Result<Self> {
        let fd = sys::map_create_node(
            config.map_type,
            config.name.as_deref(),
            config.key_size,
            config.value_size,
            config.max_entries,
            config.flags,
            config.numa_node,
        )?;
        Ok(Self {
            fd,
            key_size: config.key_size,
            value_size: config.value_size,
        })
    }

    /// Create an outer map whose entries are handles to maps shaped
    /// like `inner`.
    pub fn create_in_map(config: &MapConfig, inner: &Map) -> Result<Self> {
        let fd = sys::map_create_in_map_node(
            config.map_type,
            config.name.as_deref(),
            config.key_size,
            inner.as_fd(),
            config.max_entries,
            config.flags,
            config.numa_node,
        )?;
        Ok(Self {
            fd,
            key_size: config.key_size,
            value_size: 4,
        })
    }

    /// Reopen a pinned map.
    ///
    /// The pin records no shape, so the declared key and value sizes
    /// must be restated; they gate buffer validation exactly as on a
    /// freshly created map.
    pub fn open_pinned(path: impl AsRef<Path>, key_size: u32, value_size: u32) -> Result<Self> {
        let fd = obj::get(path)?;
        Ok(Self {
            fd,
            key_size,
            value_size,
        })
    }

    /// Declared key size in bytes.
    pub fn key_size(&self) -> u32 {
        self.key_size
    }

    /// Declared value size in bytes.
    pub fn value_size(&self) -> u32 {
        self.value_size
    }

    /// Insert or overwrite an element.
    pub fn update(&self, key: &[u8], value: &[u8], flags: UpdateFlags) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;
        // SAFETY: lengths were checked against the declared sizes.
        unsafe { sys::map_update_elem(self.fd.as_fd(), key, value, flags.bits()) }?;
        Ok(())
    }

    /// Read the value stored under `key`.
    ///
    /// A miss is an expected outcome, not an error.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_key(key)?;
        let mut value = vec![0u8; self.value_size as usize];
        // SAFETY: lengths were checked against the declared sizes.
        match unsafe { sys::map_lookup_elem(self.fd.as_fd(), key, &mut value) } {
            Ok(()) => Ok(Some(value)),
            Err(err) if err.raw_os_error() == Some(libc::ENOENT) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove the element under `key`.
    ///
    /// Unlike [`lookup`](Self::lookup), deleting an absent key surfaces
    /// the kernel's not-found error unchanged.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        // SAFETY: length was checked against the declared key size.
        unsafe { sys::map_delete_elem(self.fd.as_fd(), key) }?;
        Ok(())
    }

    /// The key following `key` in the kernel's iteration order, or the
    /// first key when `key` is `None`. `Ok(None)` signals the end.
    pub fn next_key(&self, key: Option<&[u8]>) -> Result<Option<Vec<u8>>> {
        if let Some(key) = key {
            self.check_key(key)?;
        }
        let mut next = vec![0u8; self.key_size as usize];
        // SAFETY: lengths were checked against the declared key size.
        match unsafe { sys::map_get_next_key(self.fd.as_fd(), key, &mut next) } {
            Ok(()) => Ok(Some(next)),
            Err(err) if err.raw_os_error() == Some(libc::ENOENT) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Iterate over all keys.
    ///
    /// The order is kernel-defined. Concurrent writers may cause keys
    /// to be skipped or repeated; the enumeration is only consistent
    /// for a quiescent map.
    pub fn keys(&self) -> Keys<'_> {
        Keys {
            map: self,
            prev: None,
            done: false,
        }
    }

    /// Persist the handle at `path` so the map outlives this process.
    pub fn pin(&self, path: impl AsRef<Path>) -> Result<()> {
        obj::pin(self.fd.as_fd(), path)
    }

    /// Borrow the underlying handle.
    pub fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    /// Take ownership of the handle, giving up the lifecycle guard.
    pub fn into_fd(self) -> OwnedFd {
        self.fd
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.key_size as usize {
            return Err(Error::BufferSize {
                declared: self.key_size as usize,
                got: key.len(),
            });
        }
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<()> {
        if value.len() != self.value_size as usize {
            return Err(Error::BufferSize {
                declared: self.value_size as usize,
                got: value.len(),
            });
        }
        Ok(())
    }
}

impl AsFd for Map {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Key iterator driven by the next-key protocol.
pub struct Keys<'a> {
    map: &'a Map,
    prev: Option<Vec<u8>>,
    done: bool,
}

impl Iterator for Keys<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.map.next_key(self.prev.as_deref()) {
            Ok(Some(key)) => {
                self.prev = Some(key.clone());
                Some(Ok(key))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = MapConfig::new(MapType::Hash, 4, 8, 128);
        assert_eq!(config.map_type, MapType::Hash);
        assert_eq!(config.flags, MapFlags::empty());
        assert!(config.name.is_none());
        assert!(config.numa_node.is_none());
    }

    #[test]
    fn config_builders_compose() {
        let config = MapConfig::new(MapType::Array, 4, 4, 1)
            .name("counters")
            .flags(MapFlags::NO_PREALLOC)
            .numa_node(0);
        assert_eq!(config.name.as_deref(), Some("counters"));
        assert!(config.flags.contains(MapFlags::NO_PREALLOC));
        assert_eq!(config.numa_node, Some(0));
    }

    #[test]
    fn update_flag_values() {
        assert_eq!(UpdateFlags::Any.bits(), 0);
        assert_eq!(UpdateFlags::NoExist.bits(), 1);
        assert_eq!(UpdateFlags::Exist.bits(), 2);
    }
}
