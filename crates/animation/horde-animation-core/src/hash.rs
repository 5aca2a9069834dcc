//! Content hashing and string hashes.
//!
//! Every definition carries a 32-bit structural hash computed by folding its
//! arrays, in order, through `xxh32` with the running value as seed. Instance
//! hashes cross-reference a definition with a skeleton via [`mix`].
//!
//! These hashes are deduplication keys, not identities: two different
//! definitions can collide, in which case the second one aliases the data of
//! the first inside the buffer managers. The risk is accepted and not detected.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use bytemuck::{Pod, Zeroable};
use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh32::xxh32;

/// Seed used for every content hash fold.
pub const CONTENT_HASH_SEED: u32 = 0x9E37_79B9;

/// 32-bit hash of a name (bone path, parameter name, event name, ...).
#[repr(transparent)]
#[derive(
    Copy,
    Clone,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Pod,
    Zeroable,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct StringHash(pub u32);

impl StringHash {
    pub const NONE: StringHash = StringHash(0);

    /// Hash a name. The empty string hashes a single NUL byte so that it never
    /// maps to [`StringHash::NONE`] by accident of input length.
    pub fn new(name: &str) -> Self {
        let bytes: &[u8] = if name.is_empty() {
            b"\0"
        } else {
            name.as_bytes()
        };
        let hash = StringHash(xxh32(bytes, 0));
        string_table::record(hash, name);
        hash
    }

    #[inline]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<&str> for StringHash {
    fn from(value: &str) -> Self {
        StringHash::new(value)
    }
}

impl fmt::Display for StringHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match string_table::lookup(*self) {
            Some(name) => f.write_str(&name),
            None => write!(f, "{:08X}", self.0),
        }
    }
}

impl fmt::Debug for StringHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringHash({self})")
    }
}

/// Combine two hashes into one. Order matters.
#[inline]
pub fn mix(a: u32, b: u32) -> u32 {
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&a.to_le_bytes());
    bytes[4..].copy_from_slice(&b.to_le_bytes());
    xxh32(&bytes, 0)
}

/// Key of a definition bound to a particular skeleton.
#[inline]
pub fn instance_hash(content_hash: u32, skeleton_hash: u32) -> u32 {
    mix(content_hash, skeleton_hash)
}

/// Mask instance key. A layer without mask (hash 0) maps to instance 0, the
/// all-bones slot.
#[inline]
pub fn mask_instance_hash(mask_hash: u32, skeleton_hash: u32) -> u32 {
    if mask_hash == 0 {
        0
    } else {
        mix(mask_hash, skeleton_hash)
    }
}

/// Order-sensitive seeded fold over the constituent arrays of a definition.
#[derive(Clone, Copy, Debug)]
pub struct ContentHasher {
    state: u32,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(CONTENT_HASH_SEED)
    }
}

impl ContentHasher {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.state = xxh32(bytes, self.state);
        self
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    #[inline]
    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    #[inline]
    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_bytes(&[value as u8])
    }

    pub fn write_pod<T: Pod>(&mut self, value: &T) -> &mut Self {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Hash a slice, length first, so that `[a] ++ [b]` and `[a, b]` split
    /// across two writes do not collide trivially.
    pub fn write_slice<T: Pod>(&mut self, values: &[T]) -> &mut Self {
        self.write_u32(values.len() as u32);
        self.write_bytes(bytemuck::cast_slice(values))
    }

    #[inline]
    pub fn finish(&self) -> u32 {
        self.state
    }
}

/// Optional process-wide table from string hashes back to their names.
///
/// Disabled by default: nothing is recorded until [`string_table::enable`] is
/// called. Entries are never evicted.
pub mod string_table {
    use super::*;

    static ENABLED: AtomicBool = AtomicBool::new(false);
    static TABLE: Mutex<Option<HashMap<u32, String>>> = parking_lot::const_mutex(None);

    pub fn enable() {
        let mut table = TABLE.lock();
        if table.is_none() {
            *table = Some(HashMap::new());
        }
        ENABLED.store(true, Ordering::Release);
    }

    pub fn disable() {
        ENABLED.store(false, Ordering::Release);
        *TABLE.lock() = None;
    }

    #[inline]
    pub fn is_enabled() -> bool {
        ENABLED.load(Ordering::Acquire)
    }

    pub(crate) fn record(hash: StringHash, name: &str) {
        if !is_enabled() {
            return;
        }
        if let Some(table) = TABLE.lock().as_mut() {
            table.entry(hash.0).or_insert_with(|| name.to_string());
        }
    }

    pub fn lookup(hash: StringHash) -> Option<String> {
        if !is_enabled() {
            return None;
        }
        TABLE.lock().as_ref()?.get(&hash.0).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_hash_is_stable_and_nonzero_for_empty() {
        assert_eq!(StringHash::new("Hips"), StringHash::new("Hips"));
        assert_ne!(StringHash::new("Hips"), StringHash::new("Spine"));
        assert!(!StringHash::new("").is_none());
    }

    #[test]
    fn mix_is_order_sensitive() {
        assert_ne!(mix(1, 2), mix(2, 1));
        assert_eq!(mask_instance_hash(0, 1234), 0);
        assert_eq!(mask_instance_hash(7, 1234), mix(7, 1234));
    }

    #[test]
    fn content_hasher_folds_in_order() {
        let mut a = ContentHasher::default();
        a.write_u32(1).write_u32(2);
        let mut b = ContentHasher::default();
        b.write_u32(2).write_u32(1);
        assert_ne!(a.finish(), b.finish());

        let mut c = ContentHasher::default();
        c.write_slice(&[1.0f32, 2.0]);
        let mut d = ContentHasher::default();
        d.write_slice(&[1.0f32, 2.0]);
        assert_eq!(c.finish(), d.finish());
    }

    #[test]
    fn display_falls_back_to_hex() {
        let h = StringHash::from_raw(0xAB);
        if !string_table::is_enabled() {
            assert_eq!(h.to_string(), "000000AB");
        }
    }
}
