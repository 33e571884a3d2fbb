use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Stable 32-bit identifier of a module type inside a save file.
///
/// Derived from the module's tag with FNV-1a, so it is identical across processes,
/// platforms, compiler versions and serializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleKey(i32);

impl ModuleKey {
    /// Hashes a tag with 32-bit FNV-1a.
    #[must_use]
    pub const fn from_tag(tag: &str) -> Self {
        let bytes = tag.as_bytes();
        let mut hash = FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(hash as i32)
    }

    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for ModuleKey {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0 as u32)
    }
}

/// A unit of application state persisted as one entry of a save file.
///
/// Usually implemented through `#[save_module(tag = "...")]`. The tag must stay stable for
/// the lifetime of the data: renaming the Rust type is harmless, changing the tag orphans
/// every stored entry.
pub trait Module: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable, human-readable identifier of the module type.
    const TAG: &'static str;

    /// Key under which the module is stored.
    const KEY: ModuleKey = ModuleKey::from_tag(Self::TAG);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_reference_vectors() {
        assert_eq!(ModuleKey::from_tag("").get() as u32, 0x811C_9DC5);
        assert_eq!(ModuleKey::from_tag("a").get() as u32, 0xE40C_292C);
        assert_eq!(ModuleKey::from_tag("foobar").get() as u32, 0xBF9C_F968);
    }

    #[test]
    fn keys_are_const_evaluable() {
        const KEY: ModuleKey = ModuleKey::from_tag("player.stats");
        assert_eq!(KEY, ModuleKey::from_tag("player.stats"));
        assert_ne!(KEY, ModuleKey::from_tag("player.inventory"));
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(ModuleKey::from_raw(-1).to_string(), "0xffffffff");
        assert_eq!(ModuleKey::from_raw(255).to_string(), "0x000000ff");
    }
}
