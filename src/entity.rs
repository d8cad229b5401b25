/// Generational entity identifier.
///
/// The low 32 bits hold the slot index, the high 32 bits the version. A slot
/// that gets reused hands out a new version, so ids held across a destroy are
/// detected as stale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    const INDEX_BITS: u32 = 32;
    const INDEX_MASK: u64 = (1u64 << Self::INDEX_BITS) - 1;

    /// Index value no live id ever carries.
    pub const NONE_INDEX: u32 = u32::MAX;
    /// Version reserved for "no id" and for tombstones.
    pub const NONE_VERSION: u32 = u32::MAX;
    /// The "no id" sentinel: every bit set.
    pub const NONE: Entity = Entity(u64::MAX);

    #[inline(always)]
    pub const fn new(index: u32, version: u32) -> Self {
        Entity(((version as u64) << Self::INDEX_BITS) | index as u64)
    }

    /// Id written into a freed in-place pool slot. It keeps the old index for
    /// debugging but can never compare equal to a live id.
    #[inline(always)]
    pub const fn tombstone(index: u32) -> Self {
        Self::new(index, Self::NONE_VERSION)
    }

    #[inline(always)]
    pub const fn index(self) -> u32 {
        (self.0 & Self::INDEX_MASK) as u32
    }

    #[inline(always)]
    pub const fn version(self) -> u32 {
        (self.0 >> Self::INDEX_BITS) as u32
    }

    /// Structural check on the version field only; says nothing about
    /// whether a registry still considers the id alive.
    #[inline(always)]
    pub const fn is_none(self) -> bool {
        self.version() == Self::NONE_VERSION
    }

    #[inline(always)]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub const fn from_bits(bits: u64) -> Self {
        Entity(bits)
    }

    /// Version following `version`, skipping the reserved sentinel.
    #[inline(always)]
    pub const fn next_version(version: u32) -> u32 {
        let next = version.wrapping_add(1);
        if next == Self::NONE_VERSION { 0 } else { next }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NONE
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Self::NONE {
            return f.write_str("Entity(none)");
        }
        write!(
            f,
            "Entity(index = {}, version = {})",
            self.index(),
            self.version()
        )
    }
}
