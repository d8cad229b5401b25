use crate::component::Component;
use std::sync::atomic::{AtomicU32, Ordering};

/// Process-wide key of a component (or static) type.
///
/// Keys are handed out in first-use order and never change while the
/// process runs; pool and static tables are sorted by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeKey(u32);

impl TypeKey {
    /// Initial value of a per-type key slot before assignment.
    pub const UNASSIGNED: u32 = u32::MAX;

    #[inline(always)]
    pub const fn get(self) -> u32 {
        self.0
    }
}

pub struct Ecs;

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

impl Ecs {
    /// Assigns `T` its key now instead of on first use, so that types
    /// registered at startup get keys in registration order.
    pub fn register<T: Component>() -> TypeKey {
        T::id()
    }

    /// Reads a per-type key slot, binding it to the next free key the first
    /// time. Called by `#[derive(Component)]`.
    #[inline]
    pub fn resolve(slot: &AtomicU32) -> TypeKey {
        let current = slot.load(Ordering::Acquire);
        if current != TypeKey::UNASSIGNED {
            return TypeKey(current);
        }
        Self::assign(slot)
    }

    #[cold]
    fn assign(slot: &AtomicU32) -> TypeKey {
        let candidate = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        assert!(candidate != TypeKey::UNASSIGNED, "component key space exhausted");
        // Another thread may have won the race; its key is the one that sticks
        // and `candidate` is simply skipped.
        match slot.compare_exchange(
            TypeKey::UNASSIGNED,
            candidate,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => TypeKey(candidate),
            Err(existing) => TypeKey(existing),
        }
    }
}
