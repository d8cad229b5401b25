use crate::ecs::TypeKey;
use crate::entity::Entity;
use crate::registry::Registry;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a pool reclaims the dense slot of a removed component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeletionPolicy {
    /// Move the last dense entry into the hole. O(1), reorders the pool.
    #[default]
    SwapRemove,
    /// Leave a tombstone and reuse the slot later. O(1), keeps the order of
    /// survivors until [`Pool::compact`](crate::pool::Pool::compact).
    InPlace,
}

/// A type that can be stored in a pool or as a registry static.
///
/// Use `#[derive(Component)]`; add `#[component(in_place)]` to select the
/// in-place deletion policy.
///
/// # Safety
/// `id()` must return the same key on every call and no other type may
/// return that key. Registries hand out typed references to pools and
/// statics based on this key alone.
pub unsafe trait Component: Sized + Clone + 'static {
    const POLICY: DeletionPolicy = DeletionPolicy::SwapRemove;

    fn id() -> TypeKey;
}

/// Zero-sized components are tags: pools track their presence only.
#[inline(always)]
pub const fn is_tag<C: Component>() -> bool {
    size_of::<C>() == 0
}

/// A tuple of component types, used for `has_any`/`has_all` and views.
pub trait ComponentSet {
    type Keys: AsRef<[TypeKey]>;

    fn keys() -> Self::Keys;
}

/// A tuple of component values added to one entity in a single call.
pub trait Bundle {
    fn add_to(self, registry: &mut Registry, id: Entity);
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! impl_tuples {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            type Keys = [TypeKey; count!($($name)+)];

            #[inline]
            fn keys() -> Self::Keys {
                [$($name::id()),+]
            }
        }

        impl<$($name: Component),+> Bundle for ($($name,)+) {
            #[allow(non_snake_case)]
            fn add_to(self, registry: &mut Registry, id: Entity) {
                let ($($name,)+) = self;
                $(registry.add(id, $name);)+
            }
        }
    };
}

impl_tuples!(A);
impl_tuples!(A, B);
impl_tuples!(A, B, C);
impl_tuples!(A, B, C, D);
impl_tuples!(A, B, C, D, E);
impl_tuples!(A, B, C, D, E, F);
impl_tuples!(A, B, C, D, E, F, G);
impl_tuples!(A, B, C, D, E, F, G, H);
