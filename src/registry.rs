use crate::arena::Arena;
use crate::component::{Bundle, Component, ComponentSet};
use crate::config::RegistryConfig;
use crate::ecs::TypeKey;
use crate::entity::Entity;
use crate::error::Result;
use crate::ids::IdRegistry;
use crate::pool::{ComponentPool, Pool};
use crate::signal::Signal;
use std::any::type_name;
use std::collections::HashSet;
use std::rc::Rc;

struct PoolEntry {
    key: TypeKey,
    pool: Box<dyn ComponentPool>,
}

trait StaticSlot {
    fn clone_slot(&self) -> Box<dyn StaticSlot>;

    fn type_name(&self) -> &'static str;
}

struct StaticCell<S>(S);

impl<S: Component> StaticSlot for StaticCell<S> {
    fn clone_slot(&self) -> Box<dyn StaticSlot> {
        Box::new(StaticCell(self.0.clone()))
    }

    fn type_name(&self) -> &'static str {
        type_name::<S>()
    }
}

struct StaticEntry {
    key: TypeKey,
    value: Box<dyn StaticSlot>,
}

// Entries are keyed by `C::id()` when inserted, and `Component` guarantees
// keys are unique per type, so the key match makes these casts sound.
#[inline(always)]
fn typed<C: Component>(pool: &dyn ComponentPool) -> &Pool<C> {
    debug_assert_eq!(
        pool.type_key(),
        C::id(),
        "pool of `{}` accessed as `{}`",
        pool.type_name(),
        type_name::<C>()
    );
    unsafe { &*(pool as *const _ as *const Pool<C>) }
}

#[inline(always)]
fn typed_mut<C: Component>(pool: &mut dyn ComponentPool) -> &mut Pool<C> {
    debug_assert_eq!(
        pool.type_key(),
        C::id(),
        "pool of `{}` accessed as `{}`",
        pool.type_name(),
        type_name::<C>()
    );
    unsafe { &mut *(pool as *mut _ as *mut Pool<C>) }
}

#[inline(always)]
fn static_ref<S: Component>(slot: &dyn StaticSlot) -> &S {
    debug_assert_eq!(slot.type_name(), type_name::<S>());
    unsafe { &(*(slot as *const _ as *const StaticCell<S>)).0 }
}

#[inline(always)]
fn static_mut<S: Component>(slot: &mut dyn StaticSlot) -> &mut S {
    debug_assert_eq!(slot.type_name(), type_name::<S>());
    unsafe { &mut (*(slot as *mut _ as *mut StaticCell<S>)).0 }
}

#[cold]
#[track_caller]
fn missing<C>(id: Entity) -> ! {
    panic!("{id:?} has no `{}` component", type_name::<C>())
}

#[cold]
#[track_caller]
fn missing_value<C: Component>(id: Entity) -> ! {
    if crate::component::is_tag::<C>() {
        panic!("`{}` is a tag component and stores no value", type_name::<C>())
    }
    missing::<C>(id)
}

/// Collects `ids`, keeping the first occurrence of each.
fn distinct(ids: impl Iterator<Item = Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    ids.filter(|&id| seen.insert(id)).collect()
}

#[cold]
#[track_caller]
fn missing_static<S>() -> ! {
    panic!("registry has no `{}` static", type_name::<S>())
}

/// The aggregate world: entity ids, one pool per component type and one
/// static value per static type.
///
/// Pools are created on first use and kept in a table sorted by
/// [`TypeKey`]; lookups are binary searches. Statics use a second table with
/// the same discipline.
///
/// Add notifications fire after the pool has been updated, remove
/// notifications before the entry goes away. Listeners receive `&Registry`.
pub struct Registry {
    config: RegistryConfig,
    arena: Rc<Arena>,
    ids: IdRegistry,
    pools: Vec<PoolEntry>,
    statics: Vec<StaticEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::from_parts(Rc::new(Arena::new()), RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        Self::with_arena(Rc::new(Arena::new()), config)
    }

    /// Builds a registry whose pools draw their pages from `arena`.
    pub fn with_arena(arena: Rc<Arena>, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(arena, config))
    }

    fn from_parts(arena: Rc<Arena>, config: RegistryConfig) -> Self {
        Self {
            ids: IdRegistry::with_capacity(config.entity_capacity),
            config,
            arena,
            pools: Vec::new(),
            statics: Vec::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn arena(&self) -> &Rc<Arena> {
        &self.arena
    }

    pub fn ids(&self) -> &IdRegistry {
        &self.ids
    }

    pub fn create(&mut self) -> Entity {
        self.ids.create()
    }

    pub fn create_many(&mut self, out: &mut [Entity]) {
        self.ids.create_many(out);
    }

    pub fn create_n(&mut self, count: usize) -> Vec<Entity> {
        let mut out = vec![Entity::NONE; count];
        self.ids.create_many(&mut out);
        out
    }

    /// Removes `id` from every pool holding it, then destroys it. Returns
    /// `false` if `id` was not valid.
    pub fn destroy(&mut self, id: Entity) -> bool {
        if !self.ids.is_valid(id) {
            return false;
        }
        for position in 0..self.pools.len() {
            if self.pools[position].pool.contains(id) {
                self.emit_remove(position, &[id]);
                self.pools[position].pool.remove(id);
            }
        }
        self.ids.destroy(id)
    }

    /// Batch [`destroy`](Self::destroy). Invalid ids are skipped; returns
    /// `true` only if every id was destroyed. Each pool notifies once with
    /// the ids it held, each reported once even if repeated in `ids`.
    pub fn destroy_many(&mut self, ids: &[Entity]) -> bool {
        let valid = distinct(ids.iter().copied().filter(|&id| self.ids.is_valid(id)));

        let mut present = Vec::new();
        for position in 0..self.pools.len() {
            present.clear();
            let pool = &self.pools[position].pool;
            present.extend(valid.iter().copied().filter(|&id| pool.contains(id)));
            if present.is_empty() {
                continue;
            }
            self.emit_remove(position, &present);
            let pool = &mut self.pools[position].pool;
            for &id in &present {
                pool.remove(id);
            }
        }
        self.ids.destroy_many(ids)
    }

    #[inline]
    pub fn is_valid(&self, id: Entity) -> bool {
        self.ids.is_valid(id)
    }

    /// Number of live ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Visits every valid id.
    pub fn each(&self, f: impl FnMut(Entity)) {
        self.ids.each(f);
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.ids.iter()
    }

    /// True if no pool holds `id`. Costs one lookup per pool ever created.
    pub fn is_orphan(&self, id: Entity) -> bool {
        !self.pools.iter().any(|entry| entry.pool.contains(id))
    }

    /// Visits every valid id that no pool holds.
    pub fn each_orphan(&self, mut f: impl FnMut(Entity)) {
        for id in self.ids.iter() {
            if self.is_orphan(id) {
                f(id);
            }
        }
    }

    /// Adds (or overwrites) `C` on `id`. Returns the stored value, `None`
    /// for tags.
    pub fn add<C: Component>(&mut self, id: Entity, value: C) -> Option<&mut C> {
        debug_assert!(
            self.ids.is_valid(id),
            "adding `{}` to invalid {id:?}",
            type_name::<C>()
        );
        let position = self.assure_position::<C>();
        typed_mut::<C>(&mut *self.pools[position].pool).add(id, value);
        self.emit_add(position, &[id]);
        typed_mut::<C>(&mut *self.pools[position].pool).try_get_mut(id)
    }

    pub fn add_default<C: Component + Default>(&mut self, id: Entity) -> Option<&mut C> {
        self.add(id, C::default())
    }

    /// Adds every component of a tuple to `id`.
    pub fn add_bundle<B: Bundle>(&mut self, id: Entity, bundle: B) {
        bundle.add_to(self, id);
    }

    /// Adds a default value of every component in the tuple `B`.
    pub fn add_defaults<B: Bundle + Default>(&mut self, id: Entity) {
        B::default().add_to(self, id);
    }

    /// Adds a clone of `value` to every id; new entries land contiguously
    /// at the tail of the pool. Notifies once with the whole batch.
    pub fn add_n<C: Component>(&mut self, ids: &[Entity], value: C) {
        debug_assert!(ids.iter().all(|&id| self.ids.is_valid(id)));
        let position = self.assure_position::<C>();
        typed_mut::<C>(&mut *self.pools[position].pool).add_batch(ids, value);
        self.emit_add(position, ids);
    }

    /// Adds `values[i]` to `ids[i]`.
    pub fn add_n_from<C, I>(&mut self, ids: &[Entity], values: I)
    where
        C: Component,
        I: IntoIterator<Item = C>,
        I::IntoIter: ExactSizeIterator,
    {
        debug_assert!(ids.iter().all(|&id| self.ids.is_valid(id)));
        let position = self.assure_position::<C>();
        typed_mut::<C>(&mut *self.pools[position].pool).add_batch_from(ids, values);
        self.emit_add(position, ids);
    }

    /// Removes `C` from `id`. Returns `false` if it was absent.
    pub fn remove<C: Component>(&mut self, id: Entity) -> bool {
        let Some(position) = self.position(C::id()) else {
            return false;
        };
        if !typed::<C>(&*self.pools[position].pool).contains(id) {
            return false;
        }
        self.emit_remove(position, &[id]);
        typed_mut::<C>(&mut *self.pools[position].pool).remove(id)
    }

    /// Removes `C` from `id`, which must have it.
    #[track_caller]
    pub fn remove_unchecked<C: Component>(&mut self, id: Entity) {
        if !self.remove::<C>(id) {
            missing::<C>(id);
        }
    }

    /// Returns how many of `ids` had `C` and lost it.
    pub fn remove_many<C: Component>(&mut self, ids: &[Entity]) -> usize {
        let Some(position) = self.position(C::id()) else {
            return 0;
        };
        let pool = typed::<C>(&*self.pools[position].pool);
        let present = distinct(ids.iter().copied().filter(|&id| pool.contains(id)));
        if present.is_empty() {
            return 0;
        }
        self.emit_remove(position, &present);
        typed_mut::<C>(&mut *self.pools[position].pool).remove_many(&present)
    }

    #[inline]
    pub fn has<C: Component>(&self, id: Entity) -> bool {
        self.pool::<C>().is_some_and(|pool| pool.contains(id))
    }

    /// True if `id` has at least one component of the tuple `S`.
    pub fn has_any<S: ComponentSet>(&self, id: Entity) -> bool {
        S::keys()
            .as_ref()
            .iter()
            .any(|&key| self.find_pool(key).is_some_and(|pool| pool.contains(id)))
    }

    /// True if `id` has every component of the tuple `S`.
    pub fn has_all<S: ComponentSet>(&self, id: Entity) -> bool {
        S::keys()
            .as_ref()
            .iter()
            .all(|&key| self.find_pool(key).is_some_and(|pool| pool.contains(id)))
    }

    #[inline]
    pub fn try_get<C: Component>(&self, id: Entity) -> Option<&C> {
        self.pool::<C>()?.try_get(id)
    }

    #[inline]
    pub fn try_get_mut<C: Component>(&mut self, id: Entity) -> Option<&mut C> {
        self.pool_mut::<C>()?.try_get_mut(id)
    }

    /// Panics if `id` has no `C`.
    #[inline]
    #[track_caller]
    pub fn get<C: Component>(&self, id: Entity) -> &C {
        match self.try_get(id) {
            Some(value) => value,
            None => missing_value::<C>(id),
        }
    }

    #[inline]
    #[track_caller]
    pub fn get_mut<C: Component>(&mut self, id: Entity) -> &mut C {
        match self.try_get_mut(id) {
            Some(value) => value,
            None => missing_value::<C>(id),
        }
    }

    pub fn get_or_add<C: Component + Default>(&mut self, id: Entity) -> Option<&mut C> {
        self.get_or_add_with(id, C::default)
    }

    /// Returns the existing `C` of `id`, adding `make()` first if absent.
    pub fn get_or_add_with<C: Component>(
        &mut self,
        id: Entity,
        make: impl FnOnce() -> C,
    ) -> Option<&mut C> {
        if self.has::<C>(id) {
            return self.try_get_mut(id);
        }
        self.add(id, make())
    }

    /// The pool of `C`, created if this is its first use.
    pub fn assure_pool<C: Component>(&mut self) -> &mut Pool<C> {
        let position = self.assure_position::<C>();
        typed_mut::<C>(&mut *self.pools[position].pool)
    }

    pub fn pool<C: Component>(&self) -> Option<&Pool<C>> {
        let position = self.position(C::id())?;
        Some(typed::<C>(&*self.pools[position].pool))
    }

    pub fn pool_mut<C: Component>(&mut self) -> Option<&mut Pool<C>> {
        let position = self.position(C::id())?;
        Some(typed_mut::<C>(&mut *self.pools[position].pool))
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Every pool, in key order.
    pub fn pools(&self) -> impl Iterator<Item = &dyn ComponentPool> + '_ {
        self.pools.iter().map(|entry| &*entry.pool)
    }

    /// Listeners run after `C` is added to one or more ids.
    pub fn on_add<C: Component>(&mut self) -> &mut Signal {
        self.assure_pool::<C>().on_add_mut()
    }

    /// Listeners run before `C` is removed from one or more ids, including
    /// removals caused by [`destroy`](Self::destroy).
    pub fn on_remove<C: Component>(&mut self) -> &mut Signal {
        self.assure_pool::<C>().on_remove_mut()
    }

    /// Reclaims the tombstones of `C`'s pool.
    pub fn compact<C: Component>(&mut self) -> usize {
        self.pool_mut::<C>().map_or(0, Pool::compact)
    }

    pub fn compact_all(&mut self) -> usize {
        self.pools.iter_mut().map(|entry| entry.pool.compact()).sum()
    }

    pub(crate) fn find_pool(&self, key: TypeKey) -> Option<&dyn ComponentPool> {
        let position = self.position(key)?;
        Some(&*self.pools[position].pool)
    }

    #[inline]
    fn position(&self, key: TypeKey) -> Option<usize> {
        self.pools.binary_search_by_key(&key, |entry| entry.key).ok()
    }

    fn assure_position<C: Component>(&mut self) -> usize {
        let key = C::id();
        match self.pools.binary_search_by_key(&key, |entry| entry.key) {
            Ok(position) => position,
            Err(position) => {
                let pool = match Pool::<C>::with_config(self.arena.clone(), self.config.pool, C::POLICY) {
                    Ok(pool) => pool,
                    Err(err) => panic!("cannot create pool for `{}`: {err}", type_name::<C>()),
                };
                tracing::debug!(
                    component = type_name::<C>(),
                    key = key.get(),
                    policy = ?C::POLICY,
                    "created component pool"
                );
                self.pools.insert(
                    position,
                    PoolEntry {
                        key,
                        pool: Box::new(pool),
                    },
                );
                position
            }
        }
    }

    fn emit_add(&self, position: usize, ids: &[Entity]) {
        let signal = self.pools[position].pool.on_add();
        if !ids.is_empty() && !signal.is_empty() {
            signal.emit(self, ids);
        }
    }

    fn emit_remove(&self, position: usize, ids: &[Entity]) {
        let signal = self.pools[position].pool.on_remove();
        if !ids.is_empty() && !signal.is_empty() {
            signal.emit(self, ids);
        }
    }

    /// Stores `value` as the registry's `S`, replacing any previous one.
    pub fn set_static<S: Component>(&mut self, value: S) -> &mut S {
        let key = S::id();
        let position = match self.static_position(key) {
            Ok(position) => {
                *static_mut::<S>(&mut *self.statics[position].value) = value;
                position
            }
            Err(position) => {
                tracing::debug!(static_type = type_name::<S>(), key = key.get(), "inserted static");
                self.statics.insert(
                    position,
                    StaticEntry {
                        key,
                        value: Box::new(StaticCell(value)),
                    },
                );
                position
            }
        };
        static_mut::<S>(&mut *self.statics[position].value)
    }

    pub fn get_or_set_static<S: Component + Default>(&mut self) -> &mut S {
        self.get_or_set_static_with(S::default)
    }

    pub fn get_or_set_static_with<S: Component>(&mut self, make: impl FnOnce() -> S) -> &mut S {
        match self.static_position(S::id()) {
            Ok(position) => static_mut::<S>(&mut *self.statics[position].value),
            Err(_) => self.set_static(make()),
        }
    }

    pub fn has_static<S: Component>(&self) -> bool {
        self.static_position(S::id()).is_ok()
    }

    pub fn try_get_static<S: Component>(&self) -> Option<&S> {
        let position = self.static_position(S::id()).ok()?;
        Some(static_ref::<S>(&*self.statics[position].value))
    }

    pub fn try_get_static_mut<S: Component>(&mut self) -> Option<&mut S> {
        let position = self.static_position(S::id()).ok()?;
        Some(static_mut::<S>(&mut *self.statics[position].value))
    }

    #[track_caller]
    pub fn get_static<S: Component>(&self) -> &S {
        match self.try_get_static() {
            Some(value) => value,
            None => missing_static::<S>(),
        }
    }

    #[track_caller]
    pub fn get_static_mut<S: Component>(&mut self) -> &mut S {
        match self.try_get_static_mut() {
            Some(value) => value,
            None => missing_static::<S>(),
        }
    }

    /// Takes the registry's `S` out, if it has one.
    pub fn remove_static<S: Component>(&mut self) -> Option<S> {
        let position = self.static_position(S::id()).ok()?;
        let entry = self.statics.remove(position);
        debug_assert_eq!(entry.value.type_name(), type_name::<S>());
        let cell = unsafe { Box::from_raw(Box::into_raw(entry.value) as *mut StaticCell<S>) };
        Some(cell.0)
    }

    pub fn static_count(&self) -> usize {
        self.statics.len()
    }

    #[inline]
    fn static_position(&self, key: TypeKey) -> std::result::Result<usize, usize> {
        self.statics.binary_search_by_key(&key, |entry| entry.key)
    }

    /// Drops every pool and forgets every id. Statics survive if
    /// `keep_statics` is set.
    ///
    /// Indices are reused from zero afterwards, but with versions above any
    /// handed out before the reset, so ids from before stay invalid.
    pub fn reset(&mut self, keep_statics: bool) {
        tracing::debug!(
            pools = self.pools.len(),
            entities = self.ids.len(),
            keep_statics,
            "resetting registry"
        );
        self.pools.clear();
        self.ids.clear();
        if !keep_statics {
            self.statics.clear();
        }
    }

    /// Checks every pool's sparse/dense consistency and that pools only
    /// hold valid ids.
    pub fn verify_invariants(&self) -> bool {
        self.pools.windows(2).all(|pair| pair[0].key < pair[1].key)
            && self.statics.windows(2).all(|pair| pair[0].key < pair[1].key)
            && self.pools.iter().all(|entry| {
                let mut valid = true;
                entry
                    .pool
                    .for_each_entity(&mut |id| valid &= self.ids.is_valid(id));
                valid && entry.pool.verify_invariants()
            })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Registry {
    /// Deep copy: ids by value, pools and statics cloned into a fresh arena.
    fn clone(&self) -> Self {
        let arena = Rc::new(Arena::new());
        let pools = self
            .pools
            .iter()
            .map(|entry| PoolEntry {
                key: entry.key,
                pool: entry.pool.clone_pool(&arena),
            })
            .collect();
        let statics = self
            .statics
            .iter()
            .map(|entry| StaticEntry {
                key: entry.key,
                value: entry.value.clone_slot(),
            })
            .collect();
        tracing::debug!(
            pools = self.pools.len(),
            statics = self.statics.len(),
            entities = self.ids.len(),
            "cloned registry"
        );

        Self {
            config: self.config,
            arena,
            ids: self.ids.clone(),
            pools,
            statics,
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.ids.len())
            .field(
                "pools",
                &self
                    .pools
                    .iter()
                    .map(|entry| (entry.pool.type_name(), entry.pool.len()))
                    .collect::<Vec<_>>(),
            )
            .field(
                "statics",
                &self
                    .statics
                    .iter()
                    .map(|entry| entry.value.type_name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
