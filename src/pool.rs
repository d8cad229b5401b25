use crate::arena::Arena;
use crate::component::{Component, DeletionPolicy, is_tag};
use crate::config::PoolConfig;
use crate::ecs::TypeKey;
use crate::entity::Entity;
use crate::error::Result;
use crate::signal::Signal;
use crate::storage::{ABSENT, PagedStore, SparseIndex};
use std::cmp::Ordering;
use std::rc::Rc;

/// Type-erased view of a [`Pool`], used by the registry to manage pools of
/// different component types uniformly.
pub trait ComponentPool {
    fn type_key(&self) -> TypeKey;

    fn type_name(&self) -> &'static str;

    fn policy(&self) -> DeletionPolicy;

    fn contains(&self, id: Entity) -> bool;

    /// Removes `id` if present. Does not notify; the registry does that.
    fn remove(&mut self, id: Entity) -> bool;

    /// Live entries.
    fn len(&self) -> usize;

    /// Dense slots including tombstones.
    fn dense_len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Returns the number of tombstones reclaimed.
    fn compact(&mut self) -> usize;

    /// Visits live ids in dense order.
    fn for_each_entity(&self, f: &mut dyn FnMut(Entity));

    fn on_add(&self) -> &Signal;

    fn on_add_mut(&mut self) -> &mut Signal;

    fn on_remove(&self) -> &Signal;

    fn on_remove_mut(&mut self) -> &mut Signal;

    /// Deep copy whose pages come from `arena`.
    fn clone_pool(&self, arena: &Rc<Arena>) -> Box<dyn ComponentPool>;

    /// Checks the bidirectional sparse/dense mapping and the free list.
    fn verify_invariants(&self) -> bool;
}

/// Sparse-set storage for one component type.
///
/// `sparse` maps an entity index to a dense slot; `ids[slot]` holds the id
/// stored there and `values` holds its component. For every live id,
/// `sparse[id.index()] == slot` and `ids[slot] == id`.
///
/// Zero-sized components never get a value store; only membership is kept.
///
/// Notifications are not dispatched by the pool itself. The owning
/// [`Registry`](crate::registry::Registry) emits [`on_add`](Self::on_add)
/// after an insertion and [`on_remove`](Self::on_remove) before a removal,
/// passing itself to the listeners.
pub struct Pool<C: Component> {
    arena: Rc<Arena>,
    config: PoolConfig,
    policy: DeletionPolicy,
    sparse: SparseIndex,
    ids: Vec<Entity>,
    values: Option<PagedStore<C>>,
    // Tombstoned slots of an in-place pool, most recent last.
    free: Vec<u32>,
    on_add: Signal,
    on_remove: Signal,
}

#[cold]
#[track_caller]
fn missing<C>(id: Entity) -> ! {
    panic!("{id:?} has no `{}` component", std::any::type_name::<C>())
}

#[cold]
#[track_caller]
fn missing_value<C: Component>(id: Entity) -> ! {
    if is_tag::<C>() {
        panic!("`{}` is a tag component and stores no value", std::any::type_name::<C>())
    }
    missing::<C>(id)
}

impl<C: Component> Pool<C> {
    /// Creates a pool with its own arena, default page geometry and the
    /// component's declared deletion policy.
    pub fn new() -> Self {
        Self::with_arena(Rc::new(Arena::new()))
    }

    pub fn with_arena(arena: Rc<Arena>) -> Self {
        match Self::with_config(arena, PoolConfig::default(), C::POLICY) {
            Ok(pool) => pool,
            Err(err) => panic!(
                "cannot create pool for `{}`: {err}",
                std::any::type_name::<C>()
            ),
        }
    }

    pub fn with_policy(policy: DeletionPolicy) -> Self {
        match Self::with_config(Rc::new(Arena::new()), PoolConfig::default(), policy) {
            Ok(pool) => pool,
            Err(err) => panic!(
                "cannot create pool for `{}`: {err}",
                std::any::type_name::<C>()
            ),
        }
    }

    pub fn with_config(arena: Rc<Arena>, config: PoolConfig, policy: DeletionPolicy) -> Result<Self> {
        config.validate()?;
        let values = if is_tag::<C>() {
            None
        } else {
            Some(PagedStore::new(arena.clone(), config.dense_page_len)?)
        };
        Ok(Self {
            sparse: SparseIndex::new(arena.clone(), config.sparse_page_len)?,
            arena,
            config,
            policy,
            ids: Vec::new(),
            values,
            free: Vec::new(),
            on_add: Signal::new(),
            on_remove: Signal::new(),
        })
    }

    pub fn arena(&self) -> &Rc<Arena> {
        &self.arena
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    pub fn policy(&self) -> DeletionPolicy {
        self.policy
    }

    /// Live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len() - self.free.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dense slots, tombstones included.
    #[inline]
    pub fn dense_len(&self) -> usize {
        self.ids.len()
    }

    /// Tombstones awaiting reuse or [`compact`](Self::compact).
    #[inline]
    pub fn tombstones(&self) -> usize {
        self.free.len()
    }

    /// The dense id list as stored, tombstones included.
    #[inline]
    pub fn ids(&self) -> &[Entity] {
        &self.ids
    }

    #[inline]
    pub fn slot_of(&self, id: Entity) -> Option<usize> {
        let slot = self.sparse.get(id.index())? as usize;
        (self.ids.get(slot) == Some(&id)).then_some(slot)
    }

    #[inline]
    pub fn contains(&self, id: Entity) -> bool {
        self.slot_of(id).is_some()
    }

    /// `None` if `id` is absent or the component is a tag.
    #[inline]
    pub fn try_get(&self, id: Entity) -> Option<&C> {
        let slot = self.slot_of(id)?;
        let values = self.values.as_ref()?;
        Some(unsafe { values.get(slot) })
    }

    #[inline]
    pub fn try_get_mut(&mut self, id: Entity) -> Option<&mut C> {
        let slot = self.slot_of(id)?;
        let values = self.values.as_mut()?;
        Some(unsafe { values.get_mut(slot) })
    }

    /// Panics if `id` has no value in this pool.
    #[inline]
    #[track_caller]
    pub fn get(&self, id: Entity) -> &C {
        match self.try_get(id) {
            Some(value) => value,
            None => missing_value::<C>(id),
        }
    }

    #[inline]
    #[track_caller]
    pub fn get_mut(&mut self, id: Entity) -> &mut C {
        match self.try_get_mut(id) {
            Some(value) => value,
            None => missing_value::<C>(id),
        }
    }

    /// Inserts `value` for `id`, overwriting an existing entry in place.
    /// Returns the stored value, or `None` for tags.
    pub fn add(&mut self, id: Entity, value: C) -> Option<&mut C> {
        debug_assert!(!id.is_none(), "cannot add a component to {id:?}");
        let slot = match self.slot_of(id) {
            Some(slot) => {
                self.overwrite(slot, value);
                slot
            }
            None => {
                let slot = self.acquire_slot(id, false);
                self.write_new(slot, value);
                slot
            }
        };
        self.value_at(slot)
    }

    pub fn add_default(&mut self, id: Entity) -> Option<&mut C>
    where
        C: Default,
    {
        self.add(id, C::default())
    }

    /// Adds a clone of `value` to every id. New entries are appended to the
    /// tail, bypassing free-slot reuse, so the batch stays contiguous.
    pub fn add_batch(&mut self, ids: &[Entity], value: C) {
        self.insert_batch(ids, |_| value.clone());
    }

    /// Adds `values[i]` to `ids[i]`. Panics if the lengths differ.
    pub fn add_batch_from<I>(&mut self, ids: &[Entity], values: I)
    where
        I: IntoIterator<Item = C>,
        I::IntoIter: ExactSizeIterator,
    {
        let mut values = values.into_iter();
        assert_eq!(
            ids.len(),
            values.len(),
            "batch insert needs one value per id"
        );
        self.insert_batch(ids, |_| match values.next() {
            Some(value) => value,
            None => unreachable!("length checked above"),
        });
    }

    /// Removes `id`. Returns `false` if it was absent.
    pub fn remove(&mut self, id: Entity) -> bool {
        match self.slot_of(id) {
            Some(slot) => {
                self.remove_at(slot);
                true
            }
            None => false,
        }
    }

    /// Removes `id`, which must be present.
    #[track_caller]
    pub fn remove_unchecked(&mut self, id: Entity) {
        match self.slot_of(id) {
            Some(slot) => self.remove_at(slot),
            None => missing::<C>(id),
        }
    }

    /// Returns how many of `ids` were present and removed.
    pub fn remove_many(&mut self, ids: &[Entity]) -> usize {
        ids.iter().filter(|&&id| self.remove(id)).count()
    }

    /// Exchanges the dense positions of two live entries.
    #[track_caller]
    pub fn swap(&mut self, a: Entity, b: Entity) {
        let (Some(slot_a), Some(slot_b)) = (self.slot_of(a), self.slot_of(b)) else {
            panic!("cannot swap {a:?} and {b:?}: both must be in the pool");
        };
        self.swap_slots(slot_a, slot_b);
    }

    /// Slides live entries down over tombstones, keeping their relative
    /// order, and shrinks the dense list to the live count. Returns the
    /// number of slots reclaimed.
    pub fn compact(&mut self) -> usize {
        let reclaimed = self.free.len();
        if reclaimed == 0 {
            return 0;
        }

        let mut write = 0;
        for read in 0..self.ids.len() {
            let id = self.ids[read];
            if id.is_none() {
                continue;
            }
            if read != write {
                self.ids[write] = id;
                if let Some(values) = self.values.as_mut() {
                    unsafe { values.relocate(read, write) };
                }
                self.sparse.set(id.index(), write as u32);
            }
            write += 1;
        }
        self.ids.truncate(write);
        self.free.clear();

        tracing::debug!(
            component = std::any::type_name::<C>(),
            reclaimed,
            live = write,
            "compacted pool"
        );
        reclaimed
    }

    /// Drops every value and empties the pool. Pages stay allocated.
    pub fn clear(&mut self) {
        // The pool is empty before any value's destructor runs; a panicking
        // drop leaks the remaining values instead of leaving them listed.
        let mut ids = std::mem::take(&mut self.ids);
        self.free.clear();
        for id in &ids {
            if !id.is_none() {
                self.sparse.clear(id.index());
            }
        }
        if let Some(values) = self.values.as_mut() {
            for (slot, id) in ids.iter().enumerate() {
                if !id.is_none() {
                    unsafe { values.drop_in_place(slot) };
                }
            }
        }
        ids.clear();
        self.ids = ids;
    }

    /// Makes room for `additional` more entries without further allocation.
    pub fn reserve(&mut self, additional: usize) {
        self.ids.reserve(additional);
        if let Some(values) = self.values.as_mut() {
            values.reserve(self.ids.len() + additional);
        }
    }

    /// Returns trailing pages no live entry uses to the arena.
    pub fn shrink_to_fit(&mut self) {
        self.ids.shrink_to_fit();
        if let Some(values) = self.values.as_mut() {
            values.release(self.ids.len());
        }
        let highest = self
            .entities()
            .map(|id| id.index() as usize + 1)
            .max()
            .unwrap_or(0);
        self.sparse.release(highest);
    }

    /// Live ids in dense order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.ids.iter().copied().filter(|id| !id.is_none())
    }

    /// Live entries in dense order. Empty for tags.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> + '_ {
        let values = self.values.as_ref();
        self.ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !id.is_none())
            .filter_map(move |(slot, id)| Some((*id, unsafe { values?.get(slot) })))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> + '_ {
        let values = self.values.as_ref().map(|v| v as *const PagedStore<C>);
        self.ids
            .iter()
            .enumerate()
            .filter(|(_, id)| !id.is_none())
            .filter_map(move |(slot, id)| {
                // Each live slot is yielded once, so the references are disjoint.
                let store = values?;
                Some((*id, unsafe { (*(*store).slot_ptr(slot)).assume_init_mut() }))
            })
    }

    pub fn values(&self) -> impl Iterator<Item = &C> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Reorders live entries by value. Compacts first.
    pub fn sort_by(&mut self, mut compare: impl FnMut(&C, &C) -> Ordering) {
        self.compact();
        let Some(values) = self.values.as_ref() else {
            return;
        };
        let mut order: Vec<usize> = (0..self.ids.len()).collect();
        order.sort_by(|&a, &b| unsafe { compare(values.get(a), values.get(b)) });
        self.permute(&order);
    }

    /// Reorders live entries by id. Compacts first.
    pub fn sort_by_entity(&mut self, mut compare: impl FnMut(Entity, Entity) -> Ordering) {
        self.compact();
        let ids = &self.ids;
        let mut order: Vec<usize> = (0..ids.len()).collect();
        order.sort_by(|&a, &b| compare(ids[a], ids[b]));
        self.permute(&order);
    }

    pub fn on_add(&self) -> &Signal {
        &self.on_add
    }

    pub fn on_add_mut(&mut self) -> &mut Signal {
        &mut self.on_add
    }

    pub fn on_remove(&self) -> &Signal {
        &self.on_remove
    }

    pub fn on_remove_mut(&mut self) -> &mut Signal {
        &mut self.on_remove
    }

    /// Deep copy whose pages come from `arena`. Listeners are shared with
    /// the original.
    pub fn clone_into_arena(&self, arena: Rc<Arena>) -> Self {
        let mut pool = match Self::with_config(arena, self.config, self.policy) {
            Ok(pool) => pool,
            Err(err) => unreachable!("pool geometry was validated at construction: {err}"),
        };
        pool.on_add = self.on_add.clone();
        pool.on_remove = self.on_remove.clone();
        pool.ids.reserve(self.ids.len());
        if let Some(dst) = pool.values.as_mut() {
            dst.reserve(self.ids.len());
        }

        // Ids are pushed only once their value is written, so a panicking
        // `clone` leaves a pool whose listed entries are all initialized.
        for (slot, &id) in self.ids.iter().enumerate() {
            if !id.is_none() {
                if let (Some(src), Some(dst)) = (self.values.as_ref(), pool.values.as_mut()) {
                    unsafe { dst.write(slot, src.get(slot).clone()) };
                }
                pool.sparse.set(id.index(), slot as u32);
            }
            pool.ids.push(id);
        }
        pool.free = self.free.clone();
        pool
    }

    pub fn verify_invariants(&self) -> bool {
        let mut tombstones = 0;
        for (slot, id) in self.ids.iter().enumerate() {
            if id.is_none() {
                tombstones += 1;
                continue;
            }
            if self.sparse.get(id.index()) != Some(slot as u32) {
                return false;
            }
        }
        if tombstones != self.free.len() {
            return false;
        }
        self.free
            .iter()
            .all(|&slot| self.ids.get(slot as usize).is_some_and(|id| id.is_none()))
    }

    fn acquire_slot(&mut self, id: Entity, force_tail: bool) -> usize {
        let reused = if force_tail { None } else { self.free.pop() };
        let slot = match reused {
            Some(slot) => {
                let slot = slot as usize;
                self.ids[slot] = id;
                slot
            }
            None => {
                let slot = self.ids.len();
                assert!(slot < ABSENT as usize, "pool dense capacity exhausted");
                self.ids.push(id);
                slot
            }
        };
        self.sparse.set(id.index(), slot as u32);
        slot
    }

    fn write_new(&mut self, slot: usize, value: C) {
        match self.values.as_mut() {
            Some(values) => {
                values.reserve(slot + 1);
                unsafe { values.write(slot, value) };
            }
            None => drop(value),
        }
    }

    fn overwrite(&mut self, slot: usize, value: C) {
        match self.values.as_mut() {
            Some(values) => {
                // The new value is in place before the old one's destructor runs.
                let old = std::mem::replace(unsafe { values.get_mut(slot) }, value);
                drop(old);
            }
            None => drop(value),
        }
    }

    fn value_at(&mut self, slot: usize) -> Option<&mut C> {
        let values = self.values.as_mut()?;
        Some(unsafe { values.get_mut(slot) })
    }

    fn insert_batch(&mut self, ids: &[Entity], mut value_for: impl FnMut(usize) -> C) {
        let fresh = ids.iter().filter(|&&id| !self.contains(id)).count();
        self.ids.reserve(fresh);
        if let Some(values) = self.values.as_mut() {
            values.reserve(self.ids.len() + fresh);
        }

        for (i, &id) in ids.iter().enumerate() {
            debug_assert!(!id.is_none(), "cannot add a component to {id:?}");
            let value = value_for(i);
            match self.slot_of(id) {
                Some(slot) => self.overwrite(slot, value),
                None => {
                    let slot = self.acquire_slot(id, true);
                    self.write_new(slot, value);
                }
            }
        }
    }

    // The removed value is moved out and dropped only after the dense and
    // sparse bookkeeping is final, so a panicking destructor cannot leave the
    // slot listed as live.
    fn remove_at(&mut self, slot: usize) {
        let id = self.ids[slot];
        self.sparse.clear(id.index());

        let removed = match self.policy {
            DeletionPolicy::SwapRemove => {
                let last = self.ids.len() - 1;
                let removed = self.values.as_mut().map(|values| unsafe {
                    let value = values.read(slot);
                    values.relocate(last, slot);
                    value
                });
                self.ids.swap_remove(slot);
                if slot != last {
                    let moved = self.ids[slot];
                    self.sparse.set(moved.index(), slot as u32);
                }
                removed
            }
            DeletionPolicy::InPlace => {
                let removed = self
                    .values
                    .as_mut()
                    .map(|values| unsafe { values.read(slot) });
                self.ids[slot] = Entity::tombstone(id.index());
                self.free.push(slot as u32);
                removed
            }
        };
        drop(removed);
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.ids.swap(a, b);
        if let Some(values) = self.values.as_mut() {
            unsafe { values.swap(a, b) };
        }
        for slot in [a, b] {
            let id = self.ids[slot];
            if !id.is_none() {
                self.sparse.set(id.index(), slot as u32);
            }
        }
    }

    // `order[i]` is the slot whose entry must end up at slot `i`.
    fn permute(&mut self, order: &[usize]) {
        let mut position: Vec<usize> = (0..order.len()).collect();
        let mut occupant: Vec<usize> = (0..order.len()).collect();
        for (target, &original) in order.iter().enumerate() {
            let current = position[original];
            if current == target {
                continue;
            }
            self.swap_slots(target, current);
            let displaced = occupant[target];
            occupant.swap(target, current);
            position[displaced] = current;
            position[original] = target;
        }
    }
}

impl<C: Component> Default for Pool<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> Clone for Pool<C> {
    fn clone(&self) -> Self {
        self.clone_into_arena(self.arena.clone())
    }
}

impl<C: Component> Drop for Pool<C> {
    fn drop(&mut self) {
        if let Some(values) = self.values.as_mut() {
            for (slot, id) in self.ids.iter().enumerate() {
                if !id.is_none() {
                    unsafe { values.drop_in_place(slot) };
                }
            }
        }
    }
}

impl<C: Component> std::fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("component", &std::any::type_name::<C>())
            .field("policy", &self.policy)
            .field("len", &self.len())
            .field("tombstones", &self.free.len())
            .finish()
    }
}

impl<C: Component> ComponentPool for Pool<C> {
    fn type_key(&self) -> TypeKey {
        C::id()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }

    fn policy(&self) -> DeletionPolicy {
        self.policy
    }

    fn contains(&self, id: Entity) -> bool {
        Pool::contains(self, id)
    }

    fn remove(&mut self, id: Entity) -> bool {
        Pool::remove(self, id)
    }

    fn len(&self) -> usize {
        Pool::len(self)
    }

    fn dense_len(&self) -> usize {
        Pool::dense_len(self)
    }

    fn clear(&mut self) {
        Pool::clear(self)
    }

    fn compact(&mut self) -> usize {
        Pool::compact(self)
    }

    fn for_each_entity(&self, f: &mut dyn FnMut(Entity)) {
        for id in self.entities() {
            f(id);
        }
    }

    fn on_add(&self) -> &Signal {
        &self.on_add
    }

    fn on_add_mut(&mut self) -> &mut Signal {
        &mut self.on_add
    }

    fn on_remove(&self) -> &Signal {
        &self.on_remove
    }

    fn on_remove_mut(&mut self) -> &mut Signal {
        &mut self.on_remove
    }

    fn clone_pool(&self, arena: &Rc<Arena>) -> Box<dyn ComponentPool> {
        Box::new(self.clone_into_arena(arena.clone()))
    }

    fn verify_invariants(&self) -> bool {
        Pool::verify_invariants(self)
    }
}
