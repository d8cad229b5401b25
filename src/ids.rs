//! Entity lifecycle: creation, destruction and staleness checks.

use crate::entity::Entity;

/// Hands out generational ids and recycles destroyed slots.
///
/// `slots[i]` holds the id currently minted for slot `i`. Destroying an id
/// rewrites its slot with [`Entity::NONE_INDEX`] and the next version, so the
/// slot no longer matches its own position until it is handed out again.
/// Freed indices sit on a LIFO stack.
#[derive(Debug, Clone, Default)]
pub struct IdRegistry {
    slots: Vec<Entity>,
    free: Vec<u32>,
    // Version given to freshly minted slots. Raised by `clear`.
    base: u32,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            base: 0,
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
    }

    /// Creates an id, reusing the most recently freed slot if there is one.
    pub fn create(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            // The version was already bumped when the slot was freed.
            let id = Entity::new(index, slot.version());
            *slot = id;
            return id;
        }

        let index = self.slots.len();
        assert!(
            index < Entity::NONE_INDEX as usize,
            "entity index space exhausted"
        );
        let id = Entity::new(index as u32, self.base);
        self.slots.push(id);
        id
    }

    /// Fills every element of `out` with a freshly created id.
    pub fn create_many(&mut self, out: &mut [Entity]) {
        let fresh = out.len().saturating_sub(self.free.len());
        self.slots.reserve(fresh);
        for id in out.iter_mut() {
            *id = self.create();
        }
    }

    /// Destroys `id`. Returns `false` and does nothing if it is not valid.
    pub fn destroy(&mut self, id: Entity) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        let index = id.index();
        self.slots[index as usize] =
            Entity::new(Entity::NONE_INDEX, Entity::next_version(id.version()));
        self.free.push(index);
        true
    }

    /// Destroys every valid id in `ids`; invalid ones are skipped.
    /// Returns `true` only if all of them were destroyed.
    pub fn destroy_many(&mut self, ids: &[Entity]) -> bool {
        let mut all = true;
        for &id in ids {
            all &= self.destroy(id);
        }
        all
    }

    #[inline]
    pub fn is_valid(&self, id: Entity) -> bool {
        match self.slots.get(id.index() as usize) {
            Some(current) => *current == id,
            None => false,
        }
    }

    /// The id currently owning slot `index`, if that slot is alive.
    pub fn current(&self, index: u32) -> Option<Entity> {
        let id = *self.slots.get(index as usize)?;
        (id.index() == index).then_some(id)
    }

    /// Visits every valid id in slot order.
    pub fn each(&self, mut f: impl FnMut(Entity)) {
        for id in self.iter() {
            f(id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(slot, id)| id.index() as usize == *slot)
            .map(|(_, id)| *id)
    }

    /// Number of live ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever minted, live or free.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Forgets every id. Slots minted afterwards start above every version
    /// seen so far, so ids from before the clear stay invalid.
    pub fn clear(&mut self) {
        if let Some(highest) = self.slots.iter().map(|slot| slot.version()).max() {
            self.base = Entity::next_version(highest.max(self.base));
        }
        self.slots.clear();
        self.free.clear();
    }
}
