use crate::arena::Arena;
use crate::component::DeletionPolicy;
use crate::config::DEFAULT_SPARSE_PAGE_LEN;
use crate::entity::Entity;
use crate::error::Result;
use crate::storage::SparseIndex;
use std::cmp::Ordering;
use std::rc::Rc;
use tracing::debug;

const END: u32 = Entity::NONE_INDEX;

/// Entity-only sparse set whose free list lives inside the packed array.
///
/// A freed in-place slot holds `Entity::new(next_free, NONE_VERSION)`, so
/// the list costs no storage beyond the packed ids themselves. Unlike
/// [`Pool`](crate::pool::Pool) it carries no values, which makes it cheap to
/// reorder: [`sort_by`](Self::sort_by) and [`respect`](Self::respect) only
/// shuffle ids.
pub struct SparseSet {
    sparse: SparseIndex,
    packed: Vec<Entity>,
    free_head: u32,
    live: usize,
    policy: DeletionPolicy,
}

impl SparseSet {
    pub fn new(policy: DeletionPolicy) -> Self {
        // The default page length is a validated power of two.
        match Self::with_arena(Rc::new(Arena::new()), DEFAULT_SPARSE_PAGE_LEN, policy) {
            Ok(set) => set,
            Err(err) => unreachable!("default sparse page length rejected: {err}"),
        }
    }

    pub fn with_arena(arena: Rc<Arena>, page_len: usize, policy: DeletionPolicy) -> Result<Self> {
        Ok(Self {
            sparse: SparseIndex::new(arena, page_len)?,
            packed: Vec::new(),
            free_head: END,
            live: 0,
            policy,
        })
    }

    #[inline]
    pub fn policy(&self) -> DeletionPolicy {
        self.policy
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Packed length, holes included.
    #[inline]
    pub fn dense_len(&self) -> usize {
        self.packed.len()
    }

    /// Raw packed array. Holes show up with `NONE_VERSION`.
    #[inline]
    pub fn packed(&self) -> &[Entity] {
        &self.packed
    }

    #[inline]
    pub fn index_of(&self, id: Entity) -> Option<usize> {
        let slot = self.sparse.get(id.index())? as usize;
        (self.packed[slot] == id).then_some(slot)
    }

    #[inline]
    pub fn contains(&self, id: Entity) -> bool {
        self.index_of(id).is_some()
    }

    /// Inserts `id` and returns its packed slot. An id already present keeps
    /// its slot.
    pub fn insert(&mut self, id: Entity) -> usize {
        debug_assert!(!id.is_none(), "inserting a null id into a sparse set");
        if let Some(slot) = self.index_of(id) {
            return slot;
        }

        let slot = if self.policy == DeletionPolicy::InPlace && self.free_head != END {
            let slot = self.free_head;
            self.free_head = self.packed[slot as usize].index();
            self.packed[slot as usize] = id;
            slot
        } else {
            let slot = self.packed.len() as u32;
            self.packed.push(id);
            slot
        };
        self.sparse.set(id.index(), slot);
        self.live += 1;
        slot as usize
    }

    pub fn remove(&mut self, id: Entity) -> bool {
        let Some(slot) = self.index_of(id) else {
            return false;
        };
        self.sparse.clear(id.index());
        self.live -= 1;

        match self.policy {
            DeletionPolicy::SwapRemove => {
                self.packed.swap_remove(slot);
                if let Some(&moved) = self.packed.get(slot) {
                    self.sparse.set(moved.index(), slot as u32);
                }
            }
            DeletionPolicy::InPlace => {
                self.packed[slot] = Entity::new(self.free_head, Entity::NONE_VERSION);
                self.free_head = slot as u32;
            }
        }
        true
    }

    /// Live ids in packed order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.packed.iter().copied().filter(|id| !id.is_none())
    }

    /// Slides live ids down over holes, keeping their order. Returns the
    /// number of holes reclaimed.
    pub fn compact(&mut self) -> usize {
        let holes = self.packed.len() - self.live;
        if holes == 0 {
            return 0;
        }
        let mut to = 0;
        for from in 0..self.packed.len() {
            let id = self.packed[from];
            if id.is_none() {
                continue;
            }
            if from != to {
                self.packed[to] = id;
                self.sparse.set(id.index(), to as u32);
            }
            to += 1;
        }
        self.packed.truncate(to);
        self.free_head = END;
        debug!(holes, live = self.live, "compacted sparse set");
        holes
    }

    /// Sorts live ids with `compare`. Holes are compacted away first.
    pub fn sort_by(&mut self, mut compare: impl FnMut(Entity, Entity) -> Ordering) {
        self.compact();
        self.packed.sort_by(|a, b| compare(*a, *b));
        for (slot, id) in self.packed.iter().enumerate() {
            self.sparse.set(id.index(), slot as u32);
        }
    }

    /// Reorders so the ids shared with `other` come first, in `other`'s
    /// order. The remaining ids follow in unspecified order.
    pub fn respect(&mut self, other: &SparseSet) {
        self.compact();
        let mut next = 0;
        for id in other.iter() {
            let Some(slot) = self.index_of(id) else {
                continue;
            };
            if slot != next {
                self.swap_slots(slot, next);
            }
            next += 1;
        }
    }

    /// Exchanges the packed positions of two live ids.
    ///
    /// # Panics
    /// If either id is absent.
    pub fn swap(&mut self, a: Entity, b: Entity) {
        let (Some(sa), Some(sb)) = (self.index_of(a), self.index_of(b)) else {
            panic!("swapping {a:?} and {b:?}, which are not both in the set");
        };
        self.swap_slots(sa, sb);
    }

    pub fn clear(&mut self) {
        for id in &self.packed {
            if !id.is_none() {
                self.sparse.clear(id.index());
            }
        }
        self.packed.clear();
        self.free_head = END;
        self.live = 0;
    }

    /// Checks sparse/packed agreement and the embedded free list.
    pub fn verify_invariants(&self) -> bool {
        let mut live = 0;
        for (slot, id) in self.packed.iter().enumerate() {
            if id.is_none() {
                continue;
            }
            live += 1;
            if self.sparse.get(id.index()) != Some(slot as u32) {
                return false;
            }
        }

        let mut holes = 0;
        let mut cursor = self.free_head;
        while cursor != END {
            match self.packed.get(cursor as usize) {
                Some(hole) if hole.is_none() => {
                    holes += 1;
                    if holes > self.packed.len() {
                        return false;
                    }
                    cursor = hole.index();
                }
                _ => return false,
            }
        }

        live == self.live && live + holes == self.packed.len()
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.packed.swap(a, b);
        self.sparse.set(self.packed[a].index(), a as u32);
        self.sparse.set(self.packed[b].index(), b as u32);
    }
}

impl Default for SparseSet {
    fn default() -> Self {
        Self::new(DeletionPolicy::default())
    }
}

impl std::fmt::Debug for SparseSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseSet")
            .field("policy", &self.policy)
            .field("len", &self.live)
            .field("packed", &self.packed.len())
            .finish()
    }
}
