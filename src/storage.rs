use crate::arena::Arena;
use crate::config::check_page_len;
use crate::error::{Error, Result};
use std::alloc::Layout;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::rc::Rc;

/// A growable array split into fixed-size pages.
///
/// Growth appends whole pages obtained from the [`Arena`]; pages already
/// handed out are never moved, so a pointer from [`slot_ptr`](Self::slot_ptr)
/// stays valid until the page holding it is released.
///
/// The store does not track which slots are initialized. The owner does,
/// which is why element access is `unsafe`. Dropping the store returns its
/// pages to the arena without dropping any element.
pub struct PagedStore<T> {
    arena: Rc<Arena>,
    pages: Vec<NonNull<MaybeUninit<T>>>,
    shift: u32,
    layout: Layout,
}

impl<T> PagedStore<T> {
    /// Creates an empty store. `page_len` must be a power of two and `T`
    /// must not be zero-sized.
    pub fn new(arena: Rc<Arena>, page_len: usize) -> Result<Self> {
        if size_of::<T>() == 0 {
            return Err(Error::ZeroSized {
                type_name: std::any::type_name::<T>(),
            });
        }
        check_page_len("paged store", page_len)?;
        let layout = Layout::array::<T>(page_len).map_err(|_| Error::PageTooLarge {
            len: page_len,
            element_size: size_of::<T>(),
        })?;

        Ok(Self {
            arena,
            pages: Vec::new(),
            shift: page_len.trailing_zeros(),
            layout,
        })
    }

    #[inline(always)]
    pub fn page_len(&self) -> usize {
        1 << self.shift
    }

    #[inline(always)]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of addressable slots.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.pages.len() << self.shift
    }

    pub fn arena(&self) -> &Rc<Arena> {
        &self.arena
    }

    /// Grows until at least `len` slots are addressable. Returns the number
    /// of pages added.
    pub fn reserve(&mut self, len: usize) -> usize {
        let mut added = 0;
        while self.capacity() < len {
            self.push_page();
            added += 1;
        }
        added
    }

    /// Like [`reserve`](Self::reserve), writing `value` into every slot of
    /// each new page.
    pub fn reserve_filled(&mut self, len: usize, value: T) -> usize
    where
        T: Copy,
    {
        let mut added = 0;
        while self.capacity() < len {
            let page = self.push_page();
            let slots = unsafe { std::slice::from_raw_parts_mut(page.as_ptr(), self.page_len()) };
            for slot in slots {
                slot.write(value);
            }
            added += 1;
        }
        added
    }

    /// Frees trailing pages not needed to address `len` slots. Slots beyond
    /// `len` must hold no live values.
    pub fn release(&mut self, len: usize) -> usize {
        let keep = len.div_ceil(self.page_len());
        let mut freed = 0;
        while self.pages.len() > keep {
            if let Some(page) = self.pages.pop() {
                unsafe { self.arena.deallocate(page.cast(), self.layout) };
                freed += 1;
            }
        }
        if freed != 0 {
            tracing::trace!(pages = freed, "paged store released pages");
        }
        freed
    }

    /// Address of slot `index`; stable across [`reserve`](Self::reserve).
    ///
    /// Panics if `index` is beyond the capacity.
    #[inline(always)]
    pub fn slot_ptr(&self, index: usize) -> *mut MaybeUninit<T> {
        let page = self.pages[index >> self.shift];
        let offset = index & (self.page_len() - 1);
        unsafe { page.as_ptr().add(offset) }
    }

    /// # Safety
    /// The slot must not hold a live value (it would be leaked).
    #[inline(always)]
    pub unsafe fn write(&mut self, index: usize, value: T) -> &mut T {
        unsafe { (*self.slot_ptr(index)).write(value) }
    }

    /// Moves the value out, leaving the slot uninitialized.
    ///
    /// # Safety
    /// The slot must hold a live value.
    #[inline(always)]
    pub unsafe fn read(&mut self, index: usize) -> T {
        unsafe { (*self.slot_ptr(index)).assume_init_read() }
    }

    /// # Safety
    /// The slot must hold a live value.
    #[inline(always)]
    pub unsafe fn get(&self, index: usize) -> &T {
        unsafe { (*self.slot_ptr(index)).assume_init_ref() }
    }

    /// # Safety
    /// The slot must hold a live value.
    #[inline(always)]
    pub unsafe fn get_mut(&mut self, index: usize) -> &mut T {
        unsafe { (*self.slot_ptr(index)).assume_init_mut() }
    }

    /// # Safety
    /// The slot must hold a live value; afterwards it is uninitialized.
    #[inline(always)]
    pub unsafe fn drop_in_place(&mut self, index: usize) {
        unsafe { (*self.slot_ptr(index)).assume_init_drop() }
    }

    /// Exchanges the contents of two slots.
    ///
    /// # Safety
    /// Both slots must be within capacity. Initialization state moves with
    /// the contents.
    #[inline(always)]
    pub unsafe fn swap(&mut self, a: usize, b: usize) {
        if a != b {
            unsafe { std::ptr::swap_nonoverlapping(self.slot_ptr(a), self.slot_ptr(b), 1) }
        }
    }

    /// Moves the value in `from` into `to`; `from` becomes uninitialized.
    ///
    /// # Safety
    /// `from` must hold a live value and `to` must not.
    #[inline(always)]
    pub unsafe fn relocate(&mut self, from: usize, to: usize) {
        if from != to {
            unsafe { std::ptr::copy_nonoverlapping(self.slot_ptr(from), self.slot_ptr(to), 1) }
        }
    }

    fn push_page(&mut self) -> NonNull<MaybeUninit<T>> {
        let page = self.arena.allocate(self.layout).cast::<MaybeUninit<T>>();
        self.pages.push(page);
        tracing::trace!(
            page = self.pages.len() - 1,
            bytes = self.layout.size(),
            "paged store allocated page"
        );
        page
    }
}

impl<T> Drop for PagedStore<T> {
    fn drop(&mut self) {
        for page in self.pages.drain(..) {
            unsafe { self.arena.deallocate(page.cast(), self.layout) };
        }
    }
}

impl<T> std::fmt::Debug for PagedStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedStore")
            .field("page_len", &self.page_len())
            .field("pages", &self.pages.len())
            .finish()
    }
}

/// Sparse entry for an index that has no dense slot.
pub const ABSENT: u32 = u32::MAX;

/// Paged map from entity index to dense slot.
///
/// Pages are filled with [`ABSENT`] when allocated, so every addressable
/// entry is always initialized and the API is safe.
pub struct SparseIndex {
    store: PagedStore<u32>,
}

impl SparseIndex {
    pub fn new(arena: Rc<Arena>, page_len: usize) -> Result<Self> {
        Ok(Self {
            store: PagedStore::new(arena, page_len)?,
        })
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<u32> {
        let index = index as usize;
        if index >= self.store.capacity() {
            return None;
        }
        let slot = unsafe { *self.store.get(index) };
        (slot != ABSENT).then_some(slot)
    }

    #[inline]
    pub fn set(&mut self, index: u32, slot: u32) {
        debug_assert!(slot != ABSENT, "dense slot collides with the sparse sentinel");
        let index = index as usize;
        self.store.reserve_filled(index + 1, ABSENT);
        unsafe { *self.store.get_mut(index) = slot };
    }

    #[inline]
    pub fn clear(&mut self, index: u32) {
        let index = index as usize;
        if index < self.store.capacity() {
            unsafe { *self.store.get_mut(index) = ABSENT };
        }
    }

    /// Number of indices the currently allocated pages cover.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn page_count(&self) -> usize {
        self.store.page_count()
    }

    pub fn page_len(&self) -> usize {
        self.store.page_len()
    }

    /// Frees trailing pages above `len` indices. Entries there must already
    /// be [`ABSENT`].
    pub fn release(&mut self, len: usize) -> usize {
        self.store.release(len)
    }
}

impl std::fmt::Debug for SparseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseIndex")
            .field("page_len", &self.page_len())
            .field("pages", &self.page_count())
            .finish()
    }
}
