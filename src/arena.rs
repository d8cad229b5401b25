use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::NonNull;

const CHUNK_SIZE: usize = 64 * 1024; // 64KB chunks
const CHUNK_ALIGN: usize = 16;

struct Chunk {
    data: NonNull<u8>,
    layout: Layout,
}

impl Chunk {
    fn new(size: usize, align: usize) -> Self {
        let layout = match Layout::from_size_align(size, align.max(CHUNK_ALIGN)) {
            Ok(layout) => layout,
            Err(_) => panic!("arena chunk of {size} bytes (align {align}) is not representable"),
        };
        let data = unsafe { std::alloc::alloc(layout) };
        match NonNull::new(data) {
            Some(data) => Self { data, layout },
            None => std::alloc::handle_alloc_error(layout),
        }
    }

    fn start(&self) -> usize {
        self.data.as_ptr() as usize
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        unsafe {
            std::alloc::dealloc(self.data.as_ptr(), self.layout);
        }
    }
}

/// Page allocator backing every paged store of a registry.
///
/// Pages are bump-allocated out of 64KB chunks. Freed pages go onto a
/// recycle list keyed by their layout and are handed out again before any
/// new chunk memory is touched. Chunk memory is only returned to the system
/// when the arena itself drops, so a page's address stays valid for as long
/// as its owner holds it.
///
/// Shared between a registry and its pools through `Rc<Arena>`.
pub struct Arena {
    chunks: RefCell<Vec<Chunk>>,
    ptr: Cell<usize>,
    end: Cell<usize>,
    recycled: RefCell<HashMap<Layout, Vec<NonNull<u8>>>>,
    live_pages: Cell<usize>,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            chunks: RefCell::new(Vec::new()),
            ptr: Cell::new(0),
            end: Cell::new(0),
            recycled: RefCell::new(HashMap::new()),
            live_pages: Cell::new(0),
        }
    }

    /// Allocates one page. Never fails: running out of memory aborts through
    /// `handle_alloc_error`.
    pub fn allocate(&self, layout: Layout) -> NonNull<u8> {
        debug_assert!(layout.size() != 0, "arena pages cannot be zero-sized");

        if let Some(page) = self
            .recycled
            .borrow_mut()
            .get_mut(&layout)
            .and_then(Vec::pop)
        {
            self.live_pages.set(self.live_pages.get() + 1);
            return page;
        }

        let page = match self.bump(layout) {
            Some(page) => page,
            None => {
                self.alloc_chunk(layout);
                match self.bump(layout) {
                    Some(page) => page,
                    // A fresh chunk is sized and aligned for `layout`.
                    None => std::alloc::handle_alloc_error(layout),
                }
            }
        };
        self.live_pages.set(self.live_pages.get() + 1);
        page
    }

    /// Returns a page for reuse by a later allocation of the same layout.
    ///
    /// # Safety
    /// `ptr` must come from `allocate(layout)` on this arena and must not be
    /// used afterwards.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.recycled
            .borrow_mut()
            .entry(layout)
            .or_default()
            .push(ptr);
        self.live_pages.set(self.live_pages.get() - 1);
    }

    /// Pages currently handed out.
    pub fn live_pages(&self) -> usize {
        self.live_pages.get()
    }

    /// Pages waiting on the recycle lists.
    pub fn recycled_pages(&self) -> usize {
        self.recycled.borrow().values().map(Vec::len).sum()
    }

    /// Bytes obtained from the system allocator so far.
    pub fn reserved_bytes(&self) -> usize {
        self.chunks.borrow().iter().map(|c| c.layout.size()).sum()
    }

    fn bump(&self, layout: Layout) -> Option<NonNull<u8>> {
        let ptr = self.ptr.get();
        if ptr == 0 {
            return None;
        }
        let aligned = ptr.checked_next_multiple_of(layout.align())?;
        let new_ptr = aligned.checked_add(layout.size())?;
        if new_ptr > self.end.get() {
            return None;
        }
        self.ptr.set(new_ptr);
        NonNull::new(aligned as *mut u8)
    }

    fn alloc_chunk(&self, layout: Layout) {
        let chunk = Chunk::new(layout.size().max(CHUNK_SIZE), layout.align());
        let start = chunk.start();
        let size = chunk.layout.size();
        tracing::trace!(bytes = size, "arena allocated chunk");

        self.ptr.set(start);
        self.end.set(start + size);
        self.chunks.borrow_mut().push(chunk);
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("chunks", &self.chunks.borrow().len())
            .field("reserved_bytes", &self.reserved_bytes())
            .field("live_pages", &self.live_pages())
            .field("recycled_pages", &self.recycled_pages())
            .finish()
    }
}
