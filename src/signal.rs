use crate::entity::Entity;
use crate::registry::Registry;
use std::rc::Rc;

/// Callback invoked with the registry that owns the pool and the affected ids.
pub type Listener = dyn Fn(&Registry, &[Entity]);

/// Handle returned by [`Signal::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection(u64);

/// Multi-subscriber broadcast behind a pool's add and remove notifications.
///
/// Listeners run synchronously in connection order. They receive a shared
/// borrow of the registry, so they can inspect any pool but not mutate one
/// while a notification is in flight.
#[derive(Default, Clone)]
pub struct Signal {
    next: u64,
    listeners: Vec<(Connection, Rc<Listener>)>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, listener: impl Fn(&Registry, &[Entity]) + 'static) -> Connection {
        self.connect_shared(Rc::new(listener))
    }

    /// Connects a listener the caller keeps a handle to, so it can later be
    /// removed by instance with [`disconnect_shared`](Self::disconnect_shared).
    pub fn connect_shared(&mut self, listener: Rc<Listener>) -> Connection {
        let connection = Connection(self.next);
        self.next += 1;
        self.listeners.push((connection, listener));
        connection
    }

    pub fn disconnect(&mut self, connection: Connection) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(c, _)| *c != connection);
        self.listeners.len() != before
    }

    /// Removes every connection of `listener`.
    pub fn disconnect_shared(&mut self, listener: &Rc<Listener>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(_, l)| !Rc::ptr_eq(l, listener));
        self.listeners.len() != before
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn emit(&self, registry: &Registry, ids: &[Entity]) {
        for (_, listener) in &self.listeners {
            listener(registry, ids);
        }
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
