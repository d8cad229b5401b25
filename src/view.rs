use crate::component::ComponentSet;
use crate::entity::Entity;
use crate::pool::ComponentPool;
use crate::registry::Registry;

/// Membership filter over a registry: ids present in every `include` pool
/// and absent from every `exclude` pool.
///
/// Iteration walks the smallest include pool and probes the others. With no
/// include set it walks every valid id. If any include pool does not exist
/// yet, nothing matches.
pub struct View<'r> {
    registry: &'r Registry,
    include: Vec<&'r dyn ComponentPool>,
    exclude: Vec<&'r dyn ComponentPool>,
    unmatched: bool,
}

impl Registry {
    /// Ids holding every component of the tuple `S`.
    pub fn view<S: ComponentSet>(&self) -> View<'_> {
        let mut view = View {
            registry: self,
            include: Vec::new(),
            exclude: Vec::new(),
            unmatched: false,
        };
        for &key in S::keys().as_ref() {
            match self.find_pool(key) {
                Some(pool) => view.include.push(pool),
                None => view.unmatched = true,
            }
        }
        view
    }

    /// Every valid id, to be narrowed with [`View::exclude`].
    pub fn view_all(&self) -> View<'_> {
        View {
            registry: self,
            include: Vec::new(),
            exclude: Vec::new(),
            unmatched: false,
        }
    }

    pub fn find_all_with<S: ComponentSet>(&self) -> Vec<Entity> {
        self.view::<S>().entities()
    }

    /// Valid ids holding none of the components of `S`.
    pub fn find_all_without<S: ComponentSet>(&self) -> Vec<Entity> {
        self.view_all().exclude::<S>().entities()
    }
}

impl<'r> View<'r> {
    /// Drops ids holding any component of the tuple `S`.
    pub fn exclude<S: ComponentSet>(mut self) -> Self {
        for &key in S::keys().as_ref() {
            // A missing pool excludes nothing.
            if let Some(pool) = self.registry.find_pool(key) {
                self.exclude.push(pool);
            }
        }
        self
    }

    pub fn contains(&self, id: Entity) -> bool {
        !self.unmatched
            && self.registry.is_valid(id)
            && self.include.iter().all(|pool| pool.contains(id))
            && !self.exclude.iter().any(|pool| pool.contains(id))
    }

    pub fn each(&self, mut f: impl FnMut(Entity)) {
        if self.unmatched {
            return;
        }
        let driver = self
            .include
            .iter()
            .enumerate()
            .min_by_key(|(_, pool)| pool.len())
            .map(|(i, _)| i);

        match driver {
            Some(driver) => {
                self.include[driver].for_each_entity(&mut |id| {
                    if self.matches_except(id, driver) {
                        f(id);
                    }
                });
            }
            None => {
                for id in self.registry.entities() {
                    if !self.exclude.iter().any(|pool| pool.contains(id)) {
                        f(id);
                    }
                }
            }
        }
    }

    pub fn entities(&self) -> Vec<Entity> {
        let mut out = Vec::new();
        self.each(|id| out.push(id));
        out
    }

    pub fn count(&self) -> usize {
        let mut count = 0;
        self.each(|_| count += 1);
        count
    }

    fn matches_except(&self, id: Entity, driver: usize) -> bool {
        self.registry.is_valid(id)
            && self
                .include
                .iter()
                .enumerate()
                .all(|(i, pool)| i == driver || pool.contains(id))
            && !self.exclude.iter().any(|pool| pool.contains(id))
    }
}
