use crate::subscription::{CategoryId, ListenerId, Subscription};
use fxhash::FxHashMap;
use std::sync::Arc;

/// Ordered, shareable view of one category's subscriptions.
pub(crate) type Snapshot = Arc<[Arc<Subscription>]>;

/// Subscriptions of a single category, keyed by listener address.
#[derive(Debug, Default)]
pub(crate) struct Roster {
    members: FxHashMap<usize, Arc<Subscription>>,
    generation: u64,
    ordered: Option<Snapshot>,
}

impl Roster {
    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn cached(&self) -> Option<Snapshot> {
        self.ordered.clone()
    }

    /// Members in subscribe order, ready to be sorted by priority.
    pub(crate) fn in_subscribe_order(&self) -> Vec<Arc<Subscription>> {
        let mut members: Vec<_> = self.members.values().cloned().collect();
        members.sort_unstable_by_key(|s| s.seq());
        members
    }

    fn touch(&mut self, generation: u64) {
        self.generation = generation;
        self.ordered = None;
    }
}

/// Registration of one listener allocation, across all of its categories.
#[derive(Debug)]
struct Identity {
    token: u64,
    subscriptions: usize,
}

/// Category -> listener address -> subscription.
///
/// A category present in the map always has at least one subscription.
/// Every mutation bumps a registry-wide generation counter so sorted orders
/// computed against stale state are never cached.
///
/// Each subscribed address carries a token issued when it entered its first
/// category and dropped when it leaves its last one. While the token lives the
/// registry holds the `Arc`, so the address cannot be reused; ids carrying an
/// older token therefore never match a newer listener.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    rosters: FxHashMap<CategoryId, Roster>,
    identities: FxHashMap<usize, Identity>,
    generation: u64,
}

impl Registry {
    const fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Inserts or replaces the subscription for its listener address.
    ///
    /// Returns the registration id and the replaced subscription, which the
    /// caller drops outside any lock.
    pub(crate) fn insert(
        &mut self,
        subscription: Subscription,
    ) -> (ListenerId, Option<Arc<Subscription>>) {
        let generation = self.next_generation();
        let category = subscription.category();
        let id = subscription.id();
        let subscription = Arc::new(subscription.with_seq(generation));

        let roster = self.rosters.entry(category).or_default();
        roster.touch(generation);
        let replaced = roster.members.insert(id.addr(), subscription);

        let identity = self
            .identities
            .entry(id.addr())
            .or_insert(Identity { token: generation, subscriptions: 0 });
        if replaced.is_none() {
            identity.subscriptions += 1;
        }
        (id.with_token(identity.token), replaced)
    }

    /// Address of the listener `id` refers to, if that registration is still live.
    fn resolve(&self, id: ListenerId) -> Option<usize> {
        let identity = self.identities.get(&id.addr())?;
        id.token().is_none_or(|token| token == identity.token).then_some(id.addr())
    }

    fn release(&mut self, addr: usize, count: usize) {
        if let Some(identity) = self.identities.get_mut(&addr) {
            identity.subscriptions = identity.subscriptions.saturating_sub(count);
            if identity.subscriptions == 0 {
                self.identities.remove(&addr);
            }
        }
    }

    pub(crate) fn remove(
        &mut self,
        category: CategoryId,
        id: ListenerId,
    ) -> Option<Arc<Subscription>> {
        let addr = self.resolve(id)?;
        let generation = self.next_generation();
        let roster = self.rosters.get_mut(&category)?;
        let removed = roster.members.remove(&addr)?;
        roster.touch(generation);
        if roster.members.is_empty() {
            self.rosters.remove(&category);
        }
        self.release(addr, 1);
        Some(removed)
    }

    /// Removes `id` from every category.
    pub(crate) fn remove_listener(&mut self, id: ListenerId) -> Vec<Arc<Subscription>> {
        let Some(addr) = self.resolve(id) else {
            return Vec::new();
        };
        let generation = self.next_generation();
        let mut removed = Vec::new();
        self.rosters.retain(|_, roster| {
            if let Some(subscription) = roster.members.remove(&addr) {
                roster.touch(generation);
                removed.push(subscription);
            }
            !roster.members.is_empty()
        });
        self.identities.remove(&addr);
        removed
    }

    pub(crate) fn remove_category(&mut self, category: CategoryId) -> Option<Roster> {
        let roster = self.rosters.remove(&category)?;
        self.next_generation();
        for &addr in roster.members.keys() {
            self.release(addr, 1);
        }
        Some(roster)
    }

    pub(crate) fn clear(&mut self) -> FxHashMap<CategoryId, Roster> {
        self.next_generation();
        self.identities.clear();
        std::mem::take(&mut self.rosters)
    }

    pub(crate) fn get(&self, category: CategoryId) -> Option<&Roster> {
        self.rosters.get(&category)
    }

    pub(crate) fn contains_category(&self, category: CategoryId) -> bool {
        self.rosters.contains_key(&category)
    }

    pub(crate) fn contains(&self, category: CategoryId, id: ListenerId) -> bool {
        self.resolve(id).is_some_and(|addr| {
            self.rosters.get(&category).is_some_and(|roster| roster.members.contains_key(&addr))
        })
    }

    pub(crate) fn category_count(&self) -> usize {
        self.rosters.len()
    }

    /// Stores a sorted order, unless the category changed since `generation`.
    pub(crate) fn cache_order(
        &mut self,
        category: CategoryId,
        generation: u64,
        ordered: Snapshot,
    ) -> bool {
        match self.rosters.get_mut(&category) {
            Some(roster) if roster.generation == generation => {
                roster.ordered = Some(ordered);
                true
            },
            _ => false,
        }
    }

    /// Drops every cached order, e.g. after the comparator changed.
    pub(crate) fn invalidate_orders(&mut self) {
        let generation = self.next_generation();
        for roster in self.rosters.values_mut() {
            roster.touch(generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Probe: Send + Sync {}
    struct Unit;
    impl Probe for Unit {}

    fn probe() -> Arc<dyn Probe> {
        Arc::new(Unit)
    }

    fn category() -> CategoryId {
        CategoryId::of::<dyn Probe>()
    }

    #[test]
    fn test_insert_creates_category_lazily() {
        let mut registry = Registry::default();
        assert!(!registry.contains_category(category()));

        let listener = probe();
        registry.insert(Subscription::new::<dyn Probe>(listener.clone(), 0));

        assert!(registry.contains_category(category()));
        assert!(registry.contains(category(), ListenerId::of(&listener)));
    }

    #[test]
    fn test_reinsert_replaces_and_moves_to_end() {
        let mut registry = Registry::default();
        let a = probe();
        let b = probe();

        registry.insert(Subscription::new::<dyn Probe>(a.clone(), 0));
        registry.insert(Subscription::new::<dyn Probe>(b.clone(), 0));
        let (_, replaced) = registry.insert(Subscription::new::<dyn Probe>(a.clone(), 5));

        assert_eq!(replaced.map(|s| s.priority()), Some(0));
        let roster = registry.get(category()).unwrap();
        assert_eq!(roster.len(), 2);

        let order: Vec<_> = roster.in_subscribe_order().iter().map(|s| s.id()).collect();
        assert_eq!(order, vec![ListenerId::of(&b), ListenerId::of(&a)]);
    }

    #[test]
    fn test_removing_last_member_drops_category() {
        let mut registry = Registry::default();
        let a = probe();
        registry.insert(Subscription::new::<dyn Probe>(a.clone(), 0));

        assert!(registry.remove(category(), ListenerId::of(&a)).is_some());
        assert!(!registry.contains_category(category()));
        assert!(registry.remove(category(), ListenerId::of(&a)).is_none());
        assert_eq!(registry.category_count(), 0);
    }

    #[test]
    fn test_stale_order_is_not_cached() {
        let mut registry = Registry::default();
        let a = probe();
        registry.insert(Subscription::new::<dyn Probe>(a.clone(), 0));

        let roster = registry.get(category()).unwrap();
        let generation = roster.generation();
        let snapshot: Snapshot = roster.in_subscribe_order().into();

        registry.insert(Subscription::new::<dyn Probe>(probe(), 0));
        assert!(!registry.cache_order(category(), generation, snapshot));
        assert!(registry.get(category()).unwrap().cached().is_none());

        let roster = registry.get(category()).unwrap();
        let generation = roster.generation();
        let snapshot: Snapshot = roster.in_subscribe_order().into();
        assert!(registry.cache_order(category(), generation, snapshot));
        assert!(registry.get(category()).unwrap().cached().is_some());

        registry.invalidate_orders();
        assert!(registry.get(category()).unwrap().cached().is_none());
    }

    trait Other: Send + Sync {}
    impl Other for Unit {}

    #[test]
    fn test_token_survives_until_last_category_leaves() {
        let mut registry = Registry::default();
        let unit = Arc::new(Unit);
        let (first, _) = registry.insert(Subscription::new::<dyn Probe>(unit.clone(), 0));
        let (second, _) = registry.insert(Subscription::new::<dyn Other>(unit.clone(), 0));
        assert_eq!(first, second);

        registry.remove(category(), first);
        assert!(registry.contains(CategoryId::of::<dyn Other>(), first));

        registry.remove(CategoryId::of::<dyn Other>(), first);
        let (fresh, _) = registry.insert(Subscription::new::<dyn Probe>(unit.clone(), 0));
        assert_ne!(fresh, first);
        assert!(!registry.contains(category(), first));
        assert!(registry.contains(category(), fresh));
        assert!(registry.contains(category(), ListenerId::of(&unit)));
        assert!(registry.remove(category(), first).is_none());
    }

    #[test]
    fn test_removed_category_releases_tokens() {
        let mut registry = Registry::default();
        let unit = Arc::new(Unit);
        let (old, _) = registry.insert(Subscription::new::<dyn Probe>(unit.clone(), 0));

        assert!(registry.remove_category(category()).is_some());
        let (new, _) = registry.insert(Subscription::new::<dyn Probe>(unit, 0));
        assert!(!registry.contains(category(), old));
        assert!(registry.remove_listener(old).is_empty());
        assert_eq!(registry.remove_listener(new).len(), 1);
    }
}
