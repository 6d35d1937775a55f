/// Local handle to a sync entity in [`SyncEntities`](super::SyncEntities).
/// Keys are never reused within one store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(u64);

impl EntityKey {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}
