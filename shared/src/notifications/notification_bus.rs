use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

/// Handle returned by [`NotificationBus::subscribe`], used to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct ListenerTable {
    next_id: u64,
    listeners: HashMap<TypeId, Vec<(ListenerId, Listener)>>,
}

/// Typed publish / subscribe hub shared between a session's components.
///
/// Listeners are keyed by the notification's type. Publishing clones the
/// listener list before invoking, so a listener may subscribe or unsubscribe
/// (or publish again) from inside its callback.
pub struct NotificationBus {
    table: Mutex<ListenerTable>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(ListenerTable {
                next_id: 0,
                listeners: HashMap::new(),
            }),
        }
    }

    pub fn subscribe<T: Any>(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let erased: Listener = Arc::new(move |notification: &dyn Any| {
            if let Some(typed) = notification.downcast_ref::<T>() {
                listener(typed);
            }
        });

        let mut table = self.lock();
        let id = ListenerId(table.next_id);
        table.next_id += 1;
        table
            .listeners
            .entry(TypeId::of::<T>())
            .or_default()
            .push((id, erased));
        id
    }

    /// Returns whether a listener was removed
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut table = self.lock();
        for listeners in table.listeners.values_mut() {
            if let Some(index) = listeners.iter().position(|(listener_id, _)| *listener_id == id) {
                listeners.remove(index);
                return true;
            }
        }
        false
    }

    pub fn publish<T: Any>(&self, notification: &T) {
        let listeners: Vec<Listener> = {
            let table = self.lock();
            match table.listeners.get(&TypeId::of::<T>()) {
                Some(listeners) => listeners.iter().map(|(_, listener)| listener.clone()).collect(),
                None => return,
            }
        };

        for listener in listeners {
            listener(notification);
        }
    }

    pub fn listener_count<T: Any>(&self) -> usize {
        self.lock()
            .listeners
            .get(&TypeId::of::<T>())
            .map_or(0, |listeners| listeners.len())
    }

    // a listener that panicked leaves the table intact, so poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, ListenerTable> {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}
