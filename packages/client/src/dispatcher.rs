//! Named-channel publish/subscribe registry.
//!
//! Listeners are keyed by event name. Within one name they fire in
//! registration order; nothing is promised across names. The registry is
//! a cheap cloneable handle, so listeners may register or remove
//! listeners (including themselves) while an event is being emitted.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// An event that knows which channel it is published on.
pub trait NamedEvent {
    fn name(&self) -> &str;
}

/// Listener callback
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration<E> {
    id: ListenerId,
    once: bool,
    listener: Listener<E>,
}

struct Registry<E> {
    next_id: u64,
    channels: HashMap<String, Vec<Registration<E>>>,
}

pub struct EventDispatcher<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Clone for EventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        f.debug_struct("EventDispatcher")
            .field("channels", &registry.channels.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<E> EventDispatcher<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                channels: HashMap::new(),
            })),
        }
    }

    /// Register `listener` for every event published on `name`.
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(name.into(), false, Arc::new(listener))
    }

    /// Register `listener` for the next event published on `name` only.
    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(name.into(), true, Arc::new(listener))
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.lock();
        let mut removed = false;
        for registrations in registry.channels.values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
        }
        registry.channels.retain(|_, registrations| !registrations.is_empty());
        removed
    }

    /// Number of listeners currently registered on `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.lock().channels.get(name).map_or(0, Vec::len)
    }

    fn register(&self, name: String, once: bool, listener: Listener<E>) -> ListenerId {
        let mut registry = self.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry
            .channels
            .entry(name)
            .or_default()
            .push(Registration { id, once, listener });
        id
    }

    fn lock(&self) -> MutexGuard<'_, Registry<E>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: NamedEvent> EventDispatcher<E> {
    /// Call every listener registered on `event.name()`.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: &E) -> usize {
        let listeners: Vec<Listener<E>> = {
            let mut registry = self.lock();
            let Some(registrations) = registry.channels.get_mut(event.name()) else {
                return 0;
            };
            let listeners = registrations
                .iter()
                .map(|r| Arc::clone(&r.listener))
                .collect();
            registrations.retain(|r| !r.once);
            if registrations.is_empty() {
                registry.channels.remove(event.name());
            }
            listeners
        };

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug)]
    struct TestEvent {
        name: &'static str,
        value: u32,
    }

    impl NamedEvent for TestEvent {
        fn name(&self) -> &str {
            self.name
        }
    }

    #[test]
    fn test_emit_calls_listeners_in_registration_order() {
        // テスト項目: 同じイベント名のリスナーは登録順に呼ばれる
        // given (前提条件):
        let dispatcher = EventDispatcher::<TestEvent>::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let calls = calls.clone();
            dispatcher.on("tick", move |e: &TestEvent| {
                calls.lock().unwrap().push((label, e.value));
            });
        }

        // when (操作):
        let invoked = dispatcher.emit(&TestEvent {
            name: "tick",
            value: 7,
        });

        // then (期待する結果):
        assert_eq!(invoked, 3);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn test_emit_only_reaches_matching_name() {
        // テスト項目: 別名のイベントではリスナーが呼ばれない
        // given (前提条件):
        let dispatcher = EventDispatcher::<TestEvent>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        dispatcher.on("a", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // when (操作):
        let invoked = dispatcher.emit(&TestEvent { name: "b", value: 0 });

        // then (期待する結果):
        assert_eq!(invoked, 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_once_listener_fires_once() {
        // テスト項目: once で登録したリスナーは 1 回だけ呼ばれる
        // given (前提条件):
        let dispatcher = EventDispatcher::<TestEvent>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        dispatcher.once("connect", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // when (操作):
        dispatcher.emit(&TestEvent { name: "connect", value: 0 });
        dispatcher.emit(&TestEvent { name: "connect", value: 0 });

        // then (期待する結果):
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count("connect"), 0);
    }

    #[test]
    fn test_off_removes_listener() {
        // テスト項目: off で解除したリスナーは呼ばれなくなる
        // given (前提条件):
        let dispatcher = EventDispatcher::<TestEvent>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = dispatcher.on("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // when (操作):
        let removed = dispatcher.off(id);
        let removed_again = dispatcher.off(id);
        dispatcher.emit(&TestEvent { name: "count", value: 1 });

        // then (期待する結果):
        assert!(removed);
        assert!(!removed_again);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_can_register_during_emit() {
        // テスト項目: リスナー内から別のリスナーを登録してもデッドロックしない
        // given (前提条件):
        let dispatcher = EventDispatcher::<TestEvent>::new();
        let inner = dispatcher.clone();
        dispatcher.on("outer", move |_| {
            inner.on("late", |_| {});
        });

        // when (操作):
        dispatcher.emit(&TestEvent { name: "outer", value: 0 });

        // then (期待する結果):
        assert_eq!(dispatcher.listener_count("late"), 1);
    }
}
