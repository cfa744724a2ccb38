// WHY: reference data is replaced wholesale; readers clone an Arc under a short
// read lock and keep a consistent view for the rest of their call

use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Holder for an immutable value that can be atomically replaced
#[derive(Debug)]
pub struct SharedSnapshot<T> {
    current: RwLock<Arc<T>>,
}

impl<T> SharedSnapshot<T> {
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc(value: Arc<T>) -> Self {
        Self {
            current: RwLock::new(value),
        }
    }

    /// Current snapshot; stays valid even if a newer one is published meanwhile
    pub fn load(&self) -> Arc<T> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Swap in a fully built replacement, returning the previous snapshot
    pub fn publish(&self, value: T) -> Arc<T> {
        self.publish_arc(Arc::new(value))
    }

    pub fn publish_arc(&self, value: Arc<T>) -> Arc<T> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, value);
        info!("Published new {} snapshot", short_type_name::<T>());
        previous
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct Pair {
        left: u64,
        right: u64,
    }

    #[test]
    fn test_load_returns_published_value() {
        let snapshot = SharedSnapshot::new(1u32);
        assert_eq!(*snapshot.load(), 1);

        let previous = snapshot.publish(2);
        assert_eq!(*previous, 1);
        assert_eq!(*snapshot.load(), 2);
    }

    #[test]
    fn test_loaded_view_survives_publish() {
        let snapshot = SharedSnapshot::new(String::from("v1"));
        let view = snapshot.load();
        snapshot.publish(String::from("v2"));
        assert_eq!(view.as_str(), "v1");
        assert_eq!(snapshot.load().as_str(), "v2");
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let snapshot = Arc::new(SharedSnapshot::new(Pair { left: 0, right: 0 }));

        let writer = {
            let snapshot = Arc::clone(&snapshot);
            thread::spawn(move || {
                for i in 1..=500 {
                    snapshot.publish(Pair { left: i, right: i });
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = Arc::clone(&snapshot);
                thread::spawn(move || {
                    let mut last = 0;
                    for _ in 0..2_000 {
                        let view = snapshot.load();
                        assert_eq!(view.left, view.right);
                        assert!(view.left >= last, "snapshots never go backwards");
                        last = view.left;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(*snapshot.load(), Pair { left: 500, right: 500 });
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let snapshot = Arc::new(SharedSnapshot::new(7u8));
        let poisoner = Arc::clone(&snapshot);
        let _ = thread::spawn(move || {
            let _guard = poisoner.current.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(snapshot.current.is_poisoned());
        assert_eq!(*snapshot.load(), 7);
        snapshot.publish(8);
        assert_eq!(*snapshot.load(), 8);
    }
}
