use rhai::{Dynamic, Map, INT};

/// Generational handle to one instance record. Handles are capability
/// tokens: the worker that allocated one passes it back opaquely and never
/// derives or enumerates them. The generation counter makes a handle from a
/// released slot detectably stale instead of silently aliasing a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceHandle {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    state: Option<Dynamic>,
}

/// Arena of per-object instance records, one store per worker.
///
/// Each record is a shared rhai map pre-populated with `worker_id` and
/// `instance_id` before any entry point runs. The shared wrapper is what lets
/// script mutations persist across cycles: every invocation receives a clone
/// of the shared value, not of the map.
#[derive(Default)]
pub struct InstanceStore {
    slots: Vec<Slot>,
    live: usize,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh instance record tagged with the owning worker and a
    /// worker-local sequential id, and returns its handle. Released slots are
    /// reused under a bumped generation.
    pub fn allocate(&mut self, worker_id: u64, instance_id: u64) -> InstanceHandle {
        let mut record = Map::new();
        record.insert("worker_id".into(), Dynamic::from(worker_id as INT));
        record.insert("instance_id".into(), Dynamic::from(instance_id as INT));
        let state = Dynamic::from(record).into_shared();

        let index = match self.slots.iter().position(|slot| slot.state.is_none()) {
            Some(free) => {
                self.slots[free].state = Some(state);
                free
            }
            None => {
                self.slots.push(Slot { generation: 0, state: Some(state) });
                self.slots.len() - 1
            }
        };
        self.live += 1;
        InstanceHandle { index: index as u32, generation: self.slots[index].generation }
    }

    /// The shared record behind `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was released. A stale handle is a programming
    /// error, not a recoverable condition.
    pub fn state(&self, handle: InstanceHandle) -> &Dynamic {
        let slot = self
            .slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation);
        match slot.and_then(|slot| slot.state.as_ref()) {
            Some(state) => state,
            None => panic!("stale instance handle {handle:?}"),
        }
    }

    /// Invalidates `handle` and frees its slot. Panics on a stale handle,
    /// like [`state`](Self::state).
    pub fn release(&mut self, handle: InstanceHandle) {
        let slot = match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.state.is_some() => slot,
            _ => panic!("stale instance handle {handle:?}"),
        };
        slot.state = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
    }

    /// Copies the current contents of a live record. Host-side only; entry
    /// points always go through the shared value.
    pub fn snapshot(&self, handle: InstanceHandle) -> Map {
        self.state(handle).read_lock::<Map>().map(|map| map.clone()).unwrap_or_default()
    }

    pub fn live(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_carry_worker_and_instance_ids() {
        let mut store = InstanceStore::new();
        let handle = store.allocate(3, 7);
        let record = store.snapshot(handle);
        assert_eq!(record.get("worker_id").and_then(|v| v.as_int().ok()), Some(3));
        assert_eq!(record.get("instance_id").and_then(|v| v.as_int().ok()), Some(7));
    }

    #[test]
    fn live_count_tracks_allocate_and_release() {
        let mut store = InstanceStore::new();
        let a = store.allocate(0, 0);
        let b = store.allocate(0, 1);
        assert_eq!(store.live(), 2);
        store.release(a);
        assert_eq!(store.live(), 1);
        store.release(b);
        assert_eq!(store.live(), 0);
    }

    #[test]
    fn released_slots_are_reused_with_a_new_generation() {
        let mut store = InstanceStore::new();
        let first = store.allocate(0, 0);
        store.release(first);
        let second = store.allocate(0, 1);
        assert_ne!(first, second, "reused slot must not revalidate the old handle");
        assert_eq!(store.snapshot(second).get("instance_id").and_then(|v| v.as_int().ok()), Some(1));
    }

    #[test]
    #[should_panic(expected = "stale instance handle")]
    fn reading_a_released_handle_panics() {
        let mut store = InstanceStore::new();
        let handle = store.allocate(0, 0);
        store.release(handle);
        let _ = store.state(handle);
    }

    #[test]
    #[should_panic(expected = "stale instance handle")]
    fn double_release_panics() {
        let mut store = InstanceStore::new();
        let handle = store.allocate(0, 0);
        store.release(handle);
        store.release(handle);
    }
}
