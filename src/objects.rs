use crate::cache::ScriptRef;
use crate::instance::InstanceHandle;

/// One live object: which script drives it and where its state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectEntry {
    pub script: ScriptRef,
    pub instance: InstanceHandle,
}

/// Append-only object list with explicit amortized-doubling growth: capacity
/// starts at 1 and doubles on exhaustion, so existing entries and their
/// indices survive every growth event. This workload never removes entries;
/// teardown is whole-runtime.
#[derive(Default)]
pub struct ObjectTable {
    entries: Vec<ObjectEntry>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an object and returns its stable index.
    pub fn append(&mut self, script: ScriptRef, instance: InstanceHandle) -> usize {
        if self.entries.len() == self.entries.capacity() {
            let grown = if self.entries.capacity() == 0 { 1 } else { self.entries.capacity() * 2 };
            self.entries.reserve_exact(grown - self.entries.len());
        }
        let index = self.entries.len();
        self.entries.push(ObjectEntry { script, instance });
        index
    }

    pub fn at(&self, index: usize) -> ObjectEntry {
        self.entries[index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectEntry> {
        self.entries.iter()
    }
}
