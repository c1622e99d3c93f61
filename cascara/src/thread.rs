//! Java thread descriptors and the process-wide thread table.
//! A thread owns its frame stack outright; the table records ids and trace
//! flags behind a mutex, written on thread create/exit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use cascara_base::id::ThreadId;

use crate::frame::FrameStack;

pub struct JavaThread {
    pub id: ThreadId,
    pub frames: FrameStack,
    pub trace: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub trace: bool,
}

pub struct ThreadTable {
    table: Mutex<HashMap<ThreadId, ThreadInfo>>,
    next_id: AtomicU32,
}
impl ThreadTable {
    #[must_use]
    pub fn new() -> ThreadTable {
        ThreadTable {
            table: Mutex::new(HashMap::new()),
            // The main thread gets id 1
            next_id: AtomicU32::new(1),
        }
    }

    /// Register a new thread and hand back its descriptor.
    pub fn create(&self, trace: bool, max_frame_depth: usize) -> JavaThread {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.table
            .lock()
            .unwrap()
            .insert(id, ThreadInfo { id, trace });
        JavaThread {
            id,
            frames: FrameStack::new(max_frame_depth),
            trace,
        }
    }

    pub fn remove(&self, id: ThreadId) {
        self.table.lock().unwrap().remove(&id);
    }

    #[must_use]
    pub fn info(&self, id: ThreadId) -> Option<ThreadInfo> {
        self.table.lock().unwrap().get(&id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.lock().unwrap().is_empty()
    }
}
impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ThreadTable;

    #[test]
    fn ids_start_at_one_and_increment() {
        let table = ThreadTable::new();
        let main = table.create(false, 16);
        let worker = table.create(true, 16);
        assert_eq!(main.id, 1);
        assert_eq!(worker.id, 2);
        assert_eq!(table.len(), 2);
        assert!(table.info(2).unwrap().trace);

        table.remove(1);
        assert_eq!(table.len(), 1);
        assert!(table.info(1).is_none());
    }
}
