//! Which thread holds which project lock.
//!
//! Every thread records the project locks it holds, in acquisition order,
//! and the lock it is waiting for. Before a thread waits it follows the
//! chain holder -> awaited lock -> holder. If the chain comes back to a lock
//! the thread holds itself, the wait could only end in a timeout: the
//! projects depend on each other, and that is reported as a cycle.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Table {
    held: HashMap<ThreadId, Vec<String>>,
    waiting: HashMap<ThreadId, String>,
}

impl Table {
    fn holder(&self, name: &str) -> Option<ThreadId> {
        self.held
            .iter()
            .find(|(_, names)| names.iter().any(|n| n == name))
            .map(|(thread, _)| *thread)
    }
}

#[derive(Debug, Default)]
pub struct LockRegistry {
    table: Mutex<Table>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the current thread is about to wait for `name`.
    ///
    /// Returns the cycle, starting and ending with a lock this thread
    /// holds, when waiting would deadlock. Nothing is recorded then.
    pub fn wait_for(&self, name: &str) -> Option<Vec<String>> {
        let me = thread::current().id();
        let mut table = self.table.lock();

        let mut chain = vec![name.to_string()];
        let mut current = name.to_string();
        for _ in 0..=table.waiting.len() {
            let Some(holder) = table.holder(&current) else {
                break;
            };
            if holder == me {
                break;
            }
            let Some(next) = table.waiting.get(&holder).cloned() else {
                break;
            };
            if let Some(mine) = table.held.get(&me) {
                if let Some(pos) = mine.iter().position(|n| *n == next) {
                    let mut trail = mine[pos..].to_vec();
                    trail.extend(chain);
                    trail.push(next);
                    return Some(trail);
                }
            }
            chain.push(next.clone());
            current = next;
        }

        table.waiting.insert(me, name.to_string());
        None
    }

    /// The current thread stopped waiting, with or without the lock.
    pub fn stop_waiting(&self) {
        self.table.lock().waiting.remove(&thread::current().id());
    }

    pub fn acquired(&self, name: &str) {
        self.table
            .lock()
            .held
            .entry(thread::current().id())
            .or_default()
            .push(name.to_string());
    }

    pub fn released(&self, name: &str) {
        let me = thread::current().id();
        let mut table = self.table.lock();
        if let Some(names) = table.held.get_mut(&me) {
            if let Some(pos) = names.iter().rposition(|n| n == name) {
                names.remove(pos);
            }
            if names.is_empty() {
                table.held.remove(&me);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_free_lock_is_no_cycle() {
        let locks = LockRegistry::new();
        locks.acquired("a");
        assert_eq!(locks.wait_for("b"), None);
        locks.stop_waiting();
        locks.released("a");
        assert!(locks.table.lock().held.is_empty());
    }

    #[test]
    fn test_reentrant_acquire_is_no_cycle() {
        let locks = LockRegistry::new();
        locks.acquired("a");
        assert_eq!(locks.wait_for("a"), None);
        locks.stop_waiting();
        locks.acquired("a");
        locks.released("a");
        assert_eq!(locks.table.lock().holder("a"), Some(thread::current().id()));
    }

    #[test]
    fn test_waiting_on_each_other_is_a_cycle() {
        let locks = LockRegistry::new();
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            s.spawn(|| {
                let done_rx = done_rx;
                locks.acquired("a");
                assert_eq!(locks.wait_for("b"), None);
                ready_tx.send(()).unwrap();
                done_rx.recv().unwrap();
                locks.stop_waiting();
                locks.released("a");
            });

            ready_rx.recv().unwrap();
            locks.acquired("b");
            assert_eq!(
                locks.wait_for("a"),
                Some(vec!["b".to_string(), "a".to_string(), "b".to_string()])
            );
            locks.released("b");
            done_tx.send(()).unwrap();
        });
    }
}
