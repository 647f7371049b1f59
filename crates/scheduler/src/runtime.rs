use std::sync::Arc;

use dashmap::DashMap;
use politecrawl_core_types::Host;

use crate::lane::HostQueue;

/// Host to queue map. Entries are created on first use and never removed.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: DashMap<Host, Arc<HostQueue>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The queue for `host`, created if this is the first task for it.
    pub fn queue_for(&self, host: &Host) -> Arc<HostQueue> {
        if let Some(queue) = self.queues.get(host) {
            return Arc::clone(queue.value());
        }
        self.queues
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostQueue::new(host.clone())))
            .clone()
    }

    pub fn get(&self, host: &Host) -> Option<Arc<HostQueue>> {
        self.queues.get(host).map(|queue| Arc::clone(queue.value()))
    }

    pub fn hosts(&self) -> Vec<Host> {
        let mut hosts: Vec<Host> = self.queues.iter().map(|entry| entry.key().clone()).collect();
        hosts.sort();
        hosts
    }

    /// Tasks waiting across all hosts, excluding the ones in flight.
    pub fn pending(&self) -> usize {
        self.queues.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn host(raw: &str) -> Host {
        Host::parse(raw).unwrap().1
    }

    #[test]
    fn one_queue_per_host() {
        let registry = QueueRegistry::new();
        let first = registry.queue_for(&host("http://example.com/a"));
        let second = registry.queue_for(&host("http://example.com/b?page=2"));
        let other = registry.queue_for(&host("http://example.com:8080/"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn concurrent_lookups_share_a_queue() {
        let registry = Arc::new(QueueRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.queue_for(&host("https://news.example.org/")))
            })
            .collect();
        let queues: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        assert!(queues.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }
}
