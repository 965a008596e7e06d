//! Notification service (spec C10).
//!
//! Grounded on the `log::info!` call sites scattered through
//! `crates/disks` (`decrypt_partition`, `probe_devices`, …) generalized into
//! a single typed `Event` enum delivered to subscribers instead of only
//! going to the log — the redesign note in spec.md §9 ("replace the
//! bespoke listener list and per-attribute `Fire*` methods with a single
//! `notify(change)` entrypoint"). Delivery happens while the caller holds
//! the relevant device's read lock, so events for one partition arrive in a
//! total order (spec §5).

use ddm_types::{JobId, PartitionId};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DeviceAdded { device: PartitionId },
    DeviceRemoved { device: PartitionId },
    DeviceMediaChanged { device: PartitionId },
    PartitionInitialized { partition: PartitionId },
    PartitionMounted { partition: PartitionId },
    PartitionUnmounted { partition: PartitionId },
    PartitionChanged { partition: PartitionId },
    JobProgress { job: JobId, progress: f32 },
}

/// Holds a flat list of subscriber callbacks. The teacher never needed this
/// (its `log::info!` call sites have no listeners to notify, only a log
/// sink) so this is new plumbing, kept deliberately simple: no
/// subscribe/unsubscribe tokens, since nothing in this workspace removes a
/// subscriber once installed.
#[derive(Default)]
pub struct Notifier {
    subscribers: parking_lot::Mutex<Vec<Box<dyn Fn(&Event) + Send + Sync>>>,
}

impl Notifier {
    pub fn new() -> Self { Notifier { subscribers: parking_lot::Mutex::new(Vec::new()) } }

    pub fn subscribe<F: Fn(&Event) + Send + Sync + 'static>(&self, callback: F) {
        self.subscribers.lock().push(Box::new(callback));
    }

    pub fn publish(&self, event: Event) {
        info!("event: {:?}", event);
        for subscriber in self.subscribers.lock().iter() {
            subscriber(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn subscribers_receive_every_published_event() {
        let notifier = Notifier::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        notifier.subscribe(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        notifier.publish(Event::DeviceAdded { device: PartitionId(0) });
        notifier.publish(Event::DeviceMediaChanged { device: PartitionId(0) });

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
