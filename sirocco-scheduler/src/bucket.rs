use crate::Registration;

/// One slot of the timing wheel.
///
/// Only the worker thread touches buckets, so no synchronisation is needed.
#[derive(Debug, Default)]
pub(crate) struct Bucket {
    registrations: Vec<Registration>,
}

/// Outcome of executing one bucket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expiry {
    /// Actions that ran.
    pub fired: usize,
    /// Registrations that left the wheel for good (fired one-shots and cancellations).
    pub retired: usize,
}

impl Bucket {
    pub(crate) fn add(&mut self, registration: Registration) {
        self.registrations.push(registration);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Fires every due registration, counts down the others, and moves fired
    /// repeating registrations into `reschedule`.
    ///
    /// `now` is the elapsed time of the current tick in nanoseconds.
    pub(crate) fn execute(&mut self, now: u64, reschedule: &mut Vec<Registration>) -> Expiry {
        let mut expiry = Expiry::default();
        if self.registrations.is_empty() {
            return expiry;
        }

        let pending = std::mem::take(&mut self.registrations);
        for mut registration in pending {
            if registration.is_cancelled() {
                expiry.retired += 1;
                continue;
            }

            if registration.remaining_rounds > 0 {
                registration.remaining_rounds -= 1;
                self.registrations.push(registration);
                continue;
            }

            if registration.deadline > now {
                self.registrations.push(registration);
                continue;
            }

            registration.run();
            expiry.fired += 1;
            if registration.is_repeating() && !registration.is_cancelled() {
                reschedule.push(registration);
            } else {
                expiry.retired += 1;
            }
        }
        expiry
    }

    /// Removes every registration that has not been cancelled.
    pub(crate) fn drain_live(&mut self, out: &mut Vec<Registration>) {
        out.extend(self.registrations.drain(..).filter(|r| !r.is_cancelled()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cancelable, ScheduledAction};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>, deadline: u64, offset: u64) -> Registration {
        let c = Arc::clone(counter);
        Registration::new(
            deadline,
            offset,
            ScheduledAction::run(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            Cancelable::new(),
        )
    }

    #[test]
    fn test_due_one_shot_fires_and_leaves() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bucket = Bucket::default();
        bucket.add(counting(&counter, 5, 0));

        let mut reschedule = Vec::new();
        let expiry = bucket.execute(10, &mut reschedule);

        assert_eq!(expiry, Expiry { fired: 1, retired: 1 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bucket.len(), 0);
        assert!(reschedule.is_empty());
    }

    #[test]
    fn test_remaining_rounds_count_down() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bucket = Bucket::default();
        let mut registration = counting(&counter, 5, 0);
        registration.remaining_rounds = 2;
        bucket.add(registration);

        let mut reschedule = Vec::new();
        bucket.execute(10, &mut reschedule);
        bucket.execute(10, &mut reschedule);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(bucket.len(), 1);

        bucket.execute(10, &mut reschedule);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bucket.len(), 0);
    }

    #[test]
    fn test_repeating_moves_to_reschedule() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bucket = Bucket::default();
        bucket.add(counting(&counter, 0, 7));

        let mut reschedule = Vec::new();
        let expiry = bucket.execute(1, &mut reschedule);
        assert_eq!(expiry, Expiry { fired: 1, retired: 0 });
        assert_eq!(reschedule.len(), 1);
        assert_eq!(bucket.len(), 0);
    }

    #[test]
    fn test_cancelled_is_dropped_without_running() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bucket = Bucket::default();
        let registration = counting(&counter, 0, 0);
        registration.cancel();
        bucket.add(registration);
        bucket.add(counting(&counter, 0, 0));

        let mut reschedule = Vec::new();
        let expiry = bucket.execute(1, &mut reschedule);
        assert_eq!(expiry, Expiry { fired: 1, retired: 2 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drain_live_skips_cancelled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bucket = Bucket::default();
        bucket.add(counting(&counter, 100, 0));
        let cancelled = counting(&counter, 100, 0);
        cancelled.cancel();
        bucket.add(cancelled);

        let mut out = Vec::new();
        bucket.drain_live(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(bucket.len(), 0);
    }
}
