use std::sync::atomic::{AtomicBool, Ordering};

/// Single-slot in-flight flag: a second caller is turned away instead of queued.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    busy: AtomicBool,
}

impl InFlight {
    pub(crate) fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { busy: &self.busy })
    }

    pub(crate) fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Clears the flag when dropped, on success, error or cancellation alike.
#[derive(Debug)]
pub(crate) struct InFlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
