//! Optional process-wide detector.
//!
//! Library code takes a [`VendorDetector`] explicitly; this slot exists for
//! callers that want one shared instance without threading it through. The
//! lifecycle is explicit: [`install`] or [`get_or_init`] fill the slot,
//! [`reset`] empties it.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use once_cell::sync::Lazy;

use crate::detector::VendorDetector;

static GLOBAL_DETECTOR: Lazy<ArcSwapOption<VendorDetector>> = Lazy::new(ArcSwapOption::empty);

/// Replace the shared detector, returning the previous one.
pub fn install(detector: Arc<VendorDetector>) -> Option<Arc<VendorDetector>> {
    GLOBAL_DETECTOR.swap(Some(detector))
}

pub fn current() -> Option<Arc<VendorDetector>> {
    GLOBAL_DETECTOR.load_full()
}

/// Return the shared detector, building it with `init` if the slot is empty.
///
/// If two threads race on an empty slot, one `init` result wins and both
/// callers get it.
pub fn get_or_init(init: impl FnOnce() -> VendorDetector) -> Arc<VendorDetector> {
    if let Some(existing) = GLOBAL_DETECTOR.load_full() {
        return existing;
    }
    let candidate = Arc::new(init());
    let empty: Option<Arc<VendorDetector>> = None;
    let previous = GLOBAL_DETECTOR.compare_and_swap(&empty, Some(candidate.clone()));
    match &*previous {
        Some(winner) => winner.clone(),
        None => candidate,
    }
}

/// Empty the slot, returning what was there.
pub fn reset() -> Option<Arc<VendorDetector>> {
    GLOBAL_DETECTOR.swap(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SignatureStore, TextExtractor};

    fn build() -> VendorDetector {
        VendorDetector::new(Arc::new(SignatureStore::defaults()), TextExtractor::default())
    }

    // One test drives the whole lifecycle so parallel tests can't interleave
    // on the shared slot.
    #[test]
    fn lifecycle() {
        reset();
        assert!(current().is_none());

        let first = get_or_init(build);
        let again = get_or_init(|| panic!("slot already filled"));
        assert!(Arc::ptr_eq(&first, &again));

        let replacement = Arc::new(build());
        let previous = install(replacement.clone()).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert!(Arc::ptr_eq(&current().unwrap(), &replacement));

        assert!(reset().is_some());
        assert!(current().is_none());
    }
}
