//! Per-class sync leases.
//!
//! At most one sync per feature class runs at a time. A second trigger for a
//! class that is already syncing is rejected rather than queued.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use greenway_core::FeatureClass;
use log::debug;

use super::SyncError;

/// Registry of the classes currently being synced.
#[derive(Debug, Clone, Default)]
pub struct SyncLeases {
    active: Arc<Mutex<HashSet<FeatureClass>>>,
}

impl SyncLeases {
    /// Take the lease for `class`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InProgress`] when the lease is already held.
    ///
    /// ```
    /// use greenway_core::FeatureClass;
    /// use greenway_data::{SyncError, SyncLeases};
    ///
    /// let leases = SyncLeases::default();
    /// let held = leases.try_acquire(FeatureClass::Trails).expect("lease is free");
    /// assert!(matches!(
    ///     leases.try_acquire(FeatureClass::Trails),
    ///     Err(SyncError::InProgress { .. })
    /// ));
    /// drop(held);
    /// assert!(leases.try_acquire(FeatureClass::Trails).is_ok());
    /// ```
    pub fn try_acquire(&self, class: FeatureClass) -> Result<SyncLease, SyncError> {
        if !lock(&self.active).insert(class) {
            return Err(SyncError::InProgress { class });
        }
        debug!("acquired {class} sync lease");
        Ok(SyncLease {
            class,
            active: Arc::clone(&self.active),
        })
    }

    /// Whether a sync of `class` is running.
    #[must_use]
    pub fn is_held(&self, class: FeatureClass) -> bool {
        lock(&self.active).contains(&class)
    }
}

fn lock(active: &Mutex<HashSet<FeatureClass>>) -> MutexGuard<'_, HashSet<FeatureClass>> {
    // The set stays consistent even if a holder panicked.
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Guard releasing its class when dropped.
#[derive(Debug)]
#[must_use = "the lease is released as soon as it is dropped"]
pub struct SyncLease {
    class: FeatureClass,
    active: Arc<Mutex<HashSet<FeatureClass>>>,
}

impl SyncLease {
    /// The leased class.
    #[must_use]
    pub const fn class(&self) -> FeatureClass {
        self.class
    }
}

impl Drop for SyncLease {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.class);
        debug!("released {} sync lease", self.class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn classes_are_leased_independently() {
        let leases = SyncLeases::default();
        let _trails = leases.try_acquire(FeatureClass::Trails).expect("trails");
        let entrances = leases
            .try_acquire(FeatureClass::Entrances)
            .expect("entrances");
        assert_eq!(entrances.class(), FeatureClass::Entrances);
        assert!(leases.is_held(FeatureClass::Trails));
        assert!(!leases.is_held(FeatureClass::MileMarkers));
    }

    #[rstest]
    fn clones_share_the_registry() {
        let leases = SyncLeases::default();
        let clone = leases.clone();
        let _held = leases.try_acquire(FeatureClass::MileMarkers).expect("lease");
        assert!(matches!(
            clone.try_acquire(FeatureClass::MileMarkers),
            Err(SyncError::InProgress {
                class: FeatureClass::MileMarkers
            })
        ));
    }

    #[rstest]
    fn lease_is_released_when_a_holder_panics() {
        let leases = SyncLeases::default();
        let moved = leases.clone();
        let outcome = std::thread::spawn(move || {
            let _lease = moved.try_acquire(FeatureClass::Trails).expect("lease");
            panic!("sync worker failed");
        })
        .join();
        assert!(outcome.is_err());
        assert!(!leases.is_held(FeatureClass::Trails));
    }
}
