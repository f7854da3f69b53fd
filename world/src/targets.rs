//! Authoritative storage for the targets currently on the board.

use std::{collections::BTreeMap, time::Duration};

use pool_tap_core::{ActiveTarget, AdmissionError, TargetId};

/// Owns every active target from admission until a hit, a sweep, or an explosion removes it.
///
/// Identifiers are allocated monotonically by the spawner, so key order is
/// spawn order.
#[derive(Clone, Debug, Default)]
pub(crate) struct ActiveTargets {
    entries: BTreeMap<TargetId, ActiveTarget>,
}

impl ActiveTargets {
    /// Creates an empty board.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a target, refusing identifiers that are already active.
    pub(crate) fn admit(&mut self, target: ActiveTarget) -> Result<(), AdmissionError> {
        if self.entries.contains_key(&target.id) {
            return Err(AdmissionError::DuplicateTarget);
        }
        let _ = self.entries.insert(target.id, target);
        Ok(())
    }

    /// Looks up an active target.
    pub(crate) fn get(&self, id: TargetId) -> Option<&ActiveTarget> {
        self.entries.get(&id)
    }

    /// Removes a target. Removing an absent identifier is a no-op.
    pub(crate) fn remove(&mut self, id: TargetId) -> Option<ActiveTarget> {
        self.entries.remove(&id)
    }

    /// Removes every target whose lifetime elapsed at `now`, in spawn order.
    pub(crate) fn sweep_expired(
        &mut self,
        now: Duration,
        base_lifetime: Duration,
    ) -> Vec<ActiveTarget> {
        let mut expired = Vec::new();
        self.entries.retain(|_, target| {
            if target.is_expired(now, base_lifetime) {
                expired.push(*target);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Removes every target, returning them in spawn order.
    pub(crate) fn clear(&mut self) -> Vec<ActiveTarget> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    /// Iterates over the active targets in spawn order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &ActiveTarget> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_tap_core::TargetCatalog;

    const BASE: Duration = Duration::from_millis(15_000);

    fn target(id: u64, velocity_factor: f32, spawned_ms: u64) -> ActiveTarget {
        ActiveTarget {
            id: TargetId::new(id),
            variant: TargetCatalog::positive()[0],
            horizontal_position: 0.4,
            velocity_factor,
            spawned_at: Duration::from_millis(spawned_ms),
        }
    }

    #[test]
    fn duplicate_identifiers_are_refused() {
        let mut targets = ActiveTargets::new();
        assert_eq!(targets.admit(target(1, 1.0, 0)), Ok(()));
        assert_eq!(
            targets.admit(target(1, 2.0, 500)),
            Err(AdmissionError::DuplicateTarget)
        );
        assert_eq!(targets.iter().count(), 1);
        assert_eq!(targets.get(TargetId::new(1)).map(|t| t.velocity_factor), Some(1.0));
    }

    #[test]
    fn removal_is_idempotent() {
        let mut targets = ActiveTargets::new();
        targets.admit(target(4, 1.0, 0)).expect("admit");

        assert!(targets.remove(TargetId::new(4)).is_some());
        assert!(targets.remove(TargetId::new(4)).is_none());
        assert!(targets.remove(TargetId::new(99)).is_none());
    }

    #[test]
    fn sweep_respects_velocity_scaled_lifetimes() {
        let mut targets = ActiveTargets::new();
        targets.admit(target(1, 3.0, 0)).expect("admit fast");
        targets.admit(target(2, 1.0, 0)).expect("admit slow");

        assert!(targets
            .sweep_expired(Duration::from_millis(4_999), BASE)
            .is_empty());

        let fast: Vec<TargetId> = targets
            .sweep_expired(Duration::from_millis(5_000), BASE)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(fast, vec![TargetId::new(1)]);

        assert!(targets
            .sweep_expired(Duration::from_millis(14_999), BASE)
            .is_empty());
        let slow: Vec<TargetId> = targets
            .sweep_expired(Duration::from_millis(15_000), BASE)
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(slow, vec![TargetId::new(2)]);
        assert_eq!(targets.iter().count(), 0);
    }

    #[test]
    fn clear_returns_targets_in_spawn_order() {
        let mut targets = ActiveTargets::new();
        for id in [7, 3, 5] {
            targets.admit(target(id, 1.0, 0)).expect("admit");
        }

        let cleared: Vec<u64> = targets.clear().into_iter().map(|t| t.id.get()).collect();
        assert_eq!(cleared, vec![3, 5, 7]);
        assert!(targets.clear().is_empty());
    }
}
