//! Per-entity in-flight guard
//!
//! Serializes writes to one entity: while a call for a key is in flight,
//! further requests only move the desired target. When the call settles the
//! guard says whether one follow-up write is needed to reach the latest
//! target, or whether the key is idle again.
//!
//! ```text
//! Idle ──begin──► Pending{in_flight, target} ──settle(target reached)──► Idle
//!                   │  ▲
//!                   │  └── begin (coalesced: target updated)
//!                   └──── settle(target differs) ──► Pending{in_flight: target}
//! abandon: Pending ──► Idle
//! ```

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Guard state for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState<V> {
    /// No call in flight
    Idle,
    /// A call carrying `in_flight` is running; `target` is the latest request
    Pending {
        /// Value sent by the running call
        in_flight: V,
        /// Value most recently requested
        target: V,
    },
}

/// Result of asking to start a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Key was idle; caller must issue the call
    Started,
    /// A call is already running; the request was folded into its target
    Coalesced,
}

/// Result of a successful call settling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement<V> {
    /// Confirmed value matches the target; key is idle
    Done,
    /// Target moved while in flight; caller must send this value next
    FollowUp(V),
}

/// In-flight guard keyed by entity id
#[derive(Debug)]
pub struct InFlightGuard<K, V>
where
    K: Eq + Hash,
{
    pending: DashMap<K, (V, V)>,
}

impl<K, V> InFlightGuard<K, V>
where
    K: Eq + Hash + Copy + Debug,
    V: Copy + PartialEq + Debug,
{
    /// Create an empty guard
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Request a write of `target` for `key`
    pub fn begin(&self, key: K, target: V) -> Admission {
        match self.pending.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert((target, target));
                Admission::Started
            }
            Entry::Occupied(mut slot) => {
                slot.get_mut().1 = target;
                tracing::debug!(?key, ?target, "write coalesced into in-flight call");
                Admission::Coalesced
            }
        }
    }

    /// Report that the in-flight call succeeded with `confirmed`
    pub fn settle(&self, key: K, confirmed: V) -> Settlement<V> {
        match self.pending.entry(key) {
            Entry::Occupied(mut slot) => {
                let target = slot.get().1;
                if target == confirmed {
                    slot.remove();
                    Settlement::Done
                } else {
                    slot.get_mut().0 = target;
                    Settlement::FollowUp(target)
                }
            }
            Entry::Vacant(_) => {
                tracing::warn!(?key, "settle on idle key");
                Settlement::Done
            }
        }
    }

    /// Drop the key after a failed call; coalesced requests are discarded
    pub fn abandon(&self, key: K) {
        self.pending.remove(&key);
    }

    /// Current state of a key
    #[must_use]
    pub fn state(&self, key: K) -> GuardState<V> {
        self.pending
            .get(&key)
            .map_or(GuardState::Idle, |entry| {
                let (in_flight, target) = *entry.value();
                GuardState::Pending { in_flight, target }
            })
    }

    /// Whether a call is in flight for `key`
    #[inline]
    #[must_use]
    pub fn is_pending(&self, key: K) -> bool {
        self.pending.contains_key(&key)
    }

    /// Number of keys with a call in flight
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl<K, V> Default for InFlightGuard<K, V>
where
    K: Eq + Hash + Copy + Debug,
    V: Copy + PartialEq + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn begin_on_idle_starts() {
        let guard: InFlightGuard<u32, bool> = InFlightGuard::new();
        assert_eq!(guard.begin(1, true), Admission::Started);
        assert_eq!(
            guard.state(1),
            GuardState::Pending {
                in_flight: true,
                target: true
            }
        );
    }

    #[test]
    fn begin_while_pending_coalesces() {
        let guard: InFlightGuard<u32, bool> = InFlightGuard::new();
        guard.begin(1, true);
        assert_eq!(guard.begin(1, false), Admission::Coalesced);
        assert_eq!(
            guard.state(1),
            GuardState::Pending {
                in_flight: true,
                target: false
            }
        );
    }

    #[test]
    fn settle_returns_to_idle_when_target_reached() {
        let guard: InFlightGuard<u32, bool> = InFlightGuard::new();
        guard.begin(1, true);
        assert_eq!(guard.settle(1, true), Settlement::Done);
        assert_eq!(guard.state(1), GuardState::Idle);
    }

    #[test]
    fn settle_requests_follow_up_when_target_moved() {
        let guard: InFlightGuard<u32, bool> = InFlightGuard::new();
        guard.begin(1, true);
        guard.begin(1, false);

        assert_eq!(guard.settle(1, true), Settlement::FollowUp(false));
        assert!(guard.is_pending(1));
        assert_eq!(guard.settle(1, false), Settlement::Done);
        assert!(!guard.is_pending(1));
    }

    #[test]
    fn abandon_discards_coalesced_requests() {
        let guard: InFlightGuard<u32, bool> = InFlightGuard::new();
        guard.begin(1, true);
        guard.begin(1, false);
        guard.abandon(1);

        assert_eq!(guard.state(1), GuardState::Idle);
        assert_eq!(guard.begin(1, true), Admission::Started);
    }

    #[test]
    fn keys_are_independent() {
        let guard: InFlightGuard<u32, bool> = InFlightGuard::new();
        guard.begin(1, true);
        assert_eq!(guard.begin(2, true), Admission::Started);
        assert_eq!(guard.pending_count(), 2);
    }

    proptest! {
        /// However requests interleave with settlements, the last value the
        /// guard lets through equals the last value requested.
        #[test]
        fn prop_last_request_wins(requests in proptest::collection::vec(any::<bool>(), 1..20)) {
            let guard: InFlightGuard<u32, bool> = InFlightGuard::new();
            let mut sent = Vec::new();

            for (i, value) in requests.iter().enumerate() {
                if guard.begin(7, *value) == Admission::Started {
                    sent.push(*value);
                }
                // Settle every other request while later ones keep arriving.
                if i % 2 == 1 {
                    let mut confirmed = *sent.last().unwrap();
                    while let Settlement::FollowUp(next) = guard.settle(7, confirmed) {
                        sent.push(next);
                        confirmed = next;
                    }
                }
            }
            if let GuardState::Pending { in_flight, .. } = guard.state(7) {
                let mut confirmed = in_flight;
                while let Settlement::FollowUp(next) = guard.settle(7, confirmed) {
                    sent.push(next);
                    confirmed = next;
                }
            }

            prop_assert_eq!(sent.last().copied(), requests.last().copied());
            prop_assert!(!guard.is_pending(7));
        }
    }
}
