//! Single-flight gate shared by every path that can start a pipeline run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use nd_core::TriggerKind;
use serde::Serialize;
use tracing::{debug, warn};

/// Proof of a successful acquisition. Only the ticket of the current holder
/// can free the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateTicket(u64);

/// Who holds the gate, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateHolder {
    pub trigger: TriggerKind,
    pub since: DateTime<Utc>,
}

#[derive(Debug)]
struct Held {
    ticket: GateTicket,
    holder: GateHolder,
}

#[derive(Debug, Default)]
pub struct ConcurrencyGate {
    state: Mutex<Option<Held>>,
    next_ticket: AtomicU64,
}

impl ConcurrencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Option<Held>> {
        // Critical sections only swap the Option, so poisoned state is still whole.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-blocking. `None` when the gate is already held, including by the
    /// same trigger path.
    pub fn acquire(&self, trigger: TriggerKind) -> Option<GateTicket> {
        let mut state = self.state();
        if let Some(held) = state.as_ref() {
            debug!(
                trigger = %trigger,
                holder = %held.holder.trigger,
                "Gate busy"
            );
            return None;
        }
        let ticket = GateTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        *state = Some(Held {
            ticket,
            holder: GateHolder {
                trigger,
                since: Utc::now(),
            },
        });
        Some(ticket)
    }

    /// Acquire and wrap the ticket in a guard that frees the gate when dropped.
    pub fn try_acquire(&self, trigger: TriggerKind) -> Option<GateGuard<'_>> {
        self.acquire(trigger).map(|ticket| GateGuard {
            gate: self,
            ticket: Some(ticket),
        })
    }

    /// Frees the gate if `ticket` belongs to the current holder. A stale or
    /// foreign ticket leaves the gate untouched and returns false.
    pub fn release(&self, ticket: GateTicket) -> bool {
        let mut state = self.state();
        match state.as_ref() {
            Some(held) if held.ticket == ticket => {
                *state = None;
                true
            }
            _ => {
                warn!(?ticket, "Ignoring release from a non-holder");
                false
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.state().is_some()
    }

    pub fn holder(&self) -> Option<GateHolder> {
        self.state().as_ref().map(|held| held.holder)
    }
}

/// Holds the gate until released or dropped, so every exit path of a run
/// (including unwinding and cancellation) frees it exactly once.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a ConcurrencyGate,
    ticket: Option<GateTicket>,
}

impl GateGuard<'_> {
    pub fn ticket(&self) -> Option<GateTicket> {
        self.ticket
    }

    pub fn release(mut self) -> bool {
        self.ticket.take().map_or(false, |ticket| self.gate.release(ticket))
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.gate.release(ticket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let gate = ConcurrencyGate::new();
        let ticket = gate.acquire(TriggerKind::Manual).unwrap();
        assert!(gate.acquire(TriggerKind::Scheduled).is_none());
        assert!(gate.acquire(TriggerKind::Manual).is_none());
        assert!(gate.release(ticket));
        assert!(gate.acquire(TriggerKind::Scheduled).is_some());
    }

    #[test]
    fn test_holder_reports_trigger() {
        let gate = ConcurrencyGate::new();
        assert!(gate.holder().is_none());
        let _guard = gate.try_acquire(TriggerKind::Scheduled).unwrap();
        assert_eq!(gate.holder().unwrap().trigger, TriggerKind::Scheduled);
        assert!(gate.is_held());
    }

    #[test]
    fn test_stale_release_does_not_free_new_holder() {
        let gate = ConcurrencyGate::new();
        let first = gate.acquire(TriggerKind::Manual).unwrap();
        assert!(gate.release(first));

        let second = gate.acquire(TriggerKind::Scheduled).unwrap();
        assert!(!gate.release(first));
        assert!(gate.is_held());
        assert!(gate.acquire(TriggerKind::Manual).is_none());
        assert!(gate.release(second));
        assert!(!gate.is_held());
    }

    #[test]
    fn test_release_on_free_gate_is_harmless() {
        let gate = ConcurrencyGate::new();
        let ticket = gate.acquire(TriggerKind::Manual).unwrap();
        assert!(gate.release(ticket));
        assert!(!gate.release(ticket));
        assert!(gate.acquire(TriggerKind::Manual).is_some());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let gate = ConcurrencyGate::new();
        {
            let _guard = gate.try_acquire(TriggerKind::Manual).unwrap();
            assert!(gate.try_acquire(TriggerKind::Scheduled).is_none());
        }
        assert!(!gate.is_held());
    }

    #[test]
    fn test_guard_explicit_release_happens_once() {
        let gate = ConcurrencyGate::new();
        let guard = gate.try_acquire(TriggerKind::Manual).unwrap();
        assert!(guard.release());
        let next = gate.try_acquire(TriggerKind::Scheduled).unwrap();
        assert!(gate.is_held());
        drop(next);
        assert!(!gate.is_held());
    }

    #[test]
    fn test_guard_released_when_panicking() {
        let gate = ConcurrencyGate::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = gate.try_acquire(TriggerKind::Manual).unwrap();
            panic!("stage blew up");
        }));
        assert!(result.is_err());
        assert!(!gate.is_held());
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let gate = Arc::new(ConcurrencyGate::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gate = Arc::clone(&gate);
                let winners = Arc::clone(&winners);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let trigger = if i % 2 == 0 { TriggerKind::Manual } else { TriggerKind::Scheduled };
                    barrier.wait();
                    if gate.acquire(trigger).is_some() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
