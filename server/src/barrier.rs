//! Reusable N-party rendezvous gating the per-tick lockstep.

use std::sync::{Condvar, Mutex};

/// A rendezvous point for a fixed set of worker threads.
///
/// Every party blocks in [`TickBarrier::wait_vote`] until all of them have
/// arrived, then all are released together and the barrier resets for the
/// next cycle; it can be reused for any number of cycles. There is no
/// timeout: a party that never arrives leaves the rest blocked, which is
/// the intended way for a wedged worker to surface.
///
/// The rendezvous doubles as the halt agreement. Each party brings a halt
/// vote to the cycle; the votes are ORed while the cycle fills and every
/// party of that cycle receives the same aggregated decision, so either
/// all workers stop after the same tick or none do.
pub struct TickBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    condvar: Condvar,
}

#[derive(Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    halt_votes: bool,
    halt_decision: bool,
}

impl TickBarrier {
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "a barrier needs at least one party");
        Self {
            parties,
            state: Mutex::new(BarrierState::default()),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until all parties have arrived, then releases them together.
    pub fn wait(&self) {
        self.wait_vote(false);
    }

    /// Rendezvous carrying a halt vote. Returns true to every party of
    /// this cycle if any of them voted to halt.
    pub fn wait_vote(&self, halt: bool) -> bool {
        let mut state = self.state.lock().expect("tick barrier poisoned");
        state.halt_votes |= halt;
        state.arrived += 1;

        if state.arrived == self.parties {
            state.arrived = 0;
            state.halt_decision = state.halt_votes;
            state.halt_votes = false;
            state.generation = state.generation.wrapping_add(1);
            self.condvar.notify_all();
            state.halt_decision
        } else {
            let generation = state.generation;
            while state.generation == generation {
                state = self
                    .condvar
                    .wait(state)
                    .expect("tick barrier poisoned");
            }
            state.halt_decision
        }
    }

    /// How many times the barrier has released so far.
    pub fn cycles(&self) -> u64 {
        self.state.lock().expect("tick barrier poisoned").generation
    }

    pub fn parties(&self) -> usize {
        self.parties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_single_party_never_blocks() {
        let barrier = TickBarrier::new(1);
        for _ in 0..100 {
            assert!(!barrier.wait_vote(false));
        }
        assert_eq!(barrier.cycles(), 100);
    }

    #[test]
    fn test_all_parties_release_together() {
        let parties = 4;
        let cycles = 50;
        let barrier = Arc::new(TickBarrier::new(parties));
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..parties)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for cycle in 0..cycles {
                        counter.fetch_add(1, Ordering::SeqCst);
                        barrier.wait();
                        // Every party has contributed to this cycle by now.
                        assert!(counter.load(Ordering::SeqCst) >= (cycle + 1) * parties);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), parties * cycles);
        assert_eq!(barrier.cycles(), cycles as u64);
    }

    #[test]
    fn test_single_vote_halts_every_party() {
        let parties = 3;
        let barrier = Arc::new(TickBarrier::new(parties));

        let handles: Vec<_> = (0..parties)
            .map(|party| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    // Nobody votes on the first cycle, only party 0 on the second.
                    let first = barrier.wait_vote(false);
                    let second = barrier.wait_vote(party == 0);
                    (first, second)
                })
            })
            .collect();

        for handle in handles {
            let (first, second) = handle.join().unwrap();
            assert!(!first);
            assert!(second);
        }
    }

    #[test]
    fn test_votes_reset_between_cycles() {
        let barrier = TickBarrier::new(1);
        assert!(barrier.wait_vote(true));
        assert!(!barrier.wait_vote(false));
    }

    #[test]
    fn test_reuse_across_many_cycles() {
        let parties = 2;
        let cycles = 10_000u64;
        let barrier = Arc::new(TickBarrier::new(parties));

        let handles: Vec<_> = (0..parties)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    for _ in 0..cycles {
                        barrier.wait();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(barrier.cycles(), cycles);
    }
}
