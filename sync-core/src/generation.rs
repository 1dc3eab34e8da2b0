//! Session generation counter.
//!
//! Exactly one sync loop is authorized at a time. Starting a loop allocates a
//! new generation, which implicitly invalidates every older one; stopping
//! bumps the counter without starting anything. A loop checks whether its
//! generation is still current before applying each snapshot.
//!
//! The counter is never exposed directly: [`SyncGeneration::begin`],
//! [`SyncGeneration::stop`] and [`SyncGeneration::is_current`] are the only
//! operations on it.

use std::sync::{Mutex, PoisonError};

/// Identifies one authorized sync loop run.
pub type Generation = u64;

/// Mutex-guarded generation counter shared between the loop and its controllers.
#[derive(Debug, Default)]
pub struct SyncGeneration {
    current: Mutex<Generation>,
}

impl SyncGeneration {
    /// Create a counter at generation zero (no loop authorized).
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorize a new loop, superseding any running one.
    ///
    /// Returns the generation the new loop must carry.
    pub fn begin(&self) -> Generation {
        self.bump()
    }

    /// Invalidate the running loop, if any.
    ///
    /// Does not wait for it: the loop observes the change after its
    /// in-flight long-poll returns.
    pub fn stop(&self) {
        self.bump();
    }

    /// True if `generation` is still the authorized one.
    pub fn is_current(&self, generation: Generation) -> bool {
        // The counter stays consistent even if a holder panicked.
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) == generation
    }

    fn bump(&self) -> Generation {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = current.wrapping_add(1);
        *current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn begin_authorizes_new_generation() {
        let generation = SyncGeneration::new();
        let g1 = generation.begin();
        assert!(generation.is_current(g1));
    }

    #[test]
    fn begin_supersedes_previous() {
        let generation = SyncGeneration::new();
        let g1 = generation.begin();
        let g2 = generation.begin();

        assert!(g2 > g1);
        assert!(!generation.is_current(g1));
        assert!(generation.is_current(g2));
    }

    #[test]
    fn stop_invalidates_current() {
        let generation = SyncGeneration::new();
        let g1 = generation.begin();
        generation.stop();
        assert!(!generation.is_current(g1));
    }

    #[test]
    fn restart_after_stop_is_current() {
        let generation = SyncGeneration::new();
        let g1 = generation.begin();
        generation.stop();
        let g2 = generation.begin();

        assert!(!generation.is_current(g1));
        assert!(generation.is_current(g2));
    }

    #[test]
    fn concurrent_begins_have_exactly_one_winner() {
        let generation = Arc::new(SyncGeneration::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generation = Arc::clone(&generation);
                thread::spawn(move || generation.begin())
            })
            .collect();

        let issued: Vec<Generation> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = issued.iter().filter(|g| generation.is_current(**g)).count();
        assert_eq!(winners, 1);
        assert!(generation.is_current(*issued.iter().max().unwrap()));
    }
}
