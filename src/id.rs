//! Cyclic ticket source for tagging pooled entities.

use parking_lot::Mutex;

/// Hands out `u32` ids in order. After `u32::MAX` the next call yields 0 and
/// the sequence resumes from 1. Safe to share across tasks.
#[derive(Debug, Default)]
pub struct IdGenerator {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    sn: u32,
    ended: bool,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u32 {
        let mut state = self.state.lock();
        if state.ended {
            state.ended = false;
            state.sn = 1;
            return 0;
        }
        let id = state.sn;
        if id == u32::MAX {
            state.ended = true;
        } else {
            state.sn = id + 1;
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_are_sequential_from_zero() {
        let generator = IdGenerator::new();
        for expected in 0..100u32 {
            assert_eq!(generator.next(), expected);
        }
    }

    #[test]
    fn wraps_to_zero_then_resumes_from_one() {
        let generator = IdGenerator::new();
        generator.state.lock().sn = u32::MAX - 1;
        assert_eq!(generator.next(), u32::MAX - 1);
        assert_eq!(generator.next(), u32::MAX);
        assert_eq!(generator.next(), 0);
        assert_eq!(generator.next(), 1);
        assert_eq!(generator.next(), 2);
    }

    #[test]
    fn concurrent_callers_never_share_an_id() {
        let generator = Arc::new(IdGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let generator = Arc::clone(&generator);
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| generator.next()).collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {id} was handed out twice");
            }
        }
        assert_eq!(seen.len(), 8 * 1000);
    }
}
