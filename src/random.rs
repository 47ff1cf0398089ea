use rand::rngs::{StdRng, ThreadRng};
use rand::Rng;

/// Source of the uniform draws used by content synthesis and image seeds.
pub trait RandomSource {
    /// Uniform draw in `[0, n)`; `0` when `n == 0`.
    fn below(&mut self, n: usize) -> usize;

    /// Uniform draw in `[low, high]`.
    fn between(&mut self, low: usize, high: usize) -> usize {
        low + self.below(high - low + 1)
    }
}

impl RandomSource for StdRng {
    fn below(&mut self, n: usize) -> usize {
        if n == 0 { 0 } else { self.gen_range(0..n) }
    }
}

impl RandomSource for ThreadRng {
    fn below(&mut self, n: usize) -> usize {
        if n == 0 { 0 } else { self.gen_range(0..n) }
    }
}

#[cfg(test)]
pub mod scripted {
    use super::RandomSource;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of draws (each reduced modulo `n`), then yields zeros.
    pub struct Scripted(VecDeque<usize>);

    impl Scripted {
        pub fn new(draws: impl IntoIterator<Item = usize>) -> Self { Self(draws.into_iter().collect()) }
    }

    impl RandomSource for Scripted {
        fn below(&mut self, n: usize) -> usize {
            if n == 0 { return 0; }
            self.0.pop_front().unwrap_or(0) % n
        }
    }
}
