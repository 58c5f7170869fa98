// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It is used only for maze carving, fallback actions and reproducible evaluation.

/// A source of uniform values in `[0, 1)`.
///
/// Generation and the policy fallback only ever draw through this trait, so a
/// seeded [`Prng`] makes a run reproducible while any other implementation
/// (entropy-backed, scripted for tests) can be dropped in.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;

    /// Uniform index in `0..n`. Returns 0 when `n == 0`.
    fn index_below(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let i = (self.next_unit() * n as f64) as usize;
        i.min(n - 1)
    }

    /// In-place Fisher-Yates shuffle driven by this source.
    fn shuffle<T>(&mut self, items: &mut [T])
    where
        Self: Sized,
    {
        for i in (1..items.len()).rev() {
            let j = self.index_below(i + 1);
            items.swap(i, j);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    /// Seed from the wall clock. Used when no seed is configured.
    pub fn from_entropy() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x4D41_5A45);
        Self::new(nanos ^ 0xA5A5_5A5A_A5A5_5A5A)
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        low + self.index_below(high - low)
    }
}

impl RandomSource for Prng {
    #[inline]
    fn next_unit(&mut self) -> f64 {
        // 32 random bits over 2^32 is exact in f64 and strictly below 1.
        (self.next_u32() as f64) / 4_294_967_296.0
    }
}
