//! PCG32 pseudorandom number generator (PCG-XSH-RR).
//!
//! One generator is owned by each episode. Every random decision made
//! while assembling a scene draws from it in a fixed order, so the same
//! (seed, params) pair always yields bit-identical placements.

const MULTIPLIER: u64 = 6_364_136_223_846_793_005;

#[derive(Debug, Clone)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    pub fn new(seed: u64, seq: u64) -> Self {
        let inc = (seq << 1) | 1;
        let mut rng = Pcg32 { state: 0, inc };
        rng.advance();
        rng.state = rng.state.wrapping_add(seed);
        rng.advance();
        rng
    }

    fn advance(&mut self) {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(self.inc);
    }

    pub fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.advance();
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        (xorshifted >> rot) | (xorshifted << (rot.wrapping_neg() & 31))
    }

    /// Uniform in [0, 1).
    pub fn next_float(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }

    /// Uniform integer in [lo, hi] (inclusive).
    pub fn next_int(&mut self, lo: u32, hi: u32) -> u32 {
        lo + self.next_u32() % (hi - lo + 1)
    }

    /// Uniform in [lo, hi). Consumes exactly one draw, even when lo == hi.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_float() * (hi - lo)
    }

    /// Pick one element uniformly. Returns None (and draws nothing) on
    /// an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.next_int(0, items.len() as u32 - 1) as usize;
        items.get(idx)
    }

    /// Normal sample via Box-Muller. Always consumes two draws.
    pub fn next_gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        // 1 - u keeps the log argument in (0, 1].
        let u1 = 1.0 - self.next_float();
        let u2 = self.next_float();
        let mag = (-2.0 * u1.ln()).sqrt();
        mean + std_dev * mag * (std::f64::consts::TAU * u2).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_values() {
        let mut rng = Pcg32::new(42, 54);
        let expected: [u32; 5] = [
            0xa15c02b7, 0x7b47f409, 0xba1d3330, 0x83d2f293,
            0xbfa4784b,
        ];
        for exp in expected {
            assert_eq!(rng.next_u32(), exp);
        }
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = Pcg32::new(7, 0);
        for _ in 0..1000 {
            let v = rng.uniform(-0.25, 0.75);
            assert!((-0.25..0.75).contains(&v));
        }
    }

    #[test]
    fn degenerate_uniform_still_draws() {
        let mut a = Pcg32::new(3, 0);
        let mut b = Pcg32::new(3, 0);
        assert_eq!(a.uniform(0.5, 0.5), 0.5);
        b.next_u32();
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn choose_covers_all_items() {
        let mut rng = Pcg32::new(11, 0);
        let items = ["a", "b", "c"];
        let mut seen = [false; 3];
        for _ in 0..200 {
            let pick = rng.choose(&items).unwrap();
            let idx = items.iter().position(|x| x == pick).unwrap();
            seen[idx] = true;
        }
        assert!(seen.iter().all(|s| *s));
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
    }

    #[test]
    fn gaussian_is_centered() {
        let mut rng = Pcg32::new(5, 0);
        let n = 4000;
        let mean: f64 = (0..n).map(|_| rng.next_gaussian(1.0, 0.5)).sum::<f64>() / n as f64;
        assert!((mean - 1.0).abs() < 0.05, "mean was {mean}");
    }
}
