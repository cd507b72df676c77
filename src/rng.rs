//! Deterministic uniform generator behind coalition sampling.
//!
//! A 32-bit linear congruential generator with the Numerical Recipes
//! constants (multiplier `0x19660D`, increment `0x3C6EF35F`). The float
//! seed is clamped into `[0, 1)` and scaled to the initial 32-bit state,
//! so two runs (or two implementations) seeded with the same float
//! produce the same draw sequence bit for bit.

const MULTIPLIER: u32 = 0x19660D;
const INCREMENT: u32 = 0x3C6EF35F;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Clamp an arbitrary seed into `[0, 1)` by taking `|seed| - floor(|seed|)`.
pub fn clamp_seed(seed: f64) -> f64 {
    seed.abs().fract()
}

/// Seeded linear congruential generator yielding uniform `f64` in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    /// Build a generator from a float seed; seeds outside `[0, 1)` are clamped.
    pub fn from_seed(seed: f64) -> Self {
        let state = (clamp_seed(seed) * TWO_POW_32) as u32;
        Self { state }
    }

    /// Next uniform draw in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        self.state as f64 / TWO_POW_32
    }
}
