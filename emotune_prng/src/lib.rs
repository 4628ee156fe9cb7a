// Deterministic pseudo-random stream for token sampling.
//
// xoshiro256++ (Blackman & Vigna, 2019) seeded through SplitMix64. The
// decoding controller draws exactly one uniform value per sampled token from
// a `SampleRng`, so a run is reproducible from its seed and the scorer's
// outputs alone. Batch generation gives every request its own `SampleRng`;
// streams are never shared between requests.
//
// Only integer operations feed the generator state. Floating point appears
// solely when converting an output word to a unit-interval value.

/// Xoshiro256++ generator driving the categorical sample in each decode step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleRng {
    s: [u64; 4],
}

impl SampleRng {
    /// Expand a `u64` seed into the 256-bit state. Equal seeds give equal
    /// streams on every platform.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform `f64` in [0, 1) built from the top 53 bits of one output word.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Derive a seed for an independent child stream. Used when a caller
    /// needs per-request seeds but only supplied one master seed.
    pub fn next_seed(&mut self) -> u64 {
        self.next_u64()
    }

    /// Draw an index from a categorical distribution.
    ///
    /// `weights` need not be normalized, but must be finite and
    /// non-negative. Returns `None` when the total weight is zero or the
    /// slice is empty. Consumes exactly one output word otherwise.
    pub fn sample_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().sum();
        if weights.is_empty() || total <= 0.0 || !total.is_finite() {
            return None;
        }

        let target = self.next_f64() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (i, &w) in weights.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            cumulative += w;
            last_positive = Some(i);
            if cumulative > target {
                return Some(i);
            }
        }
        // Rounding can leave `cumulative` a hair below `target`.
        last_positive
    }
}

/// SplitMix64 step, used only to expand the seed.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
