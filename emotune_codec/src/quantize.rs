// Quantization grid: 16th-note bins relative to a file's ticks per beat.
//
// `bin_size = ticks_per_beat / 4`, truncating. Encoder and decoder build the
// grid the same way, so quantize/dequantize round trips are stable. Rounding
// is half-to-even, done in integer arithmetic. A resolution below 4 ticks
// per beat would give an empty bin; the bin is floored at one tick.
//
// Clamping bins into a band is the caller's job.

/// Grid subdivisions per beat (16th notes in 4/4).
pub const STEPS_PER_BEAT: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    bin_size: u64,
}

impl Grid {
    pub fn new(ticks_per_beat: u16) -> Self {
        Grid {
            bin_size: (ticks_per_beat as u64 / STEPS_PER_BEAT).max(1),
        }
    }

    /// Ticks per bin.
    pub fn bin_size(self) -> u64 {
        self.bin_size
    }

    /// Nearest bin index for a tick span, ties to even.
    pub fn quantize(self, ticks: u64) -> u64 {
        let q = ticks / self.bin_size;
        let r = ticks % self.bin_size;
        match (2 * r).cmp(&self.bin_size) {
            std::cmp::Ordering::Less => q,
            std::cmp::Ordering::Greater => q + 1,
            std::cmp::Ordering::Equal => q + (q & 1),
        }
    }

    /// Tick span covered by `bins` bins.
    pub fn dequantize(self, bins: u64) -> u64 {
        bins.saturating_mul(self.bin_size)
    }
}
