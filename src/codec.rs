//! Conversion between user-facing intensities and device power units.

/// Largest relative power value the device accepts. Hard device limit.
pub const LEVEL_MAX: u16 = 1000;

/// Converts between floating intensities and the light's integer units.
///
/// The light takes relative power as integers in `[0, 1000]`; user-facing
/// values are floats scaled by a configured multiplier (percent values with a
/// multiplier of 10.0, in the common setup). Encoding rounds and saturates,
/// so `decode(encode(v))` is only an approximate inverse inside the unclamped
/// range.
#[derive(Debug, Clone, Copy)]
pub struct ValueCodec {
    scale: f64,
}

impl ValueCodec {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    /// Encode an intensity into device units, saturating at the range bounds.
    pub fn encode(&self, intensity: f64) -> u16 {
        (intensity * self.scale)
            .round()
            .clamp(0.0, f64::from(LEVEL_MAX)) as u16
    }

    /// Decode a raw device value back into an intensity.
    pub fn decode(&self, raw: i64) -> f64 {
        raw as f64 / self.scale
    }
}
