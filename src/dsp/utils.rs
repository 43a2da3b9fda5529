/// Floor used before taking logarithms of linear levels (-200 dBFS).
pub const DB_EPS: f32 = 1e-10;

/// Envelope values below this are flushed to zero to keep decays out of the
/// subnormal range.
pub const DENORMAL_FLOOR: f32 = 1e-20;

#[inline]
pub fn lin_to_db(x: f32) -> f32 {
    20.0 * x.max(DB_EPS).log10()
}

#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    (10.0f32).powf(db / 20.0)
}

/// One-pole smoothing coefficient for a time constant in milliseconds.
///
/// With `y = c * y + (1 - c) * x`, a step reaches `1 - 1/e` (~63.2%) of its
/// final value after exactly `time_ms`.
#[inline]
pub fn time_constant_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = time_ms * 0.001 * sample_rate;
    if samples <= 0.0 || !samples.is_finite() {
        return 0.0;
    }
    (-1.0 / samples).exp()
}

/// Asymmetric one-pole update: `attack` when the input rises above the state,
/// `release` otherwise.
#[inline]
pub fn ballistics(state: f32, input: f32, attack: f32, release: f32) -> f32 {
    let c = if input > state { attack } else { release };
    flush_denormal(c * state + (1.0 - c) * input)
}

#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_FLOOR {
        0.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_round_trip_points() {
        assert!((lin_to_db(1.0)).abs() < 1e-6);
        assert!((lin_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!((db_to_lin(-6.0206) - 0.5).abs() < 1e-4);
        assert!(lin_to_db(0.0).is_finite());
    }

    #[test]
    fn test_time_constant_is_one_pole() {
        let sr = 48000.0;
        let c = time_constant_coeff(10.0, sr);
        let mut y = 0.0f32;
        for _ in 0..480 {
            y = c * y + (1.0 - c) * 1.0;
        }
        assert!((y - (1.0 - (-1.0f32).exp())).abs() < 1e-3);
    }

    #[test]
    fn test_zero_time_is_instant() {
        assert_eq!(time_constant_coeff(0.0, 48000.0), 0.0);
        assert_eq!(ballistics(0.0, 0.7, 0.0, 0.0), 0.7);
    }
}
