use nih_plug::prelude::Enum;

// =============================================================================
// RATIO CHOICES
// =============================================================================

/// The fixed set of compression ratios exposed to the host.
///
/// Stable ids are the plain numeric value so saved sessions stay readable and
/// an unknown id can still be parsed and snapped to the nearest choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[repr(usize)]
pub enum RatioChoice {
    #[id = "1"]
    #[name = "1.0"]
    R1,
    #[id = "1.5"]
    #[name = "1.5"]
    R1p5,
    #[id = "2"]
    #[name = "2.0"]
    R2,
    #[id = "3"]
    #[name = "3.0"]
    R3,
    #[id = "4"]
    #[name = "4.0"]
    R4,
    #[id = "5"]
    #[name = "5.0"]
    R5,
    #[id = "6"]
    #[name = "6.0"]
    R6,
    #[id = "7"]
    #[name = "7.0"]
    R7,
    #[id = "8"]
    #[name = "8.0"]
    R8,
    #[id = "10"]
    #[name = "10.0"]
    R10,
    #[id = "15"]
    #[name = "15.0"]
    R15,
    #[id = "20"]
    #[name = "20.0"]
    R20,
    #[id = "50"]
    #[name = "50.0"]
    R50,
    #[id = "100"]
    #[name = "100.0"]
    R100,
}

impl RatioChoice {
    pub const ALL: [RatioChoice; 14] = [
        RatioChoice::R1,
        RatioChoice::R1p5,
        RatioChoice::R2,
        RatioChoice::R3,
        RatioChoice::R4,
        RatioChoice::R5,
        RatioChoice::R6,
        RatioChoice::R7,
        RatioChoice::R8,
        RatioChoice::R10,
        RatioChoice::R15,
        RatioChoice::R20,
        RatioChoice::R50,
        RatioChoice::R100,
    ];

    pub fn value(&self) -> f32 {
        match self {
            RatioChoice::R1 => 1.0,
            RatioChoice::R1p5 => 1.5,
            RatioChoice::R2 => 2.0,
            RatioChoice::R3 => 3.0,
            RatioChoice::R4 => 4.0,
            RatioChoice::R5 => 5.0,
            RatioChoice::R6 => 6.0,
            RatioChoice::R7 => 7.0,
            RatioChoice::R8 => 8.0,
            RatioChoice::R10 => 10.0,
            RatioChoice::R15 => 15.0,
            RatioChoice::R20 => 20.0,
            RatioChoice::R50 => 50.0,
            RatioChoice::R100 => 100.0,
        }
    }

    /// Snap an arbitrary ratio to the closest available choice.
    /// Non-finite input yields the default.
    pub fn nearest(ratio: f32) -> Self {
        if !ratio.is_finite() {
            return Self::default();
        }
        let mut best = RatioChoice::R1;
        let mut best_dist = f32::INFINITY;
        for choice in Self::ALL {
            let dist = (choice.value() - ratio).abs();
            if dist < best_dist {
                best = choice;
                best_dist = dist;
            }
        }
        best
    }

    /// Look up a choice by its position in the list.
    pub fn from_position(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Resolve a stable id, falling back to parsing it as a number.
    pub fn from_id_lenient(id: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|choice| choice.id() == id)
            .unwrap_or_else(|| match id.trim().parse::<f32>() {
                Ok(v) => Self::nearest(v),
                Err(_) => Self::default(),
            })
    }

    pub fn id(&self) -> &'static str {
        match self {
            RatioChoice::R1 => "1",
            RatioChoice::R1p5 => "1.5",
            RatioChoice::R2 => "2",
            RatioChoice::R3 => "3",
            RatioChoice::R4 => "4",
            RatioChoice::R5 => "5",
            RatioChoice::R6 => "6",
            RatioChoice::R7 => "7",
            RatioChoice::R8 => "8",
            RatioChoice::R10 => "10",
            RatioChoice::R15 => "15",
            RatioChoice::R20 => "20",
            RatioChoice::R50 => "50",
            RatioChoice::R100 => "100",
        }
    }
}

impl Default for RatioChoice {
    fn default() -> Self {
        RatioChoice::R3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_ascending_and_at_least_one() {
        let values: Vec<f32> = RatioChoice::ALL.iter().map(|c| c.value()).collect();
        assert_eq!(values[0], 1.0);
        for pair in values.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_nearest_snaps() {
        assert_eq!(RatioChoice::nearest(4.0), RatioChoice::R4);
        assert_eq!(RatioChoice::nearest(1.2), RatioChoice::R1);
        assert_eq!(RatioChoice::nearest(1.3), RatioChoice::R1p5);
        assert_eq!(RatioChoice::nearest(12.0), RatioChoice::R10);
        assert_eq!(RatioChoice::nearest(1000.0), RatioChoice::R100);
        assert_eq!(RatioChoice::nearest(-5.0), RatioChoice::R1);
        assert_eq!(RatioChoice::nearest(f32::NAN), RatioChoice::R3);
    }

    #[test]
    fn test_lenient_ids() {
        assert_eq!(RatioChoice::from_id_lenient("1.5"), RatioChoice::R1p5);
        assert_eq!(RatioChoice::from_id_lenient("100"), RatioChoice::R100);
        assert_eq!(RatioChoice::from_id_lenient(" 7.9 "), RatioChoice::R8);
        assert_eq!(RatioChoice::from_id_lenient("loud"), RatioChoice::R3);
    }

    #[test]
    fn test_position_lookup() {
        assert_eq!(RatioChoice::from_position(3), Some(RatioChoice::R3));
        assert_eq!(RatioChoice::from_position(13), Some(RatioChoice::R100));
        assert_eq!(RatioChoice::from_position(14), None);
    }
}
