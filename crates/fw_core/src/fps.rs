/// Target simulation rate. The device settings screen offers exactly these.
/// Every per-frame timer in the simulation advances by `1 / hz()` per tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FpsChoice {
    #[default]
    Fps30,
    Fps60,
    Fps120,
    Fps240,
}

impl FpsChoice {
    /// All choices in settings-menu order.
    pub const ALL: &'static [FpsChoice] = &[
        FpsChoice::Fps30,
        FpsChoice::Fps60,
        FpsChoice::Fps120,
        FpsChoice::Fps240,
    ];

    /// Label as shown in settings and as persisted under `Game-FPS`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Fps30 => "30",
            Self::Fps60 => "60",
            Self::Fps120 => "120",
            Self::Fps240 => "240",
        }
    }

    pub fn hz(self) -> u32 {
        match self {
            Self::Fps30 => 30,
            Self::Fps60 => 60,
            Self::Fps120 => 120,
            Self::Fps240 => 240,
        }
    }

    /// Seconds per tick.
    pub fn frame_dt(self) -> f32 {
        1.0 / self.hz() as f32
    }

    /// Parse a persisted label. Unknown values map to `None`; callers fall back
    /// to the default.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.label() == label.trim())
    }

    /// Cycle to the next choice (wraps around).
    pub fn next(self) -> Self {
        match self {
            Self::Fps30 => Self::Fps60,
            Self::Fps60 => Self::Fps120,
            Self::Fps120 => Self::Fps240,
            Self::Fps240 => Self::Fps30,
        }
    }
}

impl std::fmt::Display for FpsChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} fps", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_30() {
        assert_eq!(FpsChoice::default(), FpsChoice::Fps30);
    }

    #[test]
    fn next_cycles_through_choices() {
        let mut choice = FpsChoice::Fps30;
        for _ in 0..FpsChoice::ALL.len() {
            choice = choice.next();
        }
        assert_eq!(choice, FpsChoice::Fps30);
    }

    #[test]
    fn from_label_round_trips_every_choice() {
        for &choice in FpsChoice::ALL {
            assert_eq!(FpsChoice::from_label(choice.label()), Some(choice));
        }
        assert_eq!(FpsChoice::from_label("45"), None);
    }

    #[test]
    fn frame_dt_matches_hz() {
        assert!((FpsChoice::Fps60.frame_dt() - 1.0 / 60.0).abs() < 1e-7);
    }
}
