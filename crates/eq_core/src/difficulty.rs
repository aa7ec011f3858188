use serde::{Deserialize, Serialize};

/// Opponent difficulty tier, 1 (easy) through 4 (expert).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct DifficultyTier(u8);

impl DifficultyTier {
    pub const EASY: DifficultyTier = DifficultyTier(1);
    pub const MEDIUM: DifficultyTier = DifficultyTier(2);
    pub const HARD: DifficultyTier = DifficultyTier(3);
    pub const EXPERT: DifficultyTier = DifficultyTier(4);
    pub const ALL: [DifficultyTier; 4] = [Self::EASY, Self::MEDIUM, Self::HARD, Self::EXPERT];

    /// Out-of-range values are clamped into 1..=4.
    pub fn new(level: u8) -> Self {
        DifficultyTier(level.clamp(1, 4))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn profile(self) -> DifficultyProfile {
        match self.0 {
            1 => DifficultyProfile {
                randomness: 0.85,
                top_k: 5,
                act_chance: 0.20,
                allow_concentration: true,
                allow_temperature: false,
                allow_pressure: false,
            },
            2 => DifficultyProfile {
                randomness: 0.40,
                top_k: 3,
                act_chance: 0.55,
                allow_concentration: true,
                allow_temperature: true,
                allow_pressure: false,
            },
            3 => DifficultyProfile {
                randomness: 0.10,
                top_k: 2,
                act_chance: 0.95,
                allow_concentration: true,
                allow_temperature: true,
                allow_pressure: true,
            },
            _ => DifficultyProfile {
                randomness: 0.02,
                top_k: 1,
                act_chance: 1.00,
                allow_concentration: true,
                allow_temperature: true,
                allow_pressure: true,
            },
        }
    }

    /// Lower multiplier at harder tiers: the opponent acts more often.
    pub fn opponent_cooldown_multiplier(self) -> f64 {
        match self.0 {
            1 => 5.0,
            2 => 3.0,
            3 => 1.0,
            _ => 0.5,
        }
    }

    pub fn decision_interval_ms(self) -> u64 {
        match self.0 {
            1 => 1_200,
            2 => 650,
            3 => 420,
            _ => 260,
        }
    }

    pub fn allows_abilities(self) -> bool {
        self.0 >= 2
    }
}

impl From<u8> for DifficultyTier {
    fn from(level: u8) -> Self {
        DifficultyTier::new(level)
    }
}

impl From<DifficultyTier> for u8 {
    fn from(tier: DifficultyTier) -> Self {
        tier.0
    }
}

impl std::fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier {}", self.0)
    }
}

/// Decision-engine knobs for one tier. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct DifficultyProfile {
    /// Probability of picking uniformly among the top `top_k` instead of the best.
    pub randomness: f64,
    pub top_k: usize,
    /// Probability of acting at all on a given decision tick.
    pub act_chance: f64,
    pub allow_concentration: bool,
    pub allow_temperature: bool,
    pub allow_pressure: bool,
}
