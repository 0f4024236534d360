//! The two closed enums the whole pipeline routes on: target proficiency
//! level and source era.
//!
//! Both are deliberately small, `Copy`, and exhaustively iterable so that
//! routing and threshold tables can be validated for completeness at load
//! time instead of failing at request time.

use serde::{Deserialize, Serialize};

/// A CEFR proficiency level — the six-grade scale rewritten text targets.
///
/// Ordered from least proficient (`A1`) to most (`C2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    /// All levels, lowest to highest.
    pub const ALL: [CefrLevel; 6] = [
        CefrLevel::A1,
        CefrLevel::A2,
        CefrLevel::B1,
        CefrLevel::B2,
        CefrLevel::C1,
        CefrLevel::C2,
    ];

    /// Zero-based rank, `A1` = 0 through `C2` = 5.
    pub fn rank(self) -> usize {
        match self {
            CefrLevel::A1 => 0,
            CefrLevel::A2 => 1,
            CefrLevel::B1 => 2,
            CefrLevel::B2 => 3,
            CefrLevel::C1 => 4,
            CefrLevel::C2 => 5,
        }
    }

    /// Short display label, e.g. "A1".
    pub fn label(self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl std::fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            other => Err(format!("Unknown CEFR level: {other}")),
        }
    }
}

/// Coarse stylistic era of source prose.
///
/// Selected by the era classifier and used to pick both similarity
/// thresholds and rewrite aggressiveness. Unclassifiable text defaults to
/// `Modern`, the least aggressive setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Era {
    EarlyModern,
    Victorian,
    #[serde(rename = "american-19c")]
    American19c,
    Modern,
}

impl Era {
    /// All eras, oldest style first.
    pub const ALL: [Era; 4] = [
        Era::EarlyModern,
        Era::Victorian,
        Era::American19c,
        Era::Modern,
    ];

    /// Whether this era counts as archaic for threshold/creativity purposes.
    pub fn is_archaic(self) -> bool {
        !matches!(self, Era::Modern)
    }

    pub fn label(self) -> &'static str {
        match self {
            Era::EarlyModern => "early-modern",
            Era::Victorian => "victorian",
            Era::American19c => "american-19c",
            Era::Modern => "modern",
        }
    }
}

impl std::fmt::Display for Era {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
