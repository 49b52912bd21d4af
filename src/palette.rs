//! The fixed token color palette
//!
//! Each color carries an immutable point value used by the scoring engine.
//! String forms are lowercase to match the advisor wire contract.

use serde::{Deserialize, Serialize};

/// A token color from the fixed palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenColor {
    Red,
    Green,
    Blue,
    Yellow,
    Purple,
}

impl TokenColor {
    /// All palette colors, in canonical order
    pub const ALL: [TokenColor; 5] = [
        TokenColor::Red,
        TokenColor::Green,
        TokenColor::Blue,
        TokenColor::Yellow,
        TokenColor::Purple,
    ];

    /// Point value awarded per token of this color in a match
    pub fn point_value(&self) -> u32 {
        match self {
            TokenColor::Red => 100,
            TokenColor::Green => 125,
            TokenColor::Blue => 150,
            TokenColor::Yellow => 175,
            TokenColor::Purple => 200,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenColor::Red => "red",
            TokenColor::Green => "green",
            TokenColor::Blue => "blue",
            TokenColor::Yellow => "yellow",
            TokenColor::Purple => "purple",
        }
    }

    /// Parse a palette color; advisor input is lowercased before matching
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "red" => Some(TokenColor::Red),
            "green" => Some(TokenColor::Green),
            "blue" => Some(TokenColor::Blue),
            "yellow" => Some(TokenColor::Yellow),
            "purple" => Some(TokenColor::Purple),
            _ => None,
        }
    }
}
