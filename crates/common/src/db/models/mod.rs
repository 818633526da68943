//! Shared model types for the knowledge chunk table.
//!
//! Row I/O goes through raw SQL in the store, so no ORM entity lives
//! here; this module carries the types both halves of the engine share.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chunk type: determines the owning sync adapter and which intent treats
/// the chunk as its primary source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Faq,
    Product,
    Page,
    Manual,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Faq => "faq",
            ChunkType::Product => "product",
            ChunkType::Page => "page",
            ChunkType::Manual => "manual",
        }
    }

    /// All chunk types, in adapter order.
    pub const ALL: [ChunkType; 4] = [
        ChunkType::Faq,
        ChunkType::Product,
        ChunkType::Page,
        ChunkType::Manual,
    ];
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "faq" => Ok(ChunkType::Faq),
            "product" => Ok(ChunkType::Product),
            "page" => Ok(ChunkType::Page),
            "manual" => Ok(ChunkType::Manual),
            other => Err(format!("Unknown chunk type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_type_round_trip() {
        for ct in ChunkType::ALL {
            assert_eq!(ct.as_str().parse::<ChunkType>().unwrap(), ct);
        }
    }

    #[test]
    fn test_unknown_chunk_type() {
        assert!("pdf".parse::<ChunkType>().is_err());
    }
}
