//! Best scores across sessions.

use std::io::{Read, Write};

use crate::codec::{CodecError, Decoder, Encoder};

/// Number of entries kept in the table.
pub const HIGH_SCORE_SLOTS: usize = 10;

/// Ten best scores, highest first. Empty slots hold zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighScores {
    scores: [i32; HIGH_SCORE_SLOTS],
}

impl Default for HighScores {
    fn default() -> Self {
        Self {
            scores: [0; HIGH_SCORE_SLOTS],
        }
    }
}

impl HighScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scores(&self) -> &[i32] {
        &self.scores
    }

    /// Inserts `score` in rank order and returns its slot, or `None` if it
    /// does not beat any entry.
    pub fn insert(&mut self, score: i32) -> Option<usize> {
        let slot = self.scores.iter().position(|&s| score > s)?;
        self.scores[slot..].rotate_right(1);
        self.scores[slot] = score;
        Some(slot)
    }

    pub fn save<W: Write>(&self, out: &mut W) -> Result<(), CodecError> {
        let mut enc = Encoder::new(out);
        for score in self.scores {
            enc.write_i32(score)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(input: &mut R) -> Result<Self, CodecError> {
        let mut dec = Decoder::new(input);
        let mut scores = [0; HIGH_SCORE_SLOTS];
        for score in &mut scores {
            *score = dec.read_i32("high_score")?;
        }
        Ok(Self { scores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_rank_order() {
        let mut table = HighScores::new();
        assert_eq!(table.insert(50), Some(0));
        assert_eq!(table.insert(80), Some(0));
        assert_eq!(table.insert(60), Some(1));
        assert_eq!(&table.scores()[..4], &[80, 60, 50, 0]);
    }

    #[test]
    fn test_full_table_drops_lowest() {
        let mut table = HighScores::new();
        for score in 1..=10 {
            table.insert(score * 10);
        }
        assert_eq!(table.insert(5), None);
        assert_eq!(table.insert(55), Some(5));
        assert_eq!(table.scores()[9], 20);
        assert_eq!(table.scores().len(), HIGH_SCORE_SLOTS);
    }

    #[test]
    fn test_zero_score_not_recorded() {
        let mut table = HighScores::new();
        assert_eq!(table.insert(0), None);
    }

    #[test]
    fn test_save_load() {
        let mut table = HighScores::new();
        table.insert(1200);
        table.insert(340);
        let mut bytes = Vec::new();
        table.save(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 4 * HIGH_SCORE_SLOTS);
        assert_eq!(HighScores::load(&mut bytes.as_slice()).unwrap(), table);

        let err = HighScores::load(&mut &bytes[..7]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }
}
