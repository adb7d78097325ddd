//! Music theory utilities for harmonic mixing
//!
//! Camelot wheel key handling: parsing, wheel distance, and the semitone
//! shifts used when nudging an incoming track toward the outgoing key.

use std::fmt;

/// Key mode on the Camelot wheel: 'A' is minor, 'B' is major
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CamelotMode {
    Minor,
    Major,
}

impl CamelotMode {
    pub fn letter(&self) -> char {
        match self {
            CamelotMode::Minor => 'A',
            CamelotMode::Major => 'B',
        }
    }
}

/// A key in Camelot notation, e.g. "8A" (A minor) or "8B" (C major)
///
/// The number is the position on the circle of fifths (1-12); adjacent
/// numbers share six of seven scale tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CamelotKey {
    pub number: u8,
    pub mode: CamelotMode,
}

impl CamelotKey {
    /// Create a key, normalizing the wheel number into 1..=12
    pub fn new(number: u8, mode: CamelotMode) -> Self {
        Self {
            number: ((number + 11) % 12) + 1,
            mode,
        }
    }

    /// Parse Camelot notation like "8A", "12B", "3a"
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() < 2 {
            return None;
        }

        let (num_part, mode_part) = s.split_at(s.len() - 1);
        let number: u8 = num_part.parse().ok()?;
        if !(1..=12).contains(&number) {
            return None;
        }

        let mode = match mode_part.chars().next()? {
            'A' | 'a' => CamelotMode::Minor,
            'B' | 'b' => CamelotMode::Major,
            _ => return None,
        };

        Some(Self { number, mode })
    }

    /// Distance on the Camelot wheel
    ///
    /// Minimum circular steps between the two numbers, plus 1 when the
    /// modes differ and the numbers differ. The relative major/minor
    /// pair (same number, different letter) has distance 0.
    pub fn distance(&self, other: &CamelotKey) -> u8 {
        let diff = (self.number as i8 - other.number as i8).unsigned_abs();
        let wheel = diff.min(12 - diff);

        if self.mode == other.mode {
            wheel
        } else if self.number == other.number {
            0
        } else {
            wheel + 1
        }
    }

    /// Pitch class of the key root (semitones from C, 0-11)
    ///
    /// Camelot number 5 maps to pitch class 0 and each wheel step is a
    /// fifth (+7 semitones mod 12); major keys sit 3 semitones above the
    /// relative minor with the same number.
    pub fn pitch_class(&self) -> i32 {
        let base = ((self.number as i32 - 5) * 7).rem_euclid(12);
        match self.mode {
            CamelotMode::Minor => base,
            CamelotMode::Major => (base + 3) % 12,
        }
    }

    /// Signed semitone shift taking this key's root to `other`'s root
    ///
    /// Shortest modular interval, normalized to -6..=6.
    pub fn semitones_to(&self, other: &CamelotKey) -> i32 {
        let diff = (other.pitch_class() - self.pitch_class()).rem_euclid(12);
        if diff > 6 {
            diff - 12
        } else {
            diff
        }
    }

    /// Whether two keys mix cleanly without transposition
    pub fn is_compatible(&self, other: &CamelotKey) -> bool {
        self.distance(other) <= 1
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.mode.letter())
    }
}

/// Camelot wheel distance between two key strings
///
/// Unknown or empty keys are treated as distance 0 so missing analysis
/// never blocks a mix.
pub fn camelot_distance(key1: &str, key2: &str) -> u8 {
    match (CamelotKey::parse(key1), CamelotKey::parse(key2)) {
        (Some(a), Some(b)) => a.distance(&b),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            CamelotKey::parse("8A"),
            Some(CamelotKey { number: 8, mode: CamelotMode::Minor })
        );
        assert_eq!(
            CamelotKey::parse("12B"),
            Some(CamelotKey { number: 12, mode: CamelotMode::Major })
        );
        assert_eq!(
            CamelotKey::parse("3b"),
            Some(CamelotKey { number: 3, mode: CamelotMode::Major })
        );
        assert_eq!(CamelotKey::parse(""), None);
        assert_eq!(CamelotKey::parse("0A"), None);
        assert_eq!(CamelotKey::parse("13A"), None);
        assert_eq!(CamelotKey::parse("8C"), None);
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["1A", "8A", "12B"] {
            assert_eq!(CamelotKey::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_distance_same_key_is_zero() {
        let k = CamelotKey::parse("8A").unwrap();
        assert_eq!(k.distance(&k), 0);
    }

    #[test]
    fn test_distance_relative_pair_is_zero() {
        let minor = CamelotKey::parse("8A").unwrap();
        let major = CamelotKey::parse("8B").unwrap();
        assert_eq!(minor.distance(&major), 0);
        assert_eq!(major.distance(&minor), 0);
    }

    #[test]
    fn test_distance_symmetry() {
        let keys = ["1A", "3B", "7A", "12B", "6A"];
        for a in keys {
            for b in keys {
                let ka = CamelotKey::parse(a).unwrap();
                let kb = CamelotKey::parse(b).unwrap();
                assert_eq!(ka.distance(&kb), kb.distance(&ka), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_distance_wraps_around_wheel() {
        let a = CamelotKey::parse("1A").unwrap();
        let b = CamelotKey::parse("12A").unwrap();
        assert_eq!(a.distance(&b), 1);

        let c = CamelotKey::parse("2B").unwrap();
        let d = CamelotKey::parse("11B").unwrap();
        assert_eq!(c.distance(&d), 3);
    }

    #[test]
    fn test_cross_mode_penalty() {
        // 8A -> 9B: one wheel step plus the mode change
        let a = CamelotKey::parse("8A").unwrap();
        let b = CamelotKey::parse("9B").unwrap();
        assert_eq!(a.distance(&b), 2);
    }

    #[test]
    fn test_pitch_class() {
        // 8A is A minor: A = 9 semitones above C
        assert_eq!(CamelotKey::parse("8A").unwrap().pitch_class(), 9);
        // 8B is C major
        assert_eq!(CamelotKey::parse("8B").unwrap().pitch_class(), 0);
        // 5A is C minor
        assert_eq!(CamelotKey::parse("5A").unwrap().pitch_class(), 0);
    }

    #[test]
    fn test_semitone_shift_adjacent_key() {
        // One step on the wheel is a fifth: +7 wraps to -5
        let a = CamelotKey::parse("8A").unwrap();
        let b = CamelotKey::parse("9A").unwrap();
        assert_eq!(a.semitones_to(&b), -5);
        assert_eq!(b.semitones_to(&a), 5);
    }

    #[test]
    fn test_semitone_shift_two_steps() {
        // 8A (A minor) -> 10A (B minor): two wheel steps, two semitones up
        let a = CamelotKey::parse("8A").unwrap();
        let b = CamelotKey::parse("10A").unwrap();
        assert_eq!(a.semitones_to(&b), 2);
        assert_eq!(b.semitones_to(&a), -2);
    }

    #[test]
    fn test_semitone_shift_cross_mode() {
        // 8A (A minor) -> 7B (F major): A down to F is four semitones
        let a = CamelotKey::parse("8A").unwrap();
        let b = CamelotKey::parse("7B").unwrap();
        assert_eq!(a.semitones_to(&b), -4);
    }

    #[test]
    fn test_string_distance_handles_unknown() {
        assert_eq!(camelot_distance("", "8A"), 0);
        assert_eq!(camelot_distance("8A", "junk"), 0);
        assert_eq!(camelot_distance("8A", "9A"), 1);
    }
}
