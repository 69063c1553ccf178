use std::collections::HashMap;

use serde::Serialize;

use crate::library::{Signature, SignatureLibrary};

/// Display prefix for ships first seen in an initial snapshot (station spawns).
pub const SNAPSHOT_PREFIX: &str = "(S) ";

/// Detected markers found in a signature, normalised by the signature's length.
///
/// A marker detected several times counts at most as often as the signature
/// lists it, so the ratio never exceeds 1. Kept as an integer ratio so that
/// comparisons and rounding are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub matches: usize,
    pub total: usize,
}

impl Score {
    pub const ZERO: Score = Score {
        matches: 0,
        total: 0,
    };

    pub fn is_zero(&self) -> bool {
        self.matches == 0 || self.total == 0
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.matches as f64 / self.total as f64
    }

    /// Strictly greater than `other`.
    pub fn beats(&self, other: &Score) -> bool {
        if self.is_zero() {
            return false;
        }
        if other.is_zero() {
            return true;
        }
        let lhs = self.matches as u128 * other.total as u128;
        let rhs = other.matches as u128 * self.total as u128;
        lhs > rhs
    }

    /// The ratio rounded half away from zero to three decimals.
    pub fn confidence(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        let m = self.matches as u128;
        let n = self.total as u128;
        let millis = (2 * 1000 * m + n) / (2 * n);
        millis as f64 / 1000.0
    }
}

/// Best ship for a set of markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Display name; carries [`SNAPSHOT_PREFIX`] for snapshot lines.
    pub ship: String,
    pub confidence: f64,
    pub is_snapshot: bool,
    /// Library key of the winning ship, without any display prefix.
    #[serde(skip)]
    pub entity: String,
}

/// Scores `detected` against `signature` by multiset overlap.
pub fn score(detected: &[&str], signature: &Signature) -> Score {
    if signature.is_empty() {
        return Score::ZERO;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for &marker in detected {
        *seen.entry(marker).or_insert(0) += 1;
    }
    let matches = seen
        .into_iter()
        .map(|(marker, count)| count.min(signature.count(marker)))
        .sum();

    Score {
        matches,
        total: signature.len(),
    }
}

/// Highest-scoring ship, or `None` when nothing scores above zero.
///
/// Ties go to the ship that comes first in the library.
pub fn best_match<'l>(
    detected: &[&str],
    library: &'l SignatureLibrary,
) -> Option<(&'l Signature, Score)> {
    let mut best: Option<(&Signature, Score)> = None;
    for signature in library.iter() {
        let candidate = score(detected, signature);
        let best_score = best.map(|(_, score)| score).unwrap_or(Score::ZERO);
        if candidate.beats(&best_score) {
            best = Some((signature, candidate));
        }
    }
    best
}

pub fn match_markers(
    detected: &[&str],
    is_snapshot: bool,
    library: &SignatureLibrary,
) -> Option<MatchResult> {
    let (signature, score) = best_match(detected, library)?;
    let entity = signature.name().to_string();
    let ship = if is_snapshot && !entity.starts_with(SNAPSHOT_PREFIX) {
        format!("{SNAPSHOT_PREFIX}{entity}")
    } else {
        entity.clone()
    };

    Some(MatchResult {
        ship,
        confidence: score.confidence(),
        is_snapshot,
        entity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(entries: &[(&str, &[&str])]) -> SignatureLibrary {
        let mut library = SignatureLibrary::new();
        for (name, tokens) in entries {
            library.insert(name, tokens.iter().copied()).unwrap();
        }
        library
    }

    #[test]
    fn repeated_marker_counts_once_per_signature_entry() {
        let lib = library(&[("X", &["room_a", "room_b", "room_c"])]);
        let s = score(&["room_a", "room_a", "room_b"], lib.get("X").unwrap());
        assert_eq!(
            s,
            Score {
                matches: 2,
                total: 3
            }
        );
        assert!((s.ratio() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(s.confidence(), 0.667);
    }

    #[test]
    fn duplicated_signature_entries_absorb_duplicated_markers() {
        let lib = library(&[("X", &["room_a", "room_a", "room_b"])]);
        let signature = lib.get("X").unwrap();
        assert_eq!(score(&["room_a", "room_a", "room_a"], signature).matches, 2);
        assert_eq!(score(&["room_a", "room_a", "room_b"], signature).confidence(), 1.0);
    }

    #[test]
    fn empty_signature_never_wins() {
        let lib = library(&[("Empty", &[]), ("Real", &["room_a", "room_b"])]);
        let result = match_markers(&["room_a"], false, &lib).unwrap();
        assert_eq!(result.ship, "Real");
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn no_overlap_is_no_match() {
        let lib = library(&[("A", &["room_a"]), ("B", &["room_b"])]);
        assert!(match_markers(&["room_z", "room_y"], true, &lib).is_none());
        assert!(match_markers(&["room_a"], false, &SignatureLibrary::new()).is_none());
    }

    #[test]
    fn first_loaded_wins_a_tie() {
        let lib = library(&[
            ("Aurora", &["room_a", "room_b"]),
            ("Carrack", &["room_a", "room_c"]),
        ]);
        let result = match_markers(&["room_a"], false, &lib).unwrap();
        assert_eq!(result.ship, "Aurora");
    }

    #[test]
    fn equal_ratios_with_different_lengths_tie() {
        let lib = library(&[
            ("Short", &["room_a", "room_x"]),
            ("Long", &["room_a", "room_b", "room_y", "room_z"]),
        ]);
        // 1/2 against 2/4.
        let result = match_markers(&["room_a", "room_b"], false, &lib).unwrap();
        assert_eq!(result.ship, "Short");

        // 1/2 against 3/4.
        let result = match_markers(&["room_a", "room_b", "room_y"], false, &lib).unwrap();
        assert_eq!(result.ship, "Long");
        assert_eq!(result.confidence, 0.75);
    }

    #[test]
    fn snapshot_prefix_and_rounding() {
        let carrack: Vec<String> = (0..2000).map(|i| format!("room_c{i}")).collect();
        let mut lib = SignatureLibrary::new();
        lib.insert("Aurora", ["room_c0", "room_x1", "room_x2"])
            .unwrap();
        lib.insert("Carrack", carrack.iter().cloned()).unwrap();

        // 1833 / 2000 = 0.9165
        let detected: Vec<&str> = carrack[..1833].iter().map(String::as_str).collect();
        let result = match_markers(&detected, true, &lib).unwrap();

        assert_eq!(result.ship, "(S) Carrack");
        assert_eq!(result.entity, "Carrack");
        assert_eq!(result.confidence, 0.917);
        assert!(result.is_snapshot);
        assert!(lib.get("Carrack").is_some());
        assert!(lib.get("(S) Carrack").is_none());
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        let half = Score {
            matches: 1,
            total: 2000,
        };
        assert_eq!(half.confidence(), 0.001);

        let below_half = Score {
            matches: 1,
            total: 2001,
        };
        assert_eq!(below_half.confidence(), 0.0);
    }

    #[test]
    fn prefix_is_not_doubled() {
        let lib = library(&[("(S) Idris", &["room_hangar"])]);
        let result = match_markers(&["room_hangar"], true, &lib).unwrap();
        assert_eq!(result.ship, "(S) Idris");
    }

    #[test]
    fn serialized_payload_omits_library_key() {
        let lib = library(&[("Carrack", &["room_a"])]);
        let result = match_markers(&["room_a"], false, &lib).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ship": "Carrack", "confidence": 1.0, "is_snapshot": false})
        );
    }
}
