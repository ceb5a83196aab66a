//! Dotted version comparison.
//!
//! Versions are compared component by component as integers. A missing
//! trailing component counts as zero, and an absent version sorts before
//! any present one (including the empty string).

use std::cmp::Ordering;

/// One dot-separated piece of a version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    /// Past the end of the shorter version, or an empty piece.
    Missing,
    /// Leading decimal digits of the piece.
    Number(u64),
    /// A piece that does not start with a digit.
    NotANumber,
}

impl Component {
    fn parse(piece: Option<&str>) -> Self {
        let Some(piece) = piece.filter(|p| !p.is_empty()) else {
            return Self::Missing;
        };

        let digits: &str = piece
            .find(|c: char| !c.is_ascii_digit())
            .map_or(piece, |end| &piece[..end]);

        if digits.is_empty() {
            return Self::NotANumber;
        }

        // Oversized components saturate; ordering between them is unspecified
        Self::Number(digits.parse().unwrap_or(u64::MAX))
    }
}

/// Compares two optional version strings.
///
/// Returns `Greater` when `a` is the newer version. Non-numeric components
/// never decide the result, so comparisons involving them may be
/// inconsistent; everything else is total and antisymmetric.
#[must_use]
pub fn compare_versions(a: Option<&str>, b: Option<&str>) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (Some(_), None) => return Ordering::Greater,
        (None, Some(_)) => return Ordering::Less,
        (Some(a), Some(b)) if a == b => return Ordering::Equal,
        (Some(a), Some(b)) => (a, b),
    };

    let a_pieces: Vec<&str> = a.split('.').collect();
    let b_pieces: Vec<&str> = b.split('.').collect();
    let len = a_pieces.len().max(b_pieces.len());

    for i in 0..len {
        let left = Component::parse(a_pieces.get(i).copied());
        let right = Component::parse(b_pieces.get(i).copied());

        match (left, right) {
            (Component::Number(x), Component::Number(y)) if x != y => return x.cmp(&y),
            (Component::Number(x), Component::Missing) if x > 0 => return Ordering::Greater,
            (Component::Missing, Component::Number(y)) if y > 0 => return Ordering::Less,
            _ => {}
        }
    }

    Ordering::Equal
}

/// Returns true when `candidate` is strictly newer than `current`.
#[must_use]
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(Some(candidate), Some(current)) == Ordering::Greater
}
