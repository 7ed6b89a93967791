//! Directional coordinate tokens, e.g. `"40.123N"` or `"074.0060W"`.

use std::sync::LazyLock;

use regex::Regex;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(?:\.[0-9]*)?|\.[0-9]+)([NSEW])").expect("coordinate pattern is valid")
});

/// Hemisphere letter of a coordinate token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "N" => Some(Direction::North),
            "S" => Some(Direction::South),
            "E" => Some(Direction::East),
            "W" => Some(Direction::West),
            _ => None,
        }
    }

    fn is_latitude(self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }

    fn sign(self) -> f64 {
        match self {
            Direction::South | Direction::West => -1.0,
            Direction::North | Direction::East => 1.0,
        }
    }
}

/// Splits a token into its magnitude and direction.
pub fn parse_token(token: &str) -> Option<(f64, Direction)> {
    let caps = TOKEN.captures(token.trim())?;
    let magnitude: f64 = caps.get(1)?.as_str().parse().ok()?;
    let direction = Direction::from_letter(caps.get(2)?.as_str())?;
    Some((magnitude, direction))
}

/// Signed decimal degrees: S and W are negative, N and E positive.
///
/// Returns `None` for anything that is not `<number><N|S|E|W>`.
pub fn parse_coordinate(token: &str) -> Option<f64> {
    parse_token(token).map(|(magnitude, direction)| magnitude * direction.sign())
}

/// A latitude token: N/S only, within [-90, 90].
pub fn parse_latitude(token: &str) -> Option<f64> {
    let (magnitude, direction) = parse_token(token)?;
    (direction.is_latitude() && magnitude <= 90.0).then(|| magnitude * direction.sign())
}

/// A longitude token: E/W only, within [-180, 180].
pub fn parse_longitude(token: &str) -> Option<f64> {
    let (magnitude, direction) = parse_token(token)?;
    (!direction.is_latitude() && magnitude <= 180.0).then(|| magnitude * direction.sign())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_north_and_east_are_positive() {
        assert_eq!(parse_coordinate("40.123N"), Some(40.123));
        assert_eq!(parse_coordinate("12.5E"), Some(12.5));
    }

    #[test]
    fn test_south_and_west_are_negative() {
        assert_eq!(parse_coordinate("33.25S"), Some(-33.25));
        assert_eq!(parse_coordinate("118.40W"), Some(-118.40));
    }

    #[test]
    fn test_zero_magnitude_keeps_non_negative_for_north() {
        let value = parse_coordinate("0N").unwrap();
        assert!(value >= 0.0);
    }

    #[test]
    fn test_magnitude_survives_sign() {
        for (token, magnitude) in [("45.5N", 45.5), ("45.5S", 45.5), ("120.25W", 120.25)] {
            assert_eq!(parse_coordinate(token).unwrap().abs(), magnitude);
        }
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(parse_coordinate("  38.8977N \n"), Some(38.8977));
    }

    #[test]
    fn test_invalid_tokens_yield_none() {
        assert_eq!(parse_coordinate(""), None);
        assert_eq!(parse_coordinate("40.123"), None);
        assert_eq!(parse_coordinate("N40.123"), None);
        assert_eq!(parse_coordinate("40.123X"), None);
        assert_eq!(parse_coordinate("abc"), None);
        assert_eq!(parse_coordinate("-40.1N"), None);
    }

    #[test]
    fn test_latitude_rejects_longitude_letters_and_range() {
        assert_eq!(parse_latitude("40.0E"), None);
        assert_eq!(parse_latitude("91.0N"), None);
        assert_eq!(parse_latitude("90.0S"), Some(-90.0));
    }

    #[test]
    fn test_longitude_rejects_latitude_letters_and_range() {
        assert_eq!(parse_longitude("40.0N"), None);
        assert_eq!(parse_longitude("180.1W"), None);
        assert_eq!(parse_longitude("077.0365W"), Some(-77.0365));
    }
}
