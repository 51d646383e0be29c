//! Version ordering strategies
//!
//! Index deduplication and the "latest" projection only ever ask which of two
//! version strings is greater. The default answer is plain lexicographic
//! comparison, which misorders numeric components (`"9" > "10"`) but is what
//! existing consumers of the feed were built against. `DebianOrder` follows
//! dpkg's algorithm and can be selected explicitly.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::error::Error;

/// Total order over version strings.
pub trait VersionOrder {
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// Code-point comparison of the raw strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lexicographic;

impl VersionOrder for Lexicographic {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

/// dpkg version comparison: `[epoch:]upstream[-revision]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebianOrder;

impl VersionOrder for DebianOrder {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let (a_epoch, a_upstream, a_revision) = split_debian(a);
        let (b_epoch, b_upstream, b_revision) = split_debian(b);

        a_epoch
            .cmp(&b_epoch)
            .then_with(|| verrevcmp(a_upstream.as_bytes(), b_upstream.as_bytes()))
            .then_with(|| verrevcmp(a_revision.as_bytes(), b_revision.as_bytes()))
    }
}

/// Split into epoch, upstream version and revision. A non-numeric epoch is
/// treated as part of the upstream version.
fn split_debian(version: &str) -> (u64, &str, &str) {
    let version = version.trim();
    let (epoch, rest) = match version.split_once(':') {
        Some((epoch, rest)) => match epoch.parse::<u64>() {
            Ok(epoch) => (epoch, rest),
            Err(_) => (0, version),
        },
        None => (0, version),
    };

    match rest.rsplit_once('-') {
        Some((upstream, revision)) => (epoch, upstream, revision),
        None => (epoch, rest, ""),
    }
}

fn char_order(c: Option<&u8>) -> i32 {
    match c {
        None => 0,
        Some(b'~') => -1,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => *c as i32,
        Some(c) => *c as i32 + 256,
    }
}

fn is_digit(c: Option<&u8>) -> bool {
    c.is_some_and(|c| c.is_ascii_digit())
}

fn verrevcmp(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        // Non-digit run, compared with '~' sorting before everything
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let ac = char_order(a.get(i));
            let bc = char_order(b.get(j));
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        while a.get(i) == Some(&b'0') {
            i += 1;
        }
        while b.get(j) == Some(&b'0') {
            j += 1;
        }

        // Digit run, compared numerically without overflow
        let mut first_diff = Ordering::Equal;
        while is_digit(a.get(i)) && is_digit(b.get(j)) {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
        if is_digit(a.get(i)) {
            return Ordering::Greater;
        }
        if is_digit(b.get(j)) {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}

/// Named selection of a [`VersionOrder`] strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionScheme {
    #[default]
    Lexicographic,
    Debian,
}

impl VersionScheme {
    pub fn order(&self) -> Box<dyn VersionOrder> {
        match self {
            VersionScheme::Lexicographic => Box::new(Lexicographic),
            VersionScheme::Debian => Box::new(DebianOrder),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VersionScheme::Lexicographic => "lexicographic",
            VersionScheme::Debian => "debian",
        }
    }
}

impl FromStr for VersionScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexicographic" | "lex" | "string" => Ok(VersionScheme::Lexicographic),
            "debian" | "dpkg" => Ok(VersionScheme::Debian),
            _ => Err(Error::UnknownVersionOrder(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_is_naive() {
        assert_eq!(Lexicographic.compare("9", "10"), Ordering::Greater);
        assert_eq!(Lexicographic.compare("1.1", "1.0"), Ordering::Greater);
        assert_eq!(Lexicographic.compare("1.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_debian_numeric_components() {
        assert_eq!(DebianOrder.compare("9", "10"), Ordering::Less);
        assert_eq!(DebianOrder.compare("1.10", "1.9"), Ordering::Greater);
        assert_eq!(DebianOrder.compare("1.01", "1.1"), Ordering::Equal);
    }

    #[test]
    fn test_debian_epoch_and_revision() {
        assert_eq!(DebianOrder.compare("1:1.0", "2.0"), Ordering::Greater);
        assert_eq!(DebianOrder.compare("1.0-2", "1.0-10"), Ordering::Less);
        assert_eq!(DebianOrder.compare("1.0-1ubuntu1", "1.0-1"), Ordering::Greater);
    }

    #[test]
    fn test_debian_tilde_sorts_first() {
        assert_eq!(DebianOrder.compare("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(DebianOrder.compare("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(DebianOrder.compare("1.0", "1.0+lliurex1"), Ordering::Less);
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!(
            "debian".parse::<VersionScheme>().unwrap(),
            VersionScheme::Debian
        );
        assert_eq!(
            "Lexicographic".parse::<VersionScheme>().unwrap(),
            VersionScheme::Lexicographic
        );
        let err = "semver".parse::<VersionScheme>().unwrap_err();
        assert!(matches!(err, Error::UnknownVersionOrder(ref name) if name == "semver"));
    }
}
