//! Debian package versions and their total order.
//!
//! A version is `[epoch:]upstream[-revision]`. Versions are compared
//! component by component with the Debian collation rule: runs of
//! non-digits compare character by character (`~` before everything,
//! including the end of the string; letters before other characters), runs
//! of digits compare numerically.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::VersionError;

/// An immutable, validated package version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    epoch: Option<u64>,
    upstream: String,
    revision: Option<String>,
}

impl Version {
    /// Parse a version string such as `1:2.30-1~bpo12+1`.
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        if text.is_empty() {
            return Err(VersionError::Empty);
        }
        if let Some(ch) = text
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~' | ':' | '-')))
        {
            return Err(VersionError::InvalidCharacter {
                version: text.to_string(),
                ch,
            });
        }

        let (epoch, rest) = match text.split_once(':') {
            Some((epoch, rest)) => {
                if epoch.is_empty() || !epoch.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionError::InvalidEpoch(text.to_string()));
                }
                let epoch = epoch
                    .parse::<u64>()
                    .map_err(|_| VersionError::InvalidEpoch(text.to_string()))?;
                (Some(epoch), rest)
            }
            None => (None, text),
        };

        let (upstream, revision) = match rest.rsplit_once('-') {
            Some((upstream, revision)) => (upstream, Some(revision)),
            None => (rest, None),
        };
        if upstream.is_empty() {
            return Err(VersionError::MissingUpstream(text.to_string()));
        }
        if revision == Some("") {
            return Err(VersionError::InvalidCharacter {
                version: text.to_string(),
                ch: '-',
            });
        }

        Ok(Self {
            epoch,
            upstream: upstream.to_string(),
            revision: revision.map(str::to_string),
        })
    }

    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Compare by the Debian collation rule alone.
    ///
    /// Unlike [`Ord::cmp`] this reports `Equal` for versions that differ
    /// only in spelling, such as `1.0` and `1.0-0` or `9` and `09`.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.epoch
            .unwrap_or(0)
            .cmp(&other.epoch.unwrap_or(0))
            .then_with(|| compare_component(&self.upstream, &other.upstream))
            .then_with(|| {
                compare_component(
                    self.revision.as_deref().unwrap_or(""),
                    other.revision.as_deref().unwrap_or(""),
                )
            })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Ties in collation are broken structurally so that `Ord` agrees
        // with the structural `Eq`.
        self.compare(other).then_with(|| {
            (self.epoch, &self.upstream, &self.revision).cmp(&(
                other.epoch,
                &other.upstream,
                &other.revision,
            ))
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{epoch}:")?;
        }
        f.write_str(&self.upstream)?;
        if let Some(revision) = &self.revision {
            write!(f, "-{revision}")?;
        }
        Ok(())
    }
}

/// Sort weight of a character inside a non-digit run.
///
/// This is dpkg's `order()`: `~` sorts before the end of the run, letters
/// sort before every non-letter, and each class orders by ASCII within itself.
fn weight(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(b'~') => -1,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => i32::from(c),
        Some(c) => i32::from(c) + 256,
    }
}

fn is_digit_at(s: &[u8], i: usize) -> bool {
    s.get(i).is_some_and(u8::is_ascii_digit)
}

fn compare_component(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let (wa, wb) = (weight(a.get(i).copied()), weight(b.get(j).copied()));
            if wa != wb {
                return wa.cmp(&wb);
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

        let mut first_diff = Ordering::Equal;
        while is_digit_at(a, i) && is_digit_at(b, j) {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }
        if is_digit_at(a, i) {
            return Ordering::Greater;
        }
        if is_digit_at(b, j) {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}
