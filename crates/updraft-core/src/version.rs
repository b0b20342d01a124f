use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version string '{input}'")]
    Invalid { input: String },
}

/// A dotted numeric version with an optional pre-release suffix.
///
/// Ordering compares numeric components left to right, treating missing
/// trailing components as zero, so `2.0` and `2.0.0` are equal. When the
/// numbers tie, a version without a suffix is greater than one with a
/// suffix, and two suffixes compare byte-wise.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    components: Vec<u64>,
    suffix: Option<String>,
}

impl Version {
    /// Parse a version such as `1.2.3`, `v2.0` or `1.0-beta`.
    ///
    /// # Errors
    /// Returns [`VersionError::Invalid`] when the string does not start with
    /// a numeric component, contains an empty component (`1..2`), or has a
    /// component too large for `u64`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::Invalid {
            input: input.to_string(),
        };

        let trimmed = input.trim();
        let body = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        let core_len = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (mut core, mut rest) = body.split_at(core_len);
        // `1.0.beta`: the final dot separates the suffix.
        if let Some(stripped) = core.strip_suffix('.') {
            core = stripped;
            rest = &body[core.len()..];
        }
        if core.is_empty() {
            return Err(invalid());
        }

        let components = core
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        let rest = rest.strip_prefix(['-', '+', '.', '_']).unwrap_or(rest);
        let suffix = (!rest.is_empty()).then(|| rest.to_string());

        Ok(Self {
            raw: trimmed.to_string(),
            components,
            suffix,
        })
    }

    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.suffix.is_some()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Compare two version strings.
///
/// # Errors
/// Returns [`VersionError::Invalid`] if either side cannot be parsed; no
/// ordering should be assumed in that case.
pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for idx in 0..len {
            let ours = self.components.get(idx).copied().unwrap_or(0);
            let theirs = other.components.get(idx).copied().unwrap_or(0);
            match ours.cmp(&theirs) {
                Ordering::Equal => {}
                decided => return decided,
            }
        }

        match (&self.suffix, &other.suffix) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(ours), Some(theirs)) => ours.cmp(theirs),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    fn v(input: &str) -> Version {
        Version::parse(input).expect("valid version in test")
    }

    #[test]
    fn numeric_components_compare_as_integers() {
        assert_eq!(compare("1.2.0", "1.10.0"), Ok(Ordering::Less));
        assert_eq!(compare("10", "9"), Ok(Ordering::Greater));
        assert_eq!(compare("2.0.0", "1.9.9"), Ok(Ordering::Greater));
    }

    #[test]
    fn missing_trailing_components_default_to_zero() {
        assert_eq!(compare("2.0", "2.0.0"), Ok(Ordering::Equal));
        assert_eq!(compare("2", "2.0.0.0"), Ok(Ordering::Equal));
        assert_eq!(compare("1.2", "1.1.9"), Ok(Ordering::Greater));
        assert_eq!(v("2.0"), v("2.0.0"));
    }

    #[test]
    fn suffix_sorts_before_the_plain_release() {
        assert_eq!(compare("1.0-beta", "1.0"), Ok(Ordering::Less));
        assert_eq!(compare("1.0", "1.0.0-rc1"), Ok(Ordering::Greater));
        assert_eq!(compare("1.0.1-alpha", "1.0.0"), Ok(Ordering::Greater));
    }

    #[test]
    fn suffixes_tie_break_lexically() {
        assert_eq!(compare("1.0-alpha", "1.0-beta"), Ok(Ordering::Less));
        assert_eq!(compare("1.0-beta", "1.0beta"), Ok(Ordering::Equal));
        assert_eq!(compare("1.0-beta.10", "1.0-beta.2"), Ok(Ordering::Less));
    }

    #[test]
    fn parse_splits_core_and_suffix() {
        let version = v("v1.2.3-rc.1");
        assert_eq!(version.components(), &[1, 2, 3]);
        assert_eq!(version.suffix(), Some("rc.1"));
        assert!(version.is_prerelease());
        assert_eq!(version.to_string(), "v1.2.3-rc.1");

        let dotted = v("1.0.beta");
        assert_eq!(dotted.components(), &[1, 0]);
        assert_eq!(dotted.suffix(), Some("beta"));

        let plain = v(" 4.5 ");
        assert_eq!(plain.components(), &[4, 5]);
        assert_eq!(plain.suffix(), None);
        assert_eq!(plain.as_str(), "4.5");
    }

    #[test]
    fn malformed_versions_are_rejected() {
        for input in ["", "beta", "v", ".1", "1..2", "x1.0", "99999999999999999999999"] {
            assert!(
                matches!(Version::parse(input), Err(VersionError::Invalid { .. })),
                "{input:?} should be invalid"
            );
        }
        assert!(compare("1.0", "nope").is_err());
    }

    #[test]
    fn ordering_is_reflexive_antisymmetric_and_transitive() {
        let samples: Vec<Version> = [
            "0.9", "1", "1.0-alpha", "1.0-beta", "1.0", "1.0.1", "1.2", "1.10", "2.0-rc1", "2.0.0",
            "10.0",
        ]
        .into_iter()
        .map(v)
        .collect();

        for a in &samples {
            assert_eq!(a.cmp(a), Ordering::Equal);
            for b in &samples {
                assert_eq!(a.cmp(b), b.cmp(a).reverse(), "{a} vs {b}");
                for c in &samples {
                    if a <= b && b <= c {
                        assert!(a <= c, "{a} <= {b} <= {c}");
                    }
                }
            }
        }
    }
}
