use std::cmp::Ordering;
use std::fmt;

/// A dotted `major.minor.build.revision` version as published by package endpoints.
///
/// The first three segments are numeric. The fourth is an opaque revision that only
/// breaks ties, compared as a plain string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PackageVersion {
    pub major: u64,
    pub minor: u64,
    pub build: u64,
    pub revision: String,
}

impl PackageVersion {
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        let segments: Vec<&str> = trimmed.split('.').collect();
        if segments.len() > 4 {
            return None;
        }

        let mut numbers = [0_u64; 3];
        for (slot, segment) in numbers.iter_mut().zip(segments.iter()) {
            *slot = segment.parse::<u64>().ok()?;
        }

        Some(Self {
            major: numbers[0],
            minor: numbers[1],
            build: numbers[2],
            revision: segments.get(3).map(|value| value.to_string()).unwrap_or_default(),
        })
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.build.cmp(&other.build))
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)?;
        if !self.revision.is_empty() {
            write!(f, ".{}", self.revision)?;
        }
        Ok(())
    }
}

/// Compares two version strings. `Greater` means `left` is newer.
///
/// Returns `None` when either side fails to parse, which callers treat as
/// "not an upgrade".
pub fn compare_versions(left: &str, right: &str) -> Option<Ordering> {
    let left = PackageVersion::parse(left)?;
    let right = PackageVersion::parse(right)?;
    Some(left.compare(&right))
}
