//! Version string ordering and tag normalization.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use semver::Version;

type LessThanFn = dyn Fn(&str, &str) -> bool + Send + Sync;

/// Strict weak ordering over version strings.
///
/// The updater only ever asks "is `a` older than `b`?", so any predicate
/// that is a valid strict weak ordering can be plugged in.
#[derive(Clone)]
pub struct VersionComparator {
    less_than: Arc<LessThanFn>,
    name: &'static str,
}

impl VersionComparator {
    /// Case-insensitive, numeric-aware ordering (the default).
    pub fn natural() -> Self {
        Self {
            less_than: Arc::new(|a, b| natural_cmp(a, b) == Ordering::Less),
            name: "natural",
        }
    }

    /// Semver precedence, falling back to natural ordering for tags that
    /// are not `major.minor.patch[-prerelease]`.
    pub fn dotted() -> Self {
        Self {
            less_than: Arc::new(|a, b| compare_versions(a, b) == VersionComparison::Older),
            name: "dotted",
        }
    }

    /// Wrap a caller-supplied "less than" predicate.
    pub fn custom<F>(less_than: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            less_than: Arc::new(less_than),
            name: "custom",
        }
    }

    /// Returns true if `a` orders strictly before `b`.
    pub fn less_than(&self, a: &str, b: &str) -> bool {
        (self.less_than)(a, b)
    }
}

impl Default for VersionComparator {
    fn default() -> Self {
        Self::natural()
    }
}

impl fmt::Debug for VersionComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VersionComparator").field(&self.name).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
    Number(&'a str),
    Text(&'a str),
}

fn chunks(value: &str) -> impl Iterator<Item = Chunk<'_>> {
    let mut rest = value;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let numeric = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != numeric)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(end);
        rest = tail;
        Some(if numeric {
            Chunk::Number(head)
        } else {
            Chunk::Text(head)
        })
    })
}

fn cmp_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Natural ("numeric-aware") comparison, ignoring case.
///
/// Digit runs compare by value, everything else compares by its lowercase
/// form. A digit run sorts before a text run at the same position.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        let ordering = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Number(x)), Some(Chunk::Number(y))) => cmp_numbers(x, y),
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => cmp_text(x, y),
            (Some(Chunk::Number(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Number(_))) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// Strip one leading version marker from a release tag.
///
/// Checked in order: `.v`, `v`/`V`, `#`. At most one prefix is removed.
pub fn strip_version_prefix(tag: &str) -> &str {
    if let Some(rest) = tag.strip_prefix(".v") {
        rest
    } else if let Some(rest) = tag.strip_prefix(['v', 'V']) {
        rest
    } else if let Some(rest) = tag.strip_prefix('#') {
        rest
    } else {
        tag
    }
}

/// Result of comparing two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComparison {
    /// Current is older than target
    Older,
    /// Current equals target
    Equal,
    /// Current is newer than target
    Newer,
}

/// Compare two version strings with semver precedence.
///
/// Build metadata is ignored. If either side is not a valid semver version
/// after prefix stripping, both fall back to [`natural_cmp`].
pub fn compare_versions(current: &str, target: &str) -> VersionComparison {
    let current = strip_version_prefix(current.trim());
    let target = strip_version_prefix(target.trim());

    let ordering = match (Version::parse(current), Version::parse(target)) {
        (Ok(a), Ok(b)) => cmp_precedence(&a, &b),
        _ => natural_cmp(current, target),
    };

    match ordering {
        Ordering::Less => VersionComparison::Older,
        Ordering::Equal => VersionComparison::Equal,
        Ordering::Greater => VersionComparison::Newer,
    }
}

fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}
