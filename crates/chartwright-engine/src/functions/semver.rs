//! Semantic version parsing and constraint checks
//!
//! Versions are parsed leniently (`v` prefix, missing minor or patch).
//! Constraints follow the Masterminds dialect Helm charts are written
//! against: comma or space separated AND groups, `||` between groups,
//! hyphen ranges, `x`/`*` wildcards, and caret/tilde ranges. A prerelease
//! version only satisfies comparators that carry a prerelease themselves.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;
use ::semver::{BuildMetadata, Prerelease};

use super::{FuncError, FuncResult, Registry, arg_str};
use crate::value::{Map, Value};

pub(super) fn register(r: &mut Registry) {
    r.fixed("semver", 1, |a| Ok(version_value(&Version::parse(arg_str(a, 0)?)?)));
    r.fixed("semverCompare", 2, |a| {
        let constraints = Constraints::parse(arg_str(a, 0)?)?;
        let version = Version::parse(arg_str(a, 1)?)?;
        Ok(Value::Bool(constraints.matches(&version)))
    });
}

static VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^v?([0-9]+)(?:\.([0-9]+))?(?:\.([0-9]+))?(?:-([0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*))?(?:\+([0-9A-Za-z\-]+(?:\.[0-9A-Za-z\-]+)*))?$",
    )
    .expect("valid regex")
});

static CONSTRAINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(=>|=<|>=|<=|!=|~>|=|>|<|~|\^)?\s*(v?([0-9xX*]+)(\.[0-9xX*]+)?(\.[0-9xX*]+)?(-[0-9A-Za-z\-\.]+)?(\+[0-9A-Za-z\-\.]+)?)",
    )
    .expect("valid regex")
});

static HYPHEN_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(v?[0-9xX*][0-9A-Za-z\-\.+*]*)\s+-\s+(v?[0-9xX*][0-9A-Za-z\-\.+*]*)")
        .expect("valid regex")
});

fn invalid_version() -> FuncError {
    FuncError::new("Invalid Semantic Version")
}

#[derive(Debug, Clone)]
struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Prerelease,
    build: BuildMetadata,
    original: String,
}

impl Version {
    fn parse(text: &str) -> Result<Self, FuncError> {
        let caps = VERSION.captures(text.trim()).ok_or_else(invalid_version)?;
        let number = |i: usize| -> Result<u64, FuncError> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().map_err(|_| invalid_version()),
                None => Ok(0),
            }
        };
        let pre = match caps.get(4) {
            Some(m) => Prerelease::new(m.as_str()).map_err(|_| invalid_version())?,
            None => Prerelease::EMPTY,
        };
        let build = match caps.get(5) {
            Some(m) => BuildMetadata::new(m.as_str()).map_err(|_| invalid_version())?,
            None => BuildMetadata::EMPTY,
        };
        Ok(Version {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            pre,
            build,
            original: text.to_string(),
        })
    }

    /// Precedence ordering; build metadata is ignored
    fn compare(&self, other: &Version) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| self.pre.cmp(&other.pre))
    }
}

fn version_value(v: &Version) -> Value {
    let mut map = Map::new();
    map.insert("Major".to_string(), Value::Int(v.major as i64));
    map.insert("Minor".to_string(), Value::Int(v.minor as i64));
    map.insert("Patch".to_string(), Value::Int(v.patch as i64));
    map.insert("Prerelease".to_string(), Value::from(v.pre.as_str()));
    map.insert("Metadata".to_string(), Value::from(v.build.as_str()));
    map.insert("Original".to_string(), Value::from(v.original.as_str()));
    Value::from_map(map)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Tilde,
    Caret,
}

impl Op {
    fn parse(text: &str) -> Op {
        match text {
            "!=" => Op::NotEqual,
            ">" => Op::Greater,
            ">=" | "=>" => Op::GreaterEqual,
            "<" => Op::Less,
            "<=" | "=<" => Op::LessEqual,
            "~" | "~>" => Op::Tilde,
            "^" => Op::Caret,
            _ => Op::Equal,
        }
    }
}

#[derive(Debug, Clone)]
struct Comparator {
    op: Op,
    version: Version,
    /// Minor (and so patch) was a wildcard or absent
    minor_dirty: bool,
    /// Patch was a wildcard or absent
    patch_dirty: bool,
}

fn is_wild(part: Option<&str>) -> bool {
    matches!(part, None | Some("x" | "X" | "*"))
}

impl Comparator {
    fn parse(caps: &regex::Captures<'_>, original: &str) -> Result<Self, FuncError> {
        let improper = || FuncError::new(format!("improper constraint: {}", original));
        let op = Op::parse(caps.get(1).map_or("", |m| m.as_str()));
        let major = caps.get(3).map(|m| m.as_str());
        let minor = caps.get(4).map(|m| &m.as_str()[1..]);
        let patch = caps.get(5).map(|m| &m.as_str()[1..]);
        let suffix = format!(
            "{}{}",
            caps.get(6).map_or("", |m| m.as_str()),
            caps.get(7).map_or("", |m| m.as_str())
        );

        let (text, minor_dirty, patch_dirty) = if is_wild(major) {
            (format!("0.0.0{}", suffix), true, true)
        } else if is_wild(minor) {
            (format!("{}.0.0{}", major.unwrap_or("0"), suffix), true, true)
        } else if is_wild(patch) {
            (
                format!("{}.{}.0{}", major.unwrap_or("0"), minor.unwrap_or("0"), suffix),
                false,
                true,
            )
        } else {
            (
                format!(
                    "{}.{}.{}{}",
                    major.unwrap_or("0"),
                    minor.unwrap_or("0"),
                    patch.unwrap_or("0"),
                    suffix
                ),
                false,
                false,
            )
        };
        let version = Version::parse(&text).map_err(|_| improper())?;
        Ok(Comparator {
            op,
            version,
            minor_dirty,
            patch_dirty,
        })
    }

    fn dirty(&self) -> bool {
        self.minor_dirty || self.patch_dirty
    }

    fn matches(&self, v: &Version) -> bool {
        if !v.pre.is_empty() && self.version.pre.is_empty() {
            return false;
        }
        let c = &self.version;
        match self.op {
            Op::Equal if self.dirty() => self.tilde(v),
            Op::Equal => v.compare(c) == Ordering::Equal,
            Op::NotEqual if self.dirty() => !self.tilde(v),
            Op::NotEqual => v.compare(c) != Ordering::Equal,
            Op::Greater if self.minor_dirty => v.major > c.major,
            Op::Greater if self.patch_dirty => (v.major, v.minor) > (c.major, c.minor),
            Op::Greater => v.compare(c) == Ordering::Greater,
            Op::GreaterEqual => v.compare(c) != Ordering::Less,
            Op::Less => v.compare(c) == Ordering::Less,
            Op::LessEqual if self.minor_dirty => v.major <= c.major,
            Op::LessEqual if self.patch_dirty => (v.major, v.minor) <= (c.major, c.minor),
            Op::LessEqual => v.compare(c) != Ordering::Greater,
            Op::Tilde => self.tilde(v),
            Op::Caret => self.caret(v),
        }
    }

    fn tilde(&self, v: &Version) -> bool {
        let c = &self.version;
        if v.compare(c) == Ordering::Less {
            return false;
        }
        if c.major == 0 && c.minor == 0 && c.patch == 0 && self.minor_dirty {
            return true;
        }
        v.major == c.major && (self.minor_dirty || v.minor == c.minor)
    }

    fn caret(&self, v: &Version) -> bool {
        let c = &self.version;
        if v.compare(c) == Ordering::Less {
            return false;
        }
        if c.major > 0 || self.minor_dirty {
            return v.major == c.major;
        }
        if v.major != 0 {
            return false;
        }
        if c.minor > 0 || self.patch_dirty {
            return v.minor == c.minor;
        }
        v.minor == 0 && v.patch == c.patch
    }
}

/// OR of AND groups
#[derive(Debug, Clone)]
struct Constraints {
    groups: Vec<Vec<Comparator>>,
}

impl Constraints {
    fn parse(text: &str) -> Result<Self, FuncError> {
        let rewritten = HYPHEN_RANGE.replace_all(text, ">= $1, <= $2");
        let mut groups = Vec::new();
        for group in rewritten.split("||") {
            let improper = || FuncError::new(format!("improper constraint: {}", group.trim()));
            let mut comparators = Vec::new();
            let mut covered = 0;
            let mut leftover = String::new();
            for caps in CONSTRAINT.captures_iter(group) {
                let Some(whole) = caps.get(0) else { continue };
                leftover.push_str(&group[covered..whole.start()]);
                covered = whole.end();
                comparators.push(Comparator::parse(&caps, whole.as_str())?);
            }
            leftover.push_str(&group[covered..]);
            if comparators.is_empty() || !leftover.chars().all(|c| c == ',' || c.is_whitespace()) {
                return Err(improper());
            }
            groups.push(comparators);
        }
        Ok(Constraints { groups })
    }

    fn matches(&self, version: &Version) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|c| c.matches(version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(constraint: &str, version: &str) -> bool {
        let constraints = Constraints::parse(constraint).unwrap();
        constraints.matches(&Version::parse(version).unwrap())
    }

    #[test]
    fn test_parse_lenient_versions() {
        let v = Version::parse("v1.2").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 0));
        let v = Version::parse("1.20.3-gke.100+build.5").unwrap();
        assert_eq!(v.pre.as_str(), "gke.100");
        assert_eq!(v.build.as_str(), "build.5");
        assert!(Version::parse("one.two").is_err());
    }

    #[test]
    fn test_basic_comparisons() {
        assert!(check(">=1.2.3", "1.2.3"));
        assert!(check("> 1.2.3", "1.3.0"));
        assert!(!check("<1.2.3", "1.2.3"));
        assert!(check("!=1.2.3", "1.2.4"));
        assert!(check("=1.2.3", "v1.2.3"));
        assert!(check("1.2.3", "1.2.3"));
    }

    #[test]
    fn test_and_or_groups() {
        assert!(check(">=1.0.0, <2.0.0", "1.5.0"));
        assert!(check(">=1.0.0 <2.0.0", "1.5.0"));
        assert!(!check(">=1.0.0, <2.0.0", "2.0.0"));
        assert!(check("<1.0.0 || >=3.0.0", "3.1.0"));
        assert!(check("1.0.0 - 2.0.0", "2.0.0"));
        assert!(!check("1.0.0 - 2.0.0", "2.0.1"));
    }

    #[test]
    fn test_tilde_caret_and_wildcards() {
        assert!(check("~1.2.3", "1.2.9"));
        assert!(!check("~1.2.3", "1.3.0"));
        assert!(check("^1.2.3", "1.9.0"));
        assert!(!check("^1.2.3", "2.0.0"));
        assert!(check("^0.2.3", "0.2.9"));
        assert!(!check("^0.2.3", "0.3.0"));
        assert!(check("^0.0.3", "0.0.3"));
        assert!(!check("^0.0.3", "0.0.4"));
        assert!(check("1.2.x", "1.2.7"));
        assert!(!check("1.2.x", "1.3.0"));
        assert!(check("*", "4.0.0"));
        assert!(check(">1.x", "2.0.0"));
        assert!(!check(">1.x", "1.9.0"));
    }

    #[test]
    fn test_prerelease_rules() {
        assert!(!check(">=1.19.0", "1.20.0-gke.1"));
        assert!(check(">=1.19.0-0", "1.20.0-gke.1"));
        assert!(check(">=1.19-0", "v1.21.3-eks-1"));
    }

    #[test]
    fn test_improper_constraint() {
        match Constraints::parse(">== nope") {
            Err(FuncError::Call { message, .. }) => {
                assert!(message.starts_with("improper constraint"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_semver_value() {
        let v = version_value(&Version::parse("1.2.3-rc.1").unwrap());
        assert_eq!(v.get("Minor").unwrap().to_string(), "2");
        assert_eq!(v.get("Prerelease").unwrap().to_string(), "rc.1");
    }
}
