//! Document format versions and their ordering.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

/// A declared `format_version`: either a bare number (`1.8`) or a dotted
/// string (`"1.20.10"`).
#[derive(Debug, Clone, PartialEq)]
pub enum Version {
    Number(f64),
    Dotted(Vec<u64>),
}

impl Version {
    /// Parse a dotted version string. Any non-integer component makes the
    /// whole string invalid.
    pub fn parse(text: &str) -> Option<Version> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        text.split('.')
            .map(|part| part.trim().parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()
            .map(Version::Dotted)
    }

    pub fn from_value(value: &Value) -> Option<Version> {
        match value {
            Value::String(s) => Version::parse(s),
            Value::Number(n) => n.as_f64().map(Version::Number),
            _ => None,
        }
    }

    /// Compare two versions. Numbers compare numerically and dotted versions
    /// component-wise with missing trailing components read as zero. A number
    /// and a dotted string are not comparable.
    pub fn compare(&self, other: &Version) -> Option<Ordering> {
        match (self, other) {
            (Version::Number(a), Version::Number(b)) => a.partial_cmp(b),
            (Version::Dotted(a), Version::Dotted(b)) => {
                let len = a.len().max(b.len());
                let component = |v: &[u64], i: usize| v.get(i).copied().unwrap_or(0);
                Some(
                    (0..len)
                        .map(|i| component(a, i).cmp(&component(b, i)))
                        .find(|ord| ord.is_ne())
                        .unwrap_or(Ordering::Equal),
                )
            }
            _ => None,
        }
    }

    /// Whether a change set declared for `gate` applies to a document at
    /// this version.
    pub fn reaches(&self, gate: &Version) -> bool {
        matches!(
            self.compare(gate),
            Some(Ordering::Greater | Ordering::Equal)
        )
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Number(n) => write!(f, "{n}"),
            Version::Dotted(parts) => {
                let rendered: Vec<String> = parts.iter().map(u64::to_string).collect();
                write!(f, "{}", rendered.join("."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn test_dotted_comparison() {
        assert_eq!(v("1.20.10").compare(&v("1.20.2")), Some(Ordering::Greater));
        assert_eq!(v("1.20").compare(&v("1.20.0")), Some(Ordering::Equal));
        assert_eq!(v("1.19.99").compare(&v("1.20")), Some(Ordering::Less));
    }

    #[test]
    fn test_numeric_comparison() {
        let a = Version::from_value(&json!(1.8)).unwrap();
        let b = Version::from_value(&json!(1.10)).unwrap();
        // numbers compare as numbers, not as dotted components
        assert_eq!(a.compare(&b), Some(Ordering::Greater));
    }

    #[test]
    fn test_mixed_versions_never_reach() {
        let number = Version::Number(2.0);
        let dotted = v("1.0");
        assert_eq!(number.compare(&dotted), None);
        assert!(!number.reaches(&dotted));
        assert!(!dotted.reaches(&number));
    }

    #[test]
    fn test_invalid_version_strings() {
        assert!(Version::parse("").is_none());
        assert!(Version::parse("1.x.0").is_none());
        assert!(Version::from_value(&json!(true)).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(v("1.20.10").to_string(), "1.20.10");
        assert_eq!(Version::Number(1.8).to_string(), "1.8");
    }
}
