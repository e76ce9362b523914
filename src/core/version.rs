//! Component versions.

use std::fmt;
use std::str::FromStr;

use crate::errors::ProvisionError;

/// A `major.minor.patch` release number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ComponentVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        ComponentVersion {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ComponentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ComponentVersion {
    type Err = ProvisionError;

    /// Parse exactly three dot-separated non-negative integers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ProvisionError::InvalidInput(format!(
                "invalid version `{s}`; expected MAJOR.MINOR.PATCH, e.g. 4.4.0"
            ))
        };

        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u32, ProvisionError> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };

        let version = ComponentVersion::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let v: ComponentVersion = "4.4.0".parse().unwrap();
        assert_eq!(v, ComponentVersion::new(4, 4, 0));
        assert_eq!(v.to_string(), "4.4.0");
    }

    #[test]
    fn test_rejects_malformed() {
        for input in ["4.x.0", "4.4", "4.4.0.1", "", "4..0", "-1.0.0", "+4.4.0", "4.4.0-rc1", "v4.4.0"] {
            assert!(
                matches!(input.parse::<ComponentVersion>(), Err(ProvisionError::InvalidInput(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_ordering() {
        let a: ComponentVersion = "4.4.0".parse().unwrap();
        let b: ComponentVersion = "4.10.0".parse().unwrap();
        assert!(a < b);
    }
}
