//! Package spec parsing.
//!
//! A spec names one package at one version:
//! - `@blink-cli/init` (latest)
//! - `@blink-cli/init@latest`
//! - `demo-template@1.2.0`

use super::error::PkgError;
use std::fmt;

/// Sentinel accepted in place of a concrete version.
pub const LATEST: &str = "latest";

/// Requested version of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionReq {
    /// Whatever the registry currently tags as `latest`.
    Latest,
    /// A concrete version; never triggers a registry lookup.
    Exact(String),
}

impl VersionReq {
    /// Parse a version string, mapping `"latest"` to the sentinel.
    ///
    /// # Errors
    /// Returns an error if a concrete version is not valid semver.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();
        if input.is_empty() || input == LATEST {
            Ok(Self::Latest)
        } else {
            check_version(input).map_err(PkgError::spec_invalid)?;
            Ok(Self::Exact(input.to_string()))
        }
    }

    #[must_use]
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Exact(v) => f.write_str(v),
        }
    }
}

/// A requested package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Full package name (e.g., "@scope/name" or "name").
    pub name: String,
    pub version: VersionReq,
}

impl PackageSpec {
    /// Build a spec from separate name and version strings.
    ///
    /// # Errors
    /// Returns an error if the name is empty or malformed.
    pub fn new(name: &str, version: &str) -> Result<Self, PkgError> {
        let name = name.trim();
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            version: VersionReq::parse(version)?,
        })
    }

    /// Parse a `name[@version]` string.
    ///
    /// # Errors
    /// Returns an error if the spec is invalid.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package spec"));
        }

        // The version delimiter is the first '@' after the name; for scoped
        // names the leading '@' belongs to the scope.
        let search_from = usize::from(input.starts_with('@'));
        match input[search_from..].find('@') {
            Some(rel) => {
                let at_pos = search_from + rel;
                let version = &input[at_pos + 1..];
                if version.is_empty() {
                    return Err(PkgError::spec_invalid(format!(
                        "Invalid package spec: empty version in '{input}'"
                    )));
                }
                Self::new(&input[..at_pos], version)
            }
            None => Self::new(input, LATEST),
        }
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Check that `version` is a concrete semver version.
///
/// Versions become part of cache directory names, so anything else
/// (path separators, `..`, ranges) is refused.
///
/// # Errors
/// Returns a message describing the rejected version.
pub fn check_version(version: &str) -> Result<(), String> {
    semver::Version::parse(version)
        .map(|_| ())
        .map_err(|e| format!("Invalid version '{version}': {e}"))
}

fn validate_name(name: &str) -> Result<(), PkgError> {
    if name.is_empty() {
        return Err(PkgError::spec_invalid("Empty package name"));
    }

    let bare = if let Some(scoped) = name.strip_prefix('@') {
        let Some((scope, rest)) = scoped.split_once('/') else {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: missing '/' in '{name}'"
            )));
        };
        if scope.is_empty() || rest.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: empty scope or name in '{name}'"
            )));
        }
        check_chars(scope, name)?;
        rest
    } else {
        name
    };

    check_chars(bare, name)
}

fn check_chars(part: &str, full: &str) -> Result<(), PkgError> {
    for c in part.chars() {
        if !c.is_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(PkgError::spec_invalid(format!(
                "Invalid character '{c}' in package name '{full}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::pkg_codes;

    #[test]
    fn test_parse_simple_defaults_to_latest() {
        let spec = PackageSpec::parse("demo-template").unwrap();
        assert_eq!(spec.name, "demo-template");
        assert_eq!(spec.version, VersionReq::Latest);
    }

    #[test]
    fn test_parse_with_version() {
        let spec = PackageSpec::parse("demo-template@1.2.0").unwrap();
        assert_eq!(spec.name, "demo-template");
        assert_eq!(spec.version, VersionReq::Exact("1.2.0".to_string()));
    }

    #[test]
    fn test_parse_scoped() {
        let spec = PackageSpec::parse("@blink-cli/init").unwrap();
        assert_eq!(spec.name, "@blink-cli/init");
        assert!(spec.version.is_latest());
    }

    #[test]
    fn test_parse_scoped_with_version() {
        let spec = PackageSpec::parse("@blink-cli/init@2.0.1").unwrap();
        assert_eq!(spec.name, "@blink-cli/init");
        assert_eq!(spec.version, VersionReq::Exact("2.0.1".to_string()));
    }

    #[test]
    fn test_explicit_latest_is_sentinel() {
        let spec = PackageSpec::parse("@blink-cli/init@latest").unwrap();
        assert!(spec.version.is_latest());
        assert_eq!(spec.to_string(), "@blink-cli/init@latest");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(PackageSpec::parse("").is_err());
        assert!(PackageSpec::parse("   ").is_err());
        assert!(PackageSpec::parse("@").is_err());
        assert!(PackageSpec::parse("@scope").is_err());
        assert!(PackageSpec::parse("@scope/").is_err());
        assert!(PackageSpec::parse("demo@").is_err());
        assert!(PackageSpec::parse("has space").is_err());
        assert!(PackageSpec::new("", "1.0.0").is_err());
    }

    #[test]
    fn test_version_must_be_semver() {
        for bad in ["../../../x", "1.0.0/../../escaped", "1.0", "^1.2.0", "1.0.0\\..\\x"] {
            let err = PackageSpec::parse(&format!("demo@{bad}")).unwrap_err();
            assert_eq!(err.code(), pkg_codes::PKG_SPEC_INVALID, "{bad}");
        }
        let spec = PackageSpec::new("demo", "2.0.0-beta.1").unwrap();
        assert_eq!(spec.version, VersionReq::Exact("2.0.0-beta.1".to_string()));
    }
}
