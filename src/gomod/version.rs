use std::cmp::Ordering;

/// A Go module version (`v` + semantic version)
///
/// Build metadata is only allowed as `+incompatible`, which Go uses for
/// major versions >= 2 published without a go.mod. It does not take part in
/// ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoVersion {
    pub original: String,
    parsed: semver::Version,
}

impl GoVersion {
    pub fn parse(version: &str) -> Option<Self> {
        let rest = version.strip_prefix('v')?;
        let parsed = semver::Version::parse(rest).ok()?;

        if !parsed.build.is_empty() && parsed.build.as_str() != "incompatible" {
            return None;
        }

        Some(Self {
            original: version.to_string(),
            parsed,
        })
    }

    /// Canonical form of a possibly shortened version, as `go mod` rewrites it.
    ///
    /// `v1.2` becomes `v1.2.0` and `v1` becomes `v1.0.0`. Build metadata is
    /// dropped except for `+incompatible`. Returns `None` for invalid input.
    pub fn canonicalize(version: &str) -> Option<String> {
        let rest = version.strip_prefix('v')?;
        let (rest, build) = match rest.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (rest, None),
        };
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let short = pre.is_none() && build.is_none();
        let core = match core.split('.').collect::<Vec<_>>().as_slice() {
            [_, _, _] => core.to_string(),
            [major, minor] if short => format!("{major}.{minor}.0"),
            [major] if short => format!("{major}.0.0"),
            _ => return None,
        };

        let mut full = core;
        if let Some(pre) = pre {
            full.push('-');
            full.push_str(pre);
        }
        let mut canonical = format!("v{full}");
        if let Some(build) = build {
            full.push('+');
            full.push_str(build);
        }
        semver::Version::parse(&full).ok()?;

        if build == Some("incompatible") {
            canonical.push_str("+incompatible");
        }
        Some(canonical)
    }

    pub fn major(&self) -> u64 {
        self.parsed.major
    }

    pub fn is_incompatible(&self) -> bool {
        !self.parsed.build.is_empty()
    }

    pub fn is_prerelease(&self) -> bool {
        !self.parsed.pre.is_empty()
    }

    fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.parsed.cmp_precedence(&other.parsed)
    }
}

impl PartialOrd for GoVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GoVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_precedence(other)
            .then_with(|| self.original.cmp(&other.original))
    }
}

/// Major-version suffix of a module path: `/vN` (N >= 2), `.vN` for
/// gopkg.in paths, or `""`. `None` when the suffix itself is malformed.
pub fn path_major(path: &str) -> Option<&str> {
    let bytes = path.as_bytes();

    if path.starts_with("gopkg.in/") {
        let mut i = path.strip_suffix("-unstable").map_or(path.len(), str::len);
        while i > 0 && bytes[i - 1].is_ascii_digit() {
            i -= 1;
        }
        if i <= 1 || bytes[i - 1] != b'v' || bytes[i - 2] != b'.' {
            return None;
        }
        let major = &path[i - 2..];
        if major.len() <= 2 || (major.as_bytes()[2] == b'0' && major != ".v0") {
            return None;
        }
        return Some(major);
    }

    let mut i = bytes.len();
    let mut dot = false;
    while i > 0 && (bytes[i - 1].is_ascii_digit() || bytes[i - 1] == b'.') {
        dot |= bytes[i - 1] == b'.';
        i -= 1;
    }
    if i <= 1 || i == bytes.len() || bytes[i - 1] != b'v' || bytes[i - 2] != b'/' {
        return Some("");
    }
    let major = &path[i - 2..];
    if dot || major.len() <= 2 || major.as_bytes()[2] == b'0' || major == "/v1" {
        return None;
    }
    Some(major)
}

/// Checks that a canonical `version` fits the module path's major suffix.
///
/// Unsuffixed paths take v0 and v1, or `+incompatible` versions.
pub fn check_path_major(version: &GoVersion, path_major: &str) -> Result<(), String> {
    let path_major = match path_major.strip_prefix(".v") {
        Some(_) => path_major.strip_suffix("-unstable").unwrap_or(path_major),
        None => path_major,
    };

    if path_major == ".v1" && version.original.starts_with("v0.0.0-") {
        return Ok(());
    }

    let major = format!("v{}", version.major());
    let expected = match path_major {
        "" if version.major() <= 1 || version.is_incompatible() => return Ok(()),
        "" => "v0 or v1",
        suffix if suffix[1..] == major => return Ok(()),
        suffix => &suffix[1..],
    };

    Err(format!("should be {}, not {}", expected, major))
}

pub struct VersionComparator;

impl VersionComparator {
    /// Picks the update `go list -u` would report for `current` out of `available`.
    ///
    /// The newest release wins; pre-releases count only for modules that have
    /// no release at all. The pick must be strictly newer than `current`.
    pub fn select_update<'a, I>(current: &str, available: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let current = GoVersion::parse(current)?;
        let (prereleases, releases): (Vec<GoVersion>, Vec<GoVersion>) = available
            .into_iter()
            .filter_map(GoVersion::parse)
            .partition(GoVersion::is_prerelease);

        let pool = if releases.is_empty() {
            prereleases
        } else {
            releases
        };

        pool.into_iter()
            .max()
            .filter(|v| v.cmp_precedence(&current) == Ordering::Greater)
            .map(|v| v.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("v1.0.0", true)]
    #[case("v0.0.0-20210101000000-abcdef123456", true)]
    #[case("v2.0.0+incompatible", true)]
    #[case("1.0.0", false)]
    #[case("v1.0", false)]
    #[case("v1.0.0+meta", false)]
    #[case("latest", false)]
    fn parses_canonical_versions(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(GoVersion::parse(input).is_some(), valid);
    }

    #[rstest]
    #[case("v1.2.3", Some("v1.2.3"))]
    #[case("v1.2", Some("v1.2.0"))]
    #[case("v1", Some("v1.0.0"))]
    #[case("v1.0.0+build5", Some("v1.0.0"))]
    #[case("v2.0.0+incompatible", Some("v2.0.0+incompatible"))]
    #[case("v1.1.3-0.20240916144458-20a13a1f6b7c", Some("v1.1.3-0.20240916144458-20a13a1f6b7c"))]
    #[case("v1.2-pre", None)]
    #[case("v1.2+meta", None)]
    #[case("v01.2.3", None)]
    #[case("1.2.3", None)]
    #[case("v1.2.3.4", None)]
    fn canonicalizes_short_versions(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(GoVersion::canonicalize(input).as_deref(), expected);
    }

    #[rstest]
    #[case("example.com/x", Some(""))]
    #[case("example.com/x/v2", Some("/v2"))]
    #[case("example.com/x/v10", Some("/v10"))]
    #[case("example.com/x/v1", None)]
    #[case("example.com/x/v02", None)]
    #[case("example.com/x/v2.1", None)]
    #[case("example.com/v2x", Some(""))]
    #[case("gopkg.in/yaml.v3", Some(".v3"))]
    #[case("gopkg.in/check.v1", Some(".v1"))]
    #[case("gopkg.in/yaml", None)]
    fn splits_path_major(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(path_major(path), expected);
    }

    #[rstest]
    #[case("v1.0.0", "", true)]
    #[case("v0.3.0", "", true)]
    #[case("v2.0.0", "", false)]
    #[case("v2.0.0+incompatible", "", true)]
    #[case("v2.1.0", "/v2", true)]
    #[case("v1.0.0", "/v2", false)]
    #[case("v3.0.1", ".v3", true)]
    #[case("v2.0.0", ".v3", false)]
    #[case("v0.0.0-20200227125254-8fa46927fb4f", ".v1", true)]
    fn checks_path_major(#[case] version: &str, #[case] major: &str, #[case] ok: bool) {
        let version = GoVersion::parse(version).unwrap();
        assert_eq!(check_path_major(&version, major).is_ok(), ok);
    }

    #[test]
    fn path_major_mismatch_names_expected_major() {
        let version = GoVersion::parse("v1.0.0").unwrap();
        assert_eq!(
            check_path_major(&version, "/v2").unwrap_err(),
            "should be v2, not v1"
        );
    }

    #[test]
    fn select_update_skips_prereleases_for_release_current() {
        let available = ["v1.0.0", "v1.1.0", "v1.2.0-rc.1", "v0.9.0"];
        assert_eq!(
            VersionComparator::select_update("v1.0.0", available),
            Some("v1.1.0".to_string())
        );
    }

    #[test]
    fn select_update_keeps_prerelease_current_when_release_is_older() {
        let available = ["v1.0.0", "v1.2.0-rc.1"];
        assert_eq!(
            VersionComparator::select_update("v1.1.0-beta.1", available),
            None
        );
    }

    #[test]
    fn select_update_uses_prereleases_when_no_release_exists() {
        let available = ["v0.1.0-beta.1", "v0.1.0-rc.1"];
        assert_eq!(
            VersionComparator::select_update("v0.1.0-beta.1", available),
            Some("v0.1.0-rc.1".to_string())
        );
    }

    #[test]
    fn select_update_returns_none_when_current_is_newest() {
        let available = ["v1.0.0", "v1.1.0"];
        assert_eq!(VersionComparator::select_update("v1.1.0", available), None);
    }

    #[test]
    fn select_update_ignores_incompatible_suffix_in_ordering() {
        let available = ["v2.0.0+incompatible", "v3.0.0+incompatible"];
        assert_eq!(
            VersionComparator::select_update("v2.0.0+incompatible", available),
            Some("v3.0.0+incompatible".to_string())
        );
    }
}
