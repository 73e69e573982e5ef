//! SPDX-License-Identifier: MIT

//! Capability-check policy sugar: synthesizes a capabilities map from a
//! version string for servers that predate direct capability queries.

use indexmap::IndexMap;

/// `capability -> minimum (major, minor, patch)` version that introduced it.
const CAPABILITY_VERSIONS: &[(&str, (u32, u32, u32))] = &[
    ("cmd-watch-del-all", (3, 1, 1)),
    ("cmd-watch-project", (3, 1, 0)),
    ("relative_root", (3, 3, 0)),
    ("term-dirname", (3, 1, 0)),
    ("term-idirname", (3, 1, 0)),
    ("wildmatch", (3, 7, 0)),
];

/// The result of a capability check: the server's version string plus a
/// `name -> supported` map.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityResult {
    pub version: String,
    pub capabilities: IndexMap<String, bool>,
}

/// Parses a dotted version string's first three numeric components,
/// defaulting missing or non-numeric components to 0.
pub(crate) fn parse_version(version: &str) -> (u32, u32, u32) {
    let mut parts = version.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Synthesizes a `capability -> bool` map from a version string for servers
/// too old to answer a capability query directly. Names absent from
/// [`CAPABILITY_VERSIONS`] are reported unsupported rather than assumed
/// present.
pub(crate) fn synthesize<'a>(
    version: &str,
    names: impl Iterator<Item = &'a str>,
) -> IndexMap<String, bool> {
    let have = parse_version(version);
    names
        .map(|name| {
            let supported = CAPABILITY_VERSIONS
                .iter()
                .find(|(n, _)| *n == name)
                .is_some_and(|(_, min)| have >= *min);
            (name.to_owned(), supported)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_version() {
        assert_eq!(parse_version("3.1.1"), (3, 1, 1));
        assert_eq!(parse_version("3.7"), (3, 7, 0));
        assert_eq!(parse_version("4"), (4, 0, 0));
        assert_eq!(parse_version(""), (0, 0, 0));
    }

    #[test]
    fn synthesizes_from_version_component_wise() {
        let caps = synthesize("3.1.0", ["cmd-watch-del-all", "cmd-watch-project"].into_iter());
        assert_eq!(caps.get("cmd-watch-del-all"), Some(&false));
        assert_eq!(caps.get("cmd-watch-project"), Some(&true));
    }

    #[test]
    fn unknown_capability_is_unsupported() {
        let caps = synthesize("99.0.0", ["not-a-real-capability"].into_iter());
        assert_eq!(caps.get("not-a-real-capability"), Some(&false));
    }

    #[test]
    fn exact_minimum_version_is_supported() {
        let caps = synthesize("3.7.0", ["wildmatch"].into_iter());
        assert_eq!(caps.get("wildmatch"), Some(&true));
    }
}
