use semver::Version;

/// Parse a release tag (with or without 'v' prefix)
pub fn parse_version(tag: &str) -> Option<Version> {
    Version::parse(tag.trim().trim_start_matches('v')).ok()
}

/// Whether the release identified by `remote` should replace what was
/// installed.
///
/// Semver tags only move forward. Anything else counts as new whenever it
/// differs from the installed one.
pub fn is_newer(remote: &str, installed: Option<&str>) -> bool {
    let Some(installed) = installed else {
        return true;
    };
    match (parse_version(remote), parse_version(installed)) {
        (Some(remote_ver), Some(installed_ver)) => remote_ver > installed_ver,
        _ => remote != installed,
    }
}
