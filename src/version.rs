//! Version information.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit SHA supplied by the build environment, or "unknown".
pub const GIT_SHA: &str = match option_env!("MUNINN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// Full version string: `{version}+{sha}` with the SHA shortened to 7 chars.
///
/// Examples:
/// - `0.1.0+abc1234`
/// - `0.1.0+unknown`
pub fn version_string() -> String {
    format!("{PKG_VERSION}+{}", short_sha(GIT_SHA))
}

/// First 7 characters of `sha`.
fn short_sha(sha: &str) -> String {
    sha.chars().take(7).collect()
}
