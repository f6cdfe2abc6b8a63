//! Build metadata injected by `build.rs`

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CI build number, `0` for local builds
pub const BUILD_NUMBER: &str = env!("BUILD_NUMBER");

/// Short git commit hash, or `unknown`
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");

/// RFC 3339 build time
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");

/// One-line version string for `flowgraph --version` and startup logs
///
/// ```
/// let version = flowgraph::version::long_version();
/// assert!(version.starts_with("Flowgraph v"));
/// ```
pub fn long_version() -> String {
    format!(
        "Flowgraph v{} (build {}, commit {}, built {})",
        VERSION, BUILD_NUMBER, GIT_COMMIT, BUILD_TIMESTAMP
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_metadata_present() {
        assert!(!BUILD_NUMBER.is_empty());
        assert!(!GIT_COMMIT.is_empty());
        assert!(!BUILD_TIMESTAMP.is_empty());
    }

    #[test]
    fn test_long_version() {
        let version = long_version();
        assert!(version.contains(VERSION));
        assert!(version.contains(GIT_COMMIT));
    }
}
