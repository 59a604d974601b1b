//! Extension → language mapping and the default ignore globs.

use std::path::Path;

use crate::model::Language;

pub fn detect(path: &Path) -> Language {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => Language::from_extension(ext),
        None => Language::Unknown,
    }
}

/// Default ignore globs: VCS, build artifacts, lockfiles, binaries. The
/// caller may extend this list (`IGNORE_GLOBS`).
pub const DEFAULT_IGNORE_GLOBS: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/.next/**",
    "**/vendor/**",
    "**/*.lock",
    "**/Cargo.lock",
    "**/package-lock.json",
    "**/*.min.js",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.ico",
    "**/*.woff",
    "**/*.woff2",
    "**/*.pdf",
    "**/*.zip",
    "**/*.so",
    "**/*.dylib",
    "**/*.dll",
];

pub fn is_ignored(relative_path: &str, extra_globs: &[String]) -> bool {
    DEFAULT_IGNORE_GLOBS
        .iter()
        .map(|g| g.to_string())
        .chain(extra_globs.iter().cloned())
        .any(|pattern| glob_match(&pattern, relative_path))
}

/// Matches the small vocabulary of glob shapes the default ignore list
/// actually uses (`**/dir/**`, `**/*.ext`, `**/name`); not a general glob
/// implementation.
fn glob_match(pattern: &str, text: &str) -> bool {
    if let Some(dir) = pattern.strip_prefix("**/").and_then(|p| p.strip_suffix("/**")) {
        return text == dir || text.starts_with(&format!("{dir}/")) || text.contains(&format!("/{dir}/"));
    }
    if let Some(suffix) = pattern.strip_prefix("**/*") {
        return text.ends_with(suffix);
    }
    if let Some(name) = pattern.strip_prefix("**/") {
        return text == name || text.ends_with(&format!("/{name}"));
    }
    text == pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn maps_known_extensions() {
        assert_eq!(detect(&PathBuf::from("a.rs")), Language::Rust);
        assert_eq!(detect(&PathBuf::from("a.tsx")), Language::TypeScript);
        assert_eq!(detect(&PathBuf::from("a.unknownext")), Language::Unknown);
    }

    #[test]
    fn ignores_vcs_and_lockfiles() {
        assert!(is_ignored(".git/HEAD", &[]));
        assert!(is_ignored("Cargo.lock", &[]));
        assert!(is_ignored("node_modules/foo/index.js", &[]));
        assert!(!is_ignored("src/lib.rs", &[]));
    }
}
