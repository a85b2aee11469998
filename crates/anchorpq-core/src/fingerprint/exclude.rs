//! Exclusion policy for generated and volatile build artifacts.

use std::ffi::OsStr;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use super::FingerprintError;

/// File-name patterns excluded from integrity computation by default.
///
/// These cover resource/config classes regenerated on every build and
/// framework-generated code whose bytes are not stable across otherwise
/// identical builds.
const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    r"^R\.class$",
    r"^R\$.*\.class$",
    r"^BuildConfig\.class$",
    r".*\$\$.*\.class$",
    r".*_Factory\.class$",
    r".*_MembersInjector\.class$",
    r"^Hilt_.*\.class$",
    r".*\.dex$",
];

/// Path segment whose contents are always excluded.
const META_INF_SEGMENT: &str = "META-INF";

/// Compiled exclusion policy: the defaults unioned with user additions.
#[derive(Debug)]
pub struct ExclusionPolicy {
    patterns: Vec<Regex>,
}

impl ExclusionPolicy {
    /// Compiles the default patterns plus `extra_patterns`.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::InvalidExcludePattern`] when an extra
    /// pattern is not a valid regular expression.
    pub fn new(extra_patterns: &[String]) -> Result<Self, FingerprintError> {
        let mut patterns = Vec::with_capacity(DEFAULT_EXCLUDE_PATTERNS.len() + extra_patterns.len());

        for pattern in DEFAULT_EXCLUDE_PATTERNS {
            // Defaults are compile-time constants; a failure here is a bug.
            patterns.push(Regex::new(pattern).map_err(|e| {
                FingerprintError::InvalidExcludePattern {
                    pattern: (*pattern).to_string(),
                    reason: e.to_string(),
                }
            })?);
        }

        for pattern in extra_patterns {
            patterns.push(Regex::new(pattern).map_err(|e| {
                FingerprintError::InvalidExcludePattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }
            })?);
        }

        Ok(Self { patterns })
    }

    /// Returns `true` when `path` should participate in the fingerprint.
    ///
    /// A file is retained when its name ends in `.class`, matches no
    /// exclusion pattern, and no path segment is `META-INF`.
    #[must_use]
    pub fn retains(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if !file_name.ends_with(".class") {
            return false;
        }

        for pattern in &self.patterns {
            if pattern.is_match(file_name) {
                debug!(file = file_name, pattern = pattern.as_str(), "excluding");
                return false;
            }
        }

        if path
            .components()
            .any(|c| c.as_os_str() == OsStr::new(META_INF_SEGMENT))
        {
            debug!(file = file_name, "excluding META-INF file");
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn policy() -> ExclusionPolicy {
        ExclusionPolicy::new(&[]).unwrap()
    }

    #[test]
    fn retains_ordinary_class_files() {
        assert!(policy().retains(&PathBuf::from("com/example/Main.class")));
        assert!(policy().retains(&PathBuf::from("A.class")));
    }

    #[test]
    fn rejects_non_class_files() {
        assert!(!policy().retains(&PathBuf::from("com/example/readme.txt")));
        assert!(!policy().retains(&PathBuf::from("classes.dex")));
    }

    #[test]
    fn rejects_generated_classes() {
        let p = policy();
        for name in [
            "R.class",
            "R$drawable.class",
            "BuildConfig.class",
            "Main$$InjectAdapter.class",
            "Repo_Factory.class",
            "App_MembersInjector.class",
            "Hilt_MainActivity.class",
        ] {
            assert!(!p.retains(&PathBuf::from(name)), "{name} should be excluded");
        }
    }

    #[test]
    fn generated_name_rules_apply_to_file_name_not_directory() {
        // The directory is named like a generated class but the file is not.
        assert!(policy().retains(&PathBuf::from("Hilt_Module/Plain.class")));
    }

    #[test]
    fn rejects_meta_inf_segment_anywhere() {
        assert!(!policy().retains(&PathBuf::from("META-INF/services/X.class")));
        assert!(!policy().retains(&PathBuf::from("a/META-INF/X.class")));
    }

    #[test]
    fn extra_patterns_are_unioned() {
        let p = ExclusionPolicy::new(&[r"^Generated.*\.class$".to_string()]).unwrap();
        assert!(!p.retains(&PathBuf::from("GeneratedThing.class")));
        assert!(p.retains(&PathBuf::from("Thing.class")));
    }

    #[test]
    fn invalid_extra_pattern_rejected() {
        let err = ExclusionPolicy::new(&["(unclosed".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            FingerprintError::InvalidExcludePattern { .. }
        ));
    }
}
