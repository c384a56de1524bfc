use std::fmt;

use crate::RefError;

/// A validated reference name (e.g. `refs/heads/main`, `HEAD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    /// Validate and wrap a reference name.
    ///
    /// Enforces the checks from `git check-ref-format` that matter for
    /// reading: no empty components, no `..`, no control characters or
    /// `space ~ ^ : ? * [ \`, no leading/trailing `/` or `.`, no `@{`,
    /// and no trailing `.lock`.
    pub fn new(name: impl Into<String>) -> Result<Self, RefError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RefError::InvalidName("empty name".into()));
        }
        if name.starts_with('/') || name.ends_with('/') || name.ends_with('.') {
            return Err(RefError::InvalidName(name));
        }
        if name.contains("..") || name.contains("@{") || name.contains("//") {
            return Err(RefError::InvalidName(name));
        }
        if name.ends_with(".lock") {
            return Err(RefError::InvalidName(name));
        }
        let has_bad_char = name.chars().any(|c| {
            c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\')
        });
        if has_bad_char {
            return Err(RefError::InvalidName(name));
        }
        if name.split('/').any(|component| component.starts_with('.')) {
            return Err(RefError::InvalidName(name));
        }
        Ok(Self(name))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a canonical (fully qualified) name.
    pub fn is_canonical(&self) -> bool {
        self.0 == "HEAD" || self.0.starts_with("refs/")
    }

    /// The short form: `refs/heads/main` → `main`,
    /// `refs/remotes/origin/dev` → `origin/dev`.
    pub fn short(&self) -> &str {
        for prefix in ["refs/heads/", "refs/tags/", "refs/remotes/", "refs/"] {
            if let Some(rest) = self.0.strip_prefix(prefix) {
                return rest;
            }
        }
        &self.0
    }

    /// Whether this names a local branch.
    pub fn is_branch(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// Whether this names a tag.
    pub fn is_tag(&self) -> bool {
        self.0.starts_with("refs/tags/")
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RefName {
    type Err = RefError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_names() {
        for name in [
            "HEAD",
            "refs/heads/main",
            "refs/heads/feature/nested",
            "refs/tags/v1.0.0",
            "refs/remotes/origin/main",
        ] {
            assert!(RefName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in [
            "",
            "/leading",
            "trailing/",
            "trailing.",
            "double..dot",
            "refs/heads/a b",
            "refs/heads/a:b",
            "refs/heads/.hidden",
            "refs/heads/main.lock",
            "refs/heads/a@{1}",
            "refs//empty",
        ] {
            assert!(RefName::new(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn short_forms() {
        assert_eq!(RefName::new("refs/heads/main").unwrap().short(), "main");
        assert_eq!(RefName::new("refs/tags/v1").unwrap().short(), "v1");
        assert_eq!(
            RefName::new("refs/remotes/origin/dev").unwrap().short(),
            "origin/dev"
        );
        assert_eq!(RefName::new("HEAD").unwrap().short(), "HEAD");
    }

    #[test]
    fn classification() {
        assert!(RefName::new("refs/heads/main").unwrap().is_branch());
        assert!(RefName::new("refs/tags/v1").unwrap().is_tag());
        assert!(RefName::new("HEAD").unwrap().is_canonical());
        assert!(!RefName::new("main").unwrap().is_canonical());
    }
}
