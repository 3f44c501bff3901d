//! Navigation and filesystem policy guards.
//!
//! [`NavigationPolicy`] rejects any navigation target whose scheme is not
//! http/https unless local-file access was explicitly permitted.
//! [`ensure_within_root`] rejects filesystem targets that resolve outside
//! a given root, including escapes via `..` components.

// ============================================================================
// Imports
// ============================================================================

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// NavigationPolicy
// ============================================================================

/// Scheme policy applied to every navigation before it is issued.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationPolicy {
    allow_file_urls: bool,
}

impl NavigationPolicy {
    /// Creates a policy, optionally permitting `file:` URLs.
    #[inline]
    #[must_use]
    pub const fn new(allow_file_urls: bool) -> Self {
        Self { allow_file_urls }
    }

    /// Returns `true` if `file:` URLs are permitted.
    #[inline]
    #[must_use]
    pub const fn allows_file_urls(&self) -> bool {
        self.allow_file_urls
    }

    /// Validates a navigation target.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the input does not parse.
    /// - [`Error::DisallowedUrl`] if the scheme is not http/https, or
    ///   `file` without explicit permission.
    pub fn ensure_allowed(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw).map_err(|_| Error::invalid_url(raw))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            "file" if self.allow_file_urls => Ok(url),
            scheme => Err(Error::disallowed_url(raw, scheme)),
        }
    }
}

// ============================================================================
// Path guard
// ============================================================================

/// Rejects any `candidate` path that resolves outside `root`.
///
/// Resolution is purely lexical: `.` components are dropped and `..`
/// components pop, so escapes are caught without touching the
/// filesystem. Relative candidates are interpreted against the root.
/// The root itself and any descendant are accepted.
///
/// # Errors
///
/// Returns [`Error::PathEscapesRoot`] when the candidate escapes.
pub fn ensure_within_root(root: &Path, candidate: &Path) -> Result<PathBuf> {
    let root = normalize(root);
    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = normalize(&absolute);

    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(Error::path_escapes_root(candidate))
    }
}

/// Lexically normalizes a path, resolving `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the prefix leaves the `..` in place so the
                // starts_with check fails.
                if !normalized.pop() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

// ============================================================================
// Tests
// ============================================================================
