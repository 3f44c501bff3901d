//! Selector classification and shadow-piercing chain splitting.
//!
//! Two selector languages share one entry point. A trimmed input is a
//! path query when it starts with `/`, `./`, `.//`, `..`, or is a
//! parenthesized expression whose first inner token starts with `/` or
//! `.`; everything else is CSS. A CSS selector may additionally contain
//! the `>>>` combinator, which splits it into an ordered chain of
//! segments resolved across shadow-root boundaries.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// SelectorKind / ParsedSelector
// ============================================================================

/// The selector language a given input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    /// A CSS selector, possibly containing `>>>` shadow-piercing chains.
    Css,
    /// A document-path expression evaluated by the browser's path engine.
    PathQuery,
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css => f.write_str("css"),
            Self::PathQuery => f.write_str("path-query"),
        }
    }
}

/// A trimmed selector together with its classified language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
    /// Classified language.
    pub kind: SelectorKind,
    /// Trimmed selector text.
    pub value: String,
}

impl ParsedSelector {
    /// Classifies `input` and trims it.
    #[must_use]
    pub fn classify(input: &str) -> Self {
        let value = input.trim();
        let kind = if is_path_query(value) {
            SelectorKind::PathQuery
        } else {
            SelectorKind::Css
        };
        Self {
            kind,
            value: value.to_string(),
        }
    }

    /// Forces path-query interpretation, bypassing classification.
    ///
    /// Used by the explicit path-query entry points.
    #[must_use]
    pub fn path_query(input: &str) -> Self {
        Self {
            kind: SelectorKind::PathQuery,
            value: input.trim().to_string(),
        }
    }

    /// Splits a CSS selector on the `>>>` combinator.
    ///
    /// Returns `Some` only when the combinator is present; segments are
    /// trimmed and empty segments dropped. Path queries never chain.
    #[must_use]
    pub fn pierce_segments(&self) -> Option<Vec<&str>> {
        if self.kind != SelectorKind::Css || !self.value.contains(">>>") {
            return None;
        }
        Some(
            self.value
                .split(">>>")
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .collect(),
        )
    }
}

fn is_path_query(value: &str) -> bool {
    if value.starts_with('/') || value.starts_with("./") || value.starts_with("..") {
        return true;
    }
    if let Some(inner) = value.strip_prefix('(') {
        let inner = inner.trim_start();
        return inner.starts_with('/') || inner.starts_with('.');
    }
    false
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_path_query_prefixes() {
        for selector in [
            "/html/body",
            "//div[@id='x']",
            "./span",
            ".//input",
            "..",
            "../div",
            "(//a)[1]",
            "( //a )[1]",
            "(./b)[2]",
        ] {
            assert_eq!(
                ParsedSelector::classify(selector).kind,
                SelectorKind::PathQuery,
                "{selector}"
            );
        }
    }

    #[test]
    fn test_css_selectors() {
        for selector in [
            "#submit",
            "div.card > a",
            "input[name='q']",
            ":hover",
            "a, b",
            "(foo)",
            "host-element >>> .inner",
            ".leading-dot-class",
        ] {
            assert_eq!(
                ParsedSelector::classify(selector).kind,
                SelectorKind::Css,
                "{selector}"
            );
        }
    }

    #[test]
    fn test_classification_trims_first() {
        let parsed = ParsedSelector::classify("   //div  ");
        assert_eq!(parsed.kind, SelectorKind::PathQuery);
        assert_eq!(parsed.value, "//div");
    }

    #[test]
    fn test_forced_path_query_bypasses_classification() {
        let parsed = ParsedSelector::path_query("div");
        assert_eq!(parsed.kind, SelectorKind::PathQuery);
    }

    #[test]
    fn test_pierce_segments() {
        let parsed = ParsedSelector::classify("app-root >>> .panel >>> button");
        assert_eq!(
            parsed.pierce_segments(),
            Some(vec!["app-root", ".panel", "button"])
        );

        assert_eq!(ParsedSelector::classify("#plain").pierce_segments(), None);
    }

    #[test]
    fn test_pierce_segments_drop_empty() {
        let parsed = ParsedSelector::classify("a >>> >>> b");
        assert_eq!(parsed.pierce_segments(), Some(vec!["a", "b"]));
    }

    proptest! {
        // CSS-shaped inputs (identifier-led) never classify as path query.
        #[test]
        fn prop_identifier_led_is_css(selector in "[a-zA-Z#][a-zA-Z0-9_#-]{0,20}") {
            prop_assert_eq!(ParsedSelector::classify(&selector).kind, SelectorKind::Css);
        }

        // Slash-led inputs always classify as path query.
        #[test]
        fn prop_slash_led_is_path_query(rest in "[a-zA-Z0-9/@\\[\\]'=_-]{0,20}") {
            let selector = format!("/{rest}");
            prop_assert_eq!(ParsedSelector::classify(&selector).kind, SelectorKind::PathQuery);
        }
    }
}
