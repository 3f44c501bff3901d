//! JavaScript source builders for remote evaluation.
//!
//! Frame operations run against the live document by evaluating small
//! scripts remotely. This module assembles those scripts: the deep
//! (shadow-piercing) query helpers, the `>>>` chain resolver, and the
//! per-operation expressions. Everything user-supplied (selectors,
//! values, attribute names) is embedded JSON-escaped.
//!
//! Deep traversal order is self, then own shadow root, then children,
//! at every recursion level; the first-match helper returns the first
//! element found in that order and the all-matches helper the complete
//! set.

// ============================================================================
// Imports
// ============================================================================

use super::selector::{ParsedSelector, SelectorKind};

// ============================================================================
// JS Helpers
// ============================================================================

const QUERY_DEEP: &str = r"
const queryDeep = (start, selector) => {
  const visit = (node) => {
    if (node.matches && node.matches(selector)) return node;
    if (node.shadowRoot) {
      for (const child of node.shadowRoot.children) {
        const found = visit(child);
        if (found) return found;
      }
    }
    for (const child of node.children) {
      const found = visit(child);
      if (found) return found;
    }
    return null;
  };
  for (const child of start.children) {
    const found = visit(child);
    if (found) return found;
  }
  return null;
};";

const QUERY_ALL_DEEP: &str = r"
const queryAllDeep = (start, selector) => {
  const results = [];
  const visit = (node) => {
    if (node.matches && node.matches(selector)) results.push(node);
    if (node.shadowRoot) {
      for (const child of node.shadowRoot.children) visit(child);
    }
    for (const child of node.children) visit(child);
  };
  for (const child of start.children) visit(child);
  return results;
};";

const QUERY_CHAIN: &str = r"
const queryChain = (segments) => {
  let scope = [document];
  for (const segment of segments) {
    const next = [];
    for (const node of scope) {
      const roots = [node];
      if (node.shadowRoot) roots.push(node.shadowRoot);
      for (const root of roots) next.push(...root.querySelectorAll(segment));
    }
    if (!next.length) return [];
    scope = next;
  }
  return scope;
};";

/// JSON-escapes a string for embedding in a script.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn js_string_array(values: &[&str]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

/// Helper declarations plus an expression yielding element-or-null.
fn finder(parsed: &ParsedSelector, pierce: bool) -> (String, String) {
    let selector = js_string(&parsed.value);
    match parsed.kind {
        SelectorKind::PathQuery => (
            String::new(),
            format!(
                "document.evaluate({selector}, document, null, \
                 XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
            ),
        ),
        SelectorKind::Css => {
            if let Some(segments) = parsed.pierce_segments() {
                let segments = js_string_array(&segments);
                (
                    QUERY_CHAIN.to_string(),
                    format!("(queryChain({segments})[0] || null)"),
                )
            } else if pierce {
                (
                    QUERY_DEEP.to_string(),
                    format!("queryDeep(document, {selector})"),
                )
            } else {
                (String::new(), format!("document.querySelector({selector})"))
            }
        }
    }
}

/// Wraps `body` (which may reference `el`) in an evaluated closure.
pub fn eval_on_element(parsed: &ParsedSelector, pierce: bool, body: &str) -> String {
    let (helpers, found) = finder(parsed, pierce);
    format!("(function() {{{helpers}\n  const el = {found};\n  {body}\n}})()")
}

// ============================================================================
// Query Expressions
// ============================================================================

/// Expression yielding the first matching element handle, or null.
pub fn query_first(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(parsed, pierce, "return el;")
}

/// Expression yielding an array of every matching element handle.
pub fn query_all(parsed: &ParsedSelector, pierce: bool) -> String {
    let selector = js_string(&parsed.value);
    match parsed.kind {
        SelectorKind::PathQuery => format!(
            "(function() {{
  const result = document.evaluate({selector}, document, null, \
XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
  const nodes = [];
  for (let i = 0; i < result.snapshotLength; i += 1) nodes.push(result.snapshotItem(i));
  return nodes;
}})()"
        ),
        SelectorKind::Css => {
            if let Some(segments) = parsed.pierce_segments() {
                let segments = js_string_array(&segments);
                format!("(function() {{{QUERY_CHAIN}\n  return queryChain({segments});\n}})()")
            } else if pierce {
                format!(
                    "(function() {{{QUERY_ALL_DEEP}\n  return queryAllDeep(document, {selector});\n}})()"
                )
            } else {
                format!("Array.from(document.querySelectorAll({selector}))")
            }
        }
    }
}

/// Expression yielding the number of matching elements.
pub fn count(parsed: &ParsedSelector, pierce: bool) -> String {
    let selector = js_string(&parsed.value);
    match parsed.kind {
        SelectorKind::PathQuery => format!(
            "(function() {{
  const result = document.evaluate({selector}, document, null, \
XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
  return result.snapshotLength;
}})()"
        ),
        SelectorKind::Css => {
            if let Some(segments) = parsed.pierce_segments() {
                let segments = js_string_array(&segments);
                format!(
                    "(function() {{{QUERY_CHAIN}\n  return queryChain({segments}).length;\n}})()"
                )
            } else if pierce {
                format!(
                    "(function() {{{QUERY_ALL_DEEP}\n  return queryAllDeep(document, {selector}).length;\n}})()"
                )
            } else {
                format!("document.querySelectorAll({selector}).length")
            }
        }
    }
}

// ============================================================================
// Measurement / Action Expressions
// ============================================================================

/// Expression measuring the element's box, scrolling it into view first.
///
/// Yields `{x, y, width, height, visible}` or null; `visible` requires a
/// non-zero box and no hiding via visibility/display/opacity.
pub fn element_box(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(
        parsed,
        pierce,
        r"if (!el) return null;
  el.scrollIntoView({ block: 'center', inline: 'center' });
  const rect = el.getBoundingClientRect();
  const style = window.getComputedStyle(el);
  return {
    x: rect.x, y: rect.y, width: rect.width, height: rect.height,
    visible: rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden'
      && style.display !== 'none' && Number(style.opacity || '1') > 0
  };",
    )
}

/// Expression focusing the element; yields whether it was found.
pub fn focus(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(parsed, pierce, "if (!el) return false;\n  el.focus();\n  return true;")
}

/// Expression setting a form control's value and synthesizing
/// `input` + `change`. Resolves `>>>` chains inline; yields whether a
/// matching input/textarea/select was found and filled.
pub fn fill_input(selector: &str, value: &str) -> String {
    let segments: Vec<&str> = selector
        .split(">>>")
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();
    let segments = js_string_array(&segments);
    let value = js_string(value);
    format!(
        "(function() {{{QUERY_CHAIN}
  const el = queryChain({segments})[0] || null;
  if (!el) return false;
  const tag = el.tagName;
  if (tag !== 'INPUT' && tag !== 'TEXTAREA' && tag !== 'SELECT') return false;
  el.value = {value};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"
    )
}

/// Expression selecting an option by value on a `<select>`; yields
/// whether a select was found and updated.
pub fn select_option(parsed: &ParsedSelector, pierce: bool, value: &str) -> String {
    let value = js_string(value);
    eval_on_element(
        parsed,
        pierce,
        &format!(
            "if (!el || el.tagName !== 'SELECT') return false;
  el.value = {value};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;"
        ),
    )
}

/// Expression attaching an in-memory file to a file input; yields
/// whether an input was found and populated.
pub fn set_file_input(
    parsed: &ParsedSelector,
    pierce: bool,
    name: &str,
    contents: &str,
    mime_type: &str,
) -> String {
    let name = js_string(name);
    let contents = js_string(contents);
    let mime_type = js_string(mime_type);
    eval_on_element(
        parsed,
        pierce,
        &format!(
            "if (!el || el.tagName !== 'INPUT') return false;
  const file = new File([{contents}], {name}, {{ type: {mime_type} }});
  const data = new DataTransfer();
  data.items.add(file);
  el.files = data.files;
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;"
        ),
    )
}

// ============================================================================
// Read Expressions
// ============================================================================

/// Element text content, empty string for empty elements, null if absent.
pub fn text(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(parsed, pierce, "return el ? el.textContent || '' : null;")
}

/// Form value or `value` attribute; null if absent.
pub fn value(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(
        parsed,
        pierce,
        r"if (!el) return null;
  if ('value' in el) return el.value ?? '';
  return el.getAttribute('value');",
    )
}

/// One attribute's value; null if the element or attribute is absent.
pub fn attribute(parsed: &ParsedSelector, pierce: bool, name: &str) -> String {
    let name = js_string(name);
    eval_on_element(
        parsed,
        pierce,
        &format!(
            "if (!el || !(el instanceof Element)) return null;
  return el.getAttribute({name});"
        ),
    )
}

/// The element's class list as an array; null if absent.
pub fn classes(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(
        parsed,
        pierce,
        r"if (!el) return null;
  if (!el.classList) return [];
  return Array.from(el.classList);",
    )
}

/// One computed style property; null if the element is absent.
pub fn css(parsed: &ParsedSelector, pierce: bool, property: &str) -> String {
    let property = js_string(property);
    eval_on_element(
        parsed,
        pierce,
        &format!(
            "if (!el) return null;
  const style = window.getComputedStyle(el);
  return style.getPropertyValue({property}) || '';"
        ),
    )
}

/// Whether the element is not disabled (directly or via aria); null if absent.
pub fn is_enabled(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(
        parsed,
        pierce,
        r"if (!el) return null;
  const disabled = Boolean(el.disabled) || el.hasAttribute('disabled');
  const ariaDisabled = el.getAttribute && el.getAttribute('aria-disabled') === 'true';
  return !(disabled || ariaDisabled);",
    )
}

/// Checked state from aria or the `checked` property; null when neither applies.
pub fn is_checked(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(
        parsed,
        pierce,
        r"if (!el) return null;
  const aria = el.getAttribute && el.getAttribute('aria-checked');
  if (aria === 'true') return true;
  if (aria === 'false') return false;
  if ('checked' in el) return Boolean(el.checked);
  return null;",
    )
}

/// Whether the element accepts edits (not disabled/readonly); null if absent.
pub fn is_editable(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(
        parsed,
        pierce,
        r"if (!el) return null;
  const disabled = Boolean(el.disabled) || el.hasAttribute('disabled');
  const readOnly = Boolean(el.readOnly) || el.hasAttribute('readonly');
  const ariaDisabled = el.getAttribute && el.getAttribute('aria-disabled') === 'true';
  return !(disabled || readOnly || ariaDisabled);",
    )
}

/// Whether the element is the document's active element; null if absent.
pub fn has_focus(parsed: &ParsedSelector, pierce: bool) -> String {
    eval_on_element(
        parsed,
        pierce,
        "if (!el) return null;\n  return document.activeElement === el;",
    )
}

/// Whether the element's box intersects (or, fully, fits inside) the
/// viewport; null if absent.
pub fn is_in_viewport(parsed: &ParsedSelector, pierce: bool, fully: bool) -> String {
    eval_on_element(
        parsed,
        pierce,
        &format!(
            "if (!el) return null;
  const rect = el.getBoundingClientRect();
  const viewWidth = window.innerWidth || document.documentElement.clientWidth;
  const viewHeight = window.innerHeight || document.documentElement.clientHeight;
  if ({fully}) {{
    return rect.top >= 0 && rect.left >= 0 && rect.bottom <= viewHeight && rect.right <= viewWidth;
  }}
  return rect.bottom > 0 && rect.right > 0 && rect.top < viewHeight && rect.left < viewWidth;"
        ),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn css(selector: &str) -> ParsedSelector {
        ParsedSelector::classify(selector)
    }

    #[test]
    fn test_plain_css_uses_query_selector() {
        let script = query_first(&css("#submit"), false);
        assert!(script.contains("document.querySelector(\"#submit\")"));
        assert!(!script.contains("queryDeep"));
    }

    #[test]
    fn test_pierce_uses_deep_helper() {
        let script = query_first(&css(".inner"), true);
        assert!(script.contains("queryDeep(document, \".inner\")"));
        // Shadow subtree is visited before light children at every level.
        let shadow = script.find("node.shadowRoot").expect("shadow branch");
        let children = script.rfind("node.children").expect("children branch");
        assert!(shadow < children);
    }

    #[test]
    fn test_chain_embeds_trimmed_segments() {
        let script = query_first(&css("app-root >>> .panel >>> button"), false);
        assert!(script.contains(r#"queryChain(["app-root",".panel","button"])"#));
    }

    #[test]
    fn test_path_query_uses_document_evaluate() {
        let script = query_first(&ParsedSelector::classify("//div[@id='x']"), false);
        assert!(script.contains("document.evaluate"));
        assert!(script.contains("FIRST_ORDERED_NODE_TYPE"));
    }

    #[test]
    fn test_count_path_query_uses_snapshot() {
        let script = count(&ParsedSelector::classify("//li"), false);
        assert!(script.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
        assert!(script.contains("snapshotLength"));
    }

    #[test]
    fn test_selector_is_json_escaped() {
        let script = text(&css(r#"a[title="it's"]"#), false);
        assert!(script.contains(r#""a[title=\"it's\"]""#));
    }

    #[test]
    fn test_element_box_checks_hiding_styles() {
        let script = element_box(&css("#b"), false);
        for needle in ["scrollIntoView", "visibility", "display", "opacity"] {
            assert!(script.contains(needle), "{needle}");
        }
    }

    #[test]
    fn test_fill_input_resolves_chain_inline() {
        let script = fill_input("form >>> input[name=q]", "hello");
        assert!(script.contains(r#"queryChain(["form","input[name=q]"])"#));
        assert!(script.contains("new Event('input'"));
        assert!(script.contains("new Event('change'"));
        assert!(script.contains(r#""hello""#));
    }

    #[test]
    fn test_fill_input_without_chain_is_single_segment() {
        let script = fill_input("#q", "x");
        assert!(script.contains(r##"queryChain(["#q"])"##));
    }

    #[test]
    fn test_in_viewport_fully_variant() {
        let partial = is_in_viewport(&css("#x"), false, false);
        let fully = is_in_viewport(&css("#x"), false, true);
        assert!(partial.contains("if (false)"));
        assert!(fully.contains("if (true)"));
    }
}
