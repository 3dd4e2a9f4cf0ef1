//! JavaScript run inside the page.
//!
//! Every element operation re-runs the query, so the scripts are assembled
//! from a shared helper prelude plus a small body operating on `el`. A body
//! returns `null` when the element is gone and `{ __error: "..." }` when the
//! element exists but the operation makes no sense for it.

use crate::error::Result;
use crate::shell::SelectorSpec;

const HELPERS: &str = r#"
function __cbQuery(kind, expr, limit) {
    const out = [];
    if (kind === 'xpath') {
        const snap = document.evaluate(expr, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        for (let i = 0; i < snap.snapshotLength && out.length < limit; i++) {
            const node = snap.snapshotItem(i);
            if (node && node.nodeType === Node.ELEMENT_NODE) out.push(node);
        }
    } else {
        const all = document.querySelectorAll(expr);
        for (let i = 0; i < all.length && out.length < limit; i++) out.push(all[i]);
    }
    return out;
}
function __cbVisible(el) {
    const style = getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}
function __cbClip(s, n) {
    return s.length > n ? s.slice(0, n - 3) + '...' : s;
}
function __cbDescribe(el) {
    let head = el.tagName.toLowerCase();
    if (el.id) head += '#' + el.id;
    const classes = (typeof el.className === 'string' ? el.className : '')
        .trim().split(/\s+/).filter(Boolean).slice(0, 2);
    if (classes.length) head += '.' + classes.join('.');
    const parts = ['<' + head + '>'];
    const text = (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim();
    if (text) parts.push(JSON.stringify(__cbClip(text, 60)));
    for (const attr of ['name', 'type', 'href', 'value', 'placeholder', 'aria-label']) {
        const v = el.getAttribute(attr);
        if (v) parts.push(attr + '=' + __cbClip(v, 40));
    }
    if (!__cbVisible(el)) parts.push('(hidden)');
    return parts.join(' ');
}
"#;

fn prelude(selector: &SelectorSpec) -> Result<(String, String)> {
    Ok((
        serde_json::to_string(&selector.kind)?,
        serde_json::to_string(&selector.expression)?,
    ))
}

/// Array of `{index, tag, description}` for the first `limit` matches.
pub fn query(selector: &SelectorSpec, limit: usize) -> Result<String> {
    let (kind, expr) = prelude(selector)?;
    Ok([
        "(function() {",
        HELPERS,
        &format!("return __cbQuery({kind}, {expr}, {limit}).map((el, i) => ("),
        "    { index: i, tag: el.tagName.toLowerCase(), description: __cbDescribe(el) }));",
        "})()",
    ]
    .join("\n"))
}

/// `{attached, visible}` for the match at `index`.
pub fn presence(selector: &SelectorSpec, index: usize) -> Result<String> {
    let (kind, expr) = prelude(selector)?;
    Ok([
        "(function() {",
        HELPERS,
        &format!(
            "const el = __cbQuery({kind}, {expr}, {}).at({index});",
            index.saturating_add(1)
        ),
        "return { attached: !!el, visible: !!el && __cbVisible(el) };",
        "})()",
    ]
    .join("\n"))
}

/// Run `body` against the match at `index`, bound to `el`.
pub fn on_element(selector: &SelectorSpec, index: usize, body: &str) -> Result<String> {
    let (kind, expr) = prelude(selector)?;
    Ok([
        "(function() {",
        HELPERS,
        &format!(
            "const el = __cbQuery({kind}, {expr}, {}).at({index});",
            index.saturating_add(1)
        ),
        "if (!el) return null;",
        body,
        "})()",
    ]
    .join("\n"))
}

/// Scroll into view and report the center in top-level viewport coordinates.
/// `direct` is set when an ancestor frame cannot be inspected.
pub const CLICK_POINT: &str = r#"
el.scrollIntoView({ behavior: 'instant', block: 'center', inline: 'center' });
const rect = el.getBoundingClientRect();
let x = rect.left + rect.width / 2;
let y = rect.top + rect.height / 2;
try {
    let win = window;
    while (win.frameElement) {
        const host = win.frameElement;
        const hostRect = host.getBoundingClientRect();
        x += hostRect.left + host.clientLeft;
        y += hostRect.top + host.clientTop;
        win = win.parent;
    }
} catch (e) {
    return { x, y, direct: true };
}
return { x, y, direct: false };
"#;

pub const DIRECT_CLICK: &str = "el.click();\nreturn true;";

pub const FOCUS: &str = "el.focus();\nreturn true;";

pub const CLEAR_AND_FOCUS: &str = r#"
el.focus();
if ('value' in el) {
    el.value = '';
    el.dispatchEvent(new Event('input', { bubbles: true }));
} else if (el.isContentEditable) {
    el.textContent = '';
}
return true;
"#;

pub const MARK_CLICKED: &str = r#"
el.setAttribute('data-console-clicked', 'true');
el.style.outline = '2px dashed red';
return true;
"#;

/// Set the value through the prototype setter so framework-controlled
/// inputs see the change, then fire input and change.
pub fn set_value(text: &str) -> Result<String> {
    let text_json = serde_json::to_string(text)?;
    Ok([
        "el.focus();",
        "if ('value' in el) {",
        "    const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');",
        &format!("    if (desc && desc.set) desc.set.call(el, {text_json}); else el.value = {text_json};"),
        "} else if (el.isContentEditable) {",
        &format!("    el.textContent = {text_json};"),
        "} else {",
        "    return { __error: '<' + el.tagName.toLowerCase() + '> is not editable' };",
        "}",
        "el.dispatchEvent(new Event('input', { bubbles: true }));",
        "el.dispatchEvent(new Event('change', { bubbles: true }));",
        "return true;",
    ]
    .join("\n"))
}

/// Select by option value, falling back to the visible label.
pub fn select_option(value: &str) -> Result<String> {
    let value_json = serde_json::to_string(value)?;
    Ok([
        "if (el.tagName !== 'SELECT') {",
        "    return { __error: '<' + el.tagName.toLowerCase() + '> is not a <select>' };",
        "}",
        &format!("const wanted = {value_json};"),
        "const options = Array.from(el.options);",
        "const opt = options.find(o => o.value === wanted)",
        "    || options.find(o => o.label.trim() === wanted.trim())",
        "    || options.find(o => o.text.trim() === wanted.trim());",
        "if (!opt) return { __error: 'no option matches ' + JSON.stringify(wanted) };",
        "el.value = opt.value;",
        "opt.selected = true;",
        "el.dispatchEvent(new Event('input', { bubbles: true }));",
        "el.dispatchEvent(new Event('change', { bubbles: true }));",
        "return opt.value;",
    ]
    .join("\n"))
}

pub const READY_STATE: &str = "document.readyState";

pub const LOCATION: &str = "location.href";

pub const TITLE: &str = "document.title";

pub const OUTER_HTML: &str =
    "document.documentElement ? document.documentElement.outerHTML : ''";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_text_is_json_escaped() {
        let sel = SelectorSpec::parse(r#"input[name="q"]"#);
        let js = query(&sel, 5).unwrap();
        assert!(js.contains(r#"__cbQuery("css", "input[name=\"q\"]", 5)"#));
    }

    #[test]
    fn xpath_selectors_use_xpath_kind() {
        let sel = SelectorSpec::parse("//a[contains(., 'Next')]").with_nth(2);
        let js = on_element(&sel, 2, MARK_CLICKED).unwrap();
        assert!(js.contains(r#"__cbQuery("xpath", "//a[contains(., 'Next')]", 3).at(2)"#));
        assert!(js.contains("if (!el) return null;"));
        assert!(js.contains("data-console-clicked"));
    }

    #[test]
    fn largest_index_does_not_overflow_the_limit() {
        let sel = SelectorSpec::parse("a");
        let js = presence(&sel, usize::MAX).unwrap();
        assert!(js.contains(&format!(".at({})", usize::MAX)));
        assert!(on_element(&sel, usize::MAX, FOCUS).is_ok());
    }

    #[test]
    fn values_cannot_break_out_of_the_script() {
        let js = set_value("'); alert(1); ('").unwrap();
        assert!(js.contains(r#""'); alert(1); ('""#));
        let js = select_option("a\"b").unwrap();
        assert!(js.contains(r#"const wanted = "a\"b";"#));
    }
}
