//! Selector parsing for the DevTools page driver.
//!
//! Browsers only understand plain CSS, so a trailing `:has-text('…')` is
//! split off here and applied as a text filter inside the page script.

/// A CSS selector with an optional text-content filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSelector {
    pub css: String,
    pub has_text: Option<String>,
}

const HAS_TEXT: &str = ":has-text(";

impl TextSelector {
    pub fn parse(selector: &str) -> Self {
        let trimmed = selector.trim();
        if let Some(start) = trimmed.rfind(HAS_TEXT) {
            let inner = &trimmed[start + HAS_TEXT.len()..];
            if let Some(arg) = inner.strip_suffix(')') {
                if let Some(text) = unquote(arg.trim()) {
                    return Self {
                        css: trimmed[..start].to_string(),
                        has_text: Some(text.to_string()),
                    };
                }
            }
        }

        Self {
            css: trimmed.to_string(),
            has_text: None,
        }
    }

    /// A JavaScript expression evaluating to an array of matching elements
    /// under `root` (itself a JavaScript expression).
    pub fn to_js(&self, root: &str) -> String {
        let css = js_string(&self.css);
        match &self.has_text {
            Some(text) => format!(
                "Array.from({root}.querySelectorAll({css})).filter(e => (e.textContent || '').includes({}))",
                js_string(text)
            ),
            None => format!("Array.from({root}.querySelectorAll({css}))"),
        }
    }
}

fn unquote(arg: &str) -> Option<&str> {
    let bytes = arg.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    if first == last && (first == b'\'' || first == b'"') {
        Some(&arg[1..arg.len() - 1])
    } else {
        None
    }
}

/// Quote a Rust string as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
