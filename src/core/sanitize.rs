//! HTML sanitizer for step content.
//!
//! Removes script-bearing elements, inline event handler attributes and
//! script-scheme URLs. All other markup passes through byte-for-byte; an
//! element with an offending attribute keeps its remaining attributes.
//! Element removal repeats until nothing changes, so a blocked tag split by
//! another blocked tag cannot reassemble.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Elements dropped together with their content.
const BLOCKED_ELEMENTS: [&str; 4] = ["script", "iframe", "object", "embed"];

/// Attributes whose value is a URL.
const URL_ATTRIBUTES: [&str; 8] = [
    "href",
    "src",
    "xlink:href",
    "action",
    "formaction",
    "poster",
    "background",
    "data",
];

/// Attributes dropped whatever their value.
const DROPPED_ATTRIBUTES: [&str; 1] = ["srcdoc"];

/// URL schemes that execute code.
const SCRIPT_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:text/html"];

static BLOCKED_PATTERNS: Lazy<Vec<(Regex, Regex)>> = Lazy::new(|| {
    BLOCKED_ELEMENTS
        .iter()
        .filter_map(|tag| {
            let paired = Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).ok()?;
            let lone = Regex::new(&format!(r"(?i)</?{tag}\b[^>]*>")).ok()?;
            Some((paired, lone))
        })
        .collect()
});

static OPEN_TAG: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"<[A-Za-z][A-Za-z0-9:-]*(?:"[^"]*"|'[^']*'|[^'">])*>"#).ok()
});

static TAG_PARTS: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^<([A-Za-z][A-Za-z0-9:-]*)(.*?)(\s*/?)>$").ok());

static ATTRIBUTE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"(\s*)([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#).ok()
});

static CHAR_REFERENCE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"&(?:#[xX]([0-9A-Fa-f]+)|#([0-9]+)|([A-Za-z][A-Za-z0-9]*));?").ok()
});

/// Return `html` with unsafe markup removed.
pub fn sanitize(html: &str) -> String {
    let mut out = html.to_string();
    loop {
        let stripped = strip_blocked(&out);
        if stripped == out {
            break;
        }
        out = stripped;
    }

    let Some(open_tag) = OPEN_TAG.as_ref() else {
        return out;
    };
    open_tag
        .replace_all(&out, |caps: &Captures| clean_tag(&caps[0]))
        .into_owned()
}

fn strip_blocked(html: &str) -> String {
    let mut out = html.to_string();
    for (paired, lone) in BLOCKED_PATTERNS.iter() {
        out = paired.replace_all(&out, "").into_owned();
        out = lone.replace_all(&out, "").into_owned();
    }
    out
}

/// Escape text for use inside element content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn clean_tag(tag: &str) -> String {
    let (Some(parts), Some(attribute)) = (TAG_PARTS.as_ref(), ATTRIBUTE.as_ref()) else {
        return tag.to_string();
    };
    let Some(caps) = parts.captures(tag) else {
        return tag.to_string();
    };

    let mut out = format!("<{}", &caps[1]);
    for attr in attribute.captures_iter(&caps[2]) {
        let name = attr[2].to_ascii_lowercase();
        if name.starts_with("on") || DROPPED_ATTRIBUTES.contains(&name.as_str()) {
            continue;
        }
        let value = attr
            .get(3)
            .or_else(|| attr.get(4))
            .or_else(|| attr.get(5))
            .map(|m| m.as_str())
            .unwrap_or_default();
        if URL_ATTRIBUTES.contains(&name.as_str()) && is_script_url(value) {
            continue;
        }
        // A dropped neighbour may have held the only separating whitespace.
        if attr[1].is_empty() {
            out.push(' ');
        }
        out.push_str(&attr[0]);
    }
    out.push_str(&caps[3]);
    out.push('>');
    out
}

fn is_script_url(value: &str) -> bool {
    let normalized: String = decode_references(value)
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    SCRIPT_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
}

/// Decode numeric and common named character references in an attribute
/// value. Unknown names are left as written.
fn decode_references(value: &str) -> String {
    let Some(reference) = CHAR_REFERENCE.as_ref() else {
        return value.to_string();
    };
    reference
        .replace_all(value, |caps: &Captures| {
            if let Some(name) = caps.get(3) {
                return named_reference(name.as_str())
                    .map_or_else(|| caps[0].to_string(), String::from);
            }
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
                (None, None) => None,
            };
            code.and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER)
                .to_string()
        })
        .into_owned()
}

fn named_reference(name: &str) -> Option<char> {
    let ch = match name {
        "amp" | "AMP" => '&',
        "lt" | "LT" => '<',
        "gt" | "GT" => '>',
        "quot" | "QUOT" => '"',
        "apos" => '\'',
        "colon" => ':',
        "sol" => '/',
        "lpar" => '(',
        "rpar" => ')',
        "Tab" => '\t',
        "NewLine" => '\n',
        "nbsp" => '\u{a0}',
        _ => return None,
    };
    Some(ch)
}
