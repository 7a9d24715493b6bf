//! Caption Sanitization
//!
//! Model output arrives with conversational boilerplate, quoting artifacts,
//! and no length discipline. `clean` strips one leading boilerplate phrase
//! and one wrapping quote layer; `limit_length` enforces the language-aware
//! character cap. Counting is by visible character, never by byte, so
//! multi-byte scripts are not cut mid-sequence.

use crate::constants::caption;

/// Conversational prefixes stripped from model output, first match wins.
///
/// Matching is deliberately literal: at most one prefix is removed and no
/// attempt is made to detect prefix-like text that is substantive content.
const BOILERPLATE_PREFIXES: &[&str] = &[
    // Chinese
    "以下是符合無障礙標準的 alt 文字：",
    "以下是符合無障礙標準的alt文字：",
    "以下是alt文字：",
    "這張圖片的alt文字是：",
    "圖片描述：",
    "alt文字：",
    "描述：",
    "根據上下文，",
    "基於文章內容，",
    // English
    "here is the alt text:",
    "the alt text is:",
    "alt text:",
    "image description:",
    "description:",
    "caption:",
    "this image shows:",
    "the image shows:",
    "based on the context:",
    "given the context:",
    // Japanese
    "この画像のalt文字は：",
    "画像の説明：",
    // Korean
    "alt 텍스트:",
    "이미지 설명:",
];

/// Quote pairs unwrapped when they enclose the entire string
const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('「', '」'), ('『', '』')];

/// Strip boilerplate, unwrap one quote layer, and collapse whitespace runs.
pub fn clean(text: &str) -> String {
    let mut text = text.trim();

    // At most one prefix match, checked case-insensitively
    for prefix in BOILERPLATE_PREFIXES {
        if let Some(rest) = strip_prefix_ci(text, prefix) {
            text = rest.trim_start();
            break;
        }
    }

    // Single layer of symmetric wrapping quotes
    let mut chars = text.chars();
    if let (Some(first), Some(last)) = (chars.next(), chars.next_back())
        && QUOTE_PAIRS.iter().any(|&(o, c)| first == o && last == c)
    {
        text = text[first.len_utf8()..text.len() - last.len_utf8()].trim();
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive prefix strip that walks char-by-char so the returned
/// slice always starts on a character boundary of the original text.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut end = 0;
    let mut text_chars = text.char_indices();
    for p in prefix.chars() {
        let (i, t) = text_chars.next()?;
        if !t.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
        end = i + t.len_utf8();
    }
    Some(&text[end..])
}

/// Languages whose scripts pack more meaning per character get the lower cap.
pub fn is_dense_script(language: &str) -> bool {
    let lang = language.to_ascii_lowercase();
    ["zh", "ja", "ko"]
        .iter()
        .any(|code| lang == *code || lang.starts_with(&format!("{code}-")))
}

/// Visible-character cap for a language code
pub fn length_cap(language: &str) -> usize {
    if is_dense_script(language) {
        caption::DENSE_SCRIPT_CAP
    } else {
        caption::ALPHABETIC_CAP
    }
}

/// Truncate to the language cap, appending an ellipsis marker. The result
/// never exceeds the cap, marker included.
pub fn limit_length(text: &str, language: &str) -> String {
    let text = text.trim();
    let cap = length_cap(language);

    if text.chars().count() <= cap {
        return text.to_string();
    }

    let keep = cap - caption::ELLIPSIS.chars().count();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(caption::ELLIPSIS);
    truncated
}

// =============================================================================
// Tests
// =============================================================================
