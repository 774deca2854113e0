//! Lyric language classification.
//!
//! Picks the language bucket of the generic genre's prompts. The rule only
//! separates Chinese lyrics from everything else, which is the split the
//! prompt bundle is built with.

use serde::{Deserialize, Serialize};

/// Share of CJK ideographs at or above which lyrics count as Chinese.
const ZH_RATIO_THRESHOLD: f32 = 0.2;

/// Language tags used as keys of the generic genre's prompt buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
}

impl Language {
    /// Returns the bundle key for this language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifies `text` as Chinese or English.
///
/// Structure tags like `[verse]` are skipped; whitespace and ASCII
/// punctuation do not count towards the ratio. Text with no countable
/// characters is English.
pub fn detect_language(text: &str) -> Language {
    let mut total = 0usize;
    let mut cjk = 0usize;

    for c in strip_tags(text).chars() {
        if c.is_whitespace() || c.is_ascii_punctuation() {
            continue;
        }
        total += 1;
        if is_cjk_ideograph(c) {
            cjk += 1;
        }
    }

    if total > 0 && cjk as f32 / total as f32 >= ZH_RATIO_THRESHOLD {
        Language::Zh
    } else {
        Language::En
    }
}

/// Drops `[...]` structure tags.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_cjk_ideograph(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF      // unified ideographs
        | 0x3400..=0x4DBF    // extension A
        | 0x20000..=0x2A6DF  // extension B
        | 0xF900..=0xFAFF    // compatibility ideographs
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_lyrics() {
        assert_eq!(
            detect_language("[verse]\nWalking down the empty street tonight"),
            Language::En
        );
    }

    #[test]
    fn chinese_lyrics() {
        assert_eq!(detect_language("[verse]\n月光洒在窗前 我想起你的脸"), Language::Zh);
    }

    #[test]
    fn mixed_lyrics_use_ratio() {
        // 2 ideographs out of 10 countable characters.
        assert_eq!(detect_language("你好 abcdefgh"), Language::Zh);
        // 1 out of 10.
        assert_eq!(detect_language("你 abcdefghi"), Language::En);
    }

    #[test]
    fn tags_and_blank_text_are_ignored() {
        assert_eq!(detect_language(""), Language::En);
        assert_eq!(detect_language("   \n\t"), Language::En);
        assert_eq!(detect_language("[intro-short] [chorus]\n爱"), Language::Zh);
    }

    #[test]
    fn deterministic() {
        let text = "[chorus]\n我们一起唱 sing along";
        assert_eq!(detect_language(text), detect_language(text));
    }
}
