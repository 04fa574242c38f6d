//! Script-range language detection
//!
//! Detection walks an ordered rule list and returns the tag of the first rule
//! that has at least one character in the input. Rules that share code points
//! with an earlier rule can never win: Marathi always resolves to Hindi
//! (both Devanagari) and Arabic always resolves to Urdu (both Arabic script).
//! Transcript text alone carries no evidence to tell them apart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag returned when no rule matches
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// A BCP-47 style language tag such as `hi-IN`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into().trim().replace('_', "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag, lowercased (`hi` for `hi-IN`)
    pub fn base(&self) -> String {
        self.0
            .split('-')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Case-insensitive tag comparison
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(&other.replace('_', "-"))
    }
}

impl Default for LanguageTag {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LanguageTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for LanguageTag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Writing systems the rule table knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Malayalam,
    Devanagari,
    Tamil,
    Bengali,
    Gujarati,
    Kannada,
    Telugu,
    Gurmukhi,
    Arabic,
    Cyrillic,
    Kana,
    Hangul,
    Han,
    Latin,
}

/// One entry of the ordered detection table
#[derive(Debug)]
pub struct ScriptRule {
    pub tag: &'static str,
    pub script: Script,
    ranges: &'static [(char, char)],
}

impl ScriptRule {
    pub fn contains(&self, c: char) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi)
    }
}

const DEVANAGARI: &[(char, char)] = &[('\u{0900}', '\u{097F}')];
const ARABIC: &[(char, char)] = &[('\u{0600}', '\u{06FF}')];
const LATIN: &[(char, char)] = &[
    ('a', 'z'),
    ('A', 'Z'),
    ('\u{00C0}', '\u{00D6}'),
    ('\u{00D8}', '\u{00F6}'),
    ('\u{00F8}', '\u{024F}'),
];

/// Detection rules in priority order
pub static SCRIPT_RULES: &[ScriptRule] = &[
    ScriptRule { tag: "ml-IN", script: Script::Malayalam, ranges: &[('\u{0D00}', '\u{0D7F}')] },
    ScriptRule { tag: "hi-IN", script: Script::Devanagari, ranges: DEVANAGARI },
    ScriptRule { tag: "ta-IN", script: Script::Tamil, ranges: &[('\u{0B80}', '\u{0BFF}')] },
    ScriptRule { tag: "bn-IN", script: Script::Bengali, ranges: &[('\u{0980}', '\u{09FF}')] },
    ScriptRule { tag: "gu-IN", script: Script::Gujarati, ranges: &[('\u{0A80}', '\u{0AFF}')] },
    ScriptRule { tag: "kn-IN", script: Script::Kannada, ranges: &[('\u{0C80}', '\u{0CFF}')] },
    ScriptRule { tag: "te-IN", script: Script::Telugu, ranges: &[('\u{0C00}', '\u{0C7F}')] },
    // Shadowed by hi-IN
    ScriptRule { tag: "mr-IN", script: Script::Devanagari, ranges: DEVANAGARI },
    ScriptRule { tag: "pa-IN", script: Script::Gurmukhi, ranges: &[('\u{0A00}', '\u{0A7F}')] },
    ScriptRule { tag: "ur-PK", script: Script::Arabic, ranges: ARABIC },
    // Shadowed by ur-PK
    ScriptRule { tag: "ar-SA", script: Script::Arabic, ranges: ARABIC },
    ScriptRule { tag: "ru-RU", script: Script::Cyrillic, ranges: &[('\u{0400}', '\u{04FF}')] },
    ScriptRule {
        tag: "ja-JP",
        script: Script::Kana,
        ranges: &[('\u{3040}', '\u{309F}'), ('\u{30A0}', '\u{30FF}')],
    },
    ScriptRule { tag: "ko-KR", script: Script::Hangul, ranges: &[('\u{AC00}', '\u{D7AF}')] },
    ScriptRule { tag: "zh-CN", script: Script::Han, ranges: &[('\u{4E00}', '\u{9FFF}')] },
    ScriptRule { tag: "en-US", script: Script::Latin, ranges: LATIN },
];

/// Languages outside the rule table that are written in Latin script
const LATIN_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "nl", "sv", "da", "no", "nb", "fi", "pl", "cs", "ro",
    "hu", "tr", "id", "ms", "vi", "sw", "tl",
];

/// Guess the language of `text`; never fails
pub fn detect(text: &str) -> LanguageTag {
    SCRIPT_RULES
        .iter()
        .find(|rule| text.chars().any(|c| rule.contains(c)))
        .map(|rule| LanguageTag::new(rule.tag))
        .unwrap_or_default()
}

/// First rule whose ranges contain `c`, if any
pub fn classify(c: char) -> Option<&'static ScriptRule> {
    SCRIPT_RULES.iter().find(|rule| rule.contains(c))
}

/// Whether `language` is normally written in `script`
pub fn writes_with(language: &LanguageTag, script: Script) -> bool {
    let base = language.base();
    match script {
        Script::Latin => LATIN_LANGUAGES.contains(&base.as_str()),
        // Japanese mixes kanji with kana
        Script::Han => base == "zh" || base == "ja",
        _ => SCRIPT_RULES
            .iter()
            .any(|rule| rule.script == script && LanguageTag::new(rule.tag).base() == base),
    }
}
