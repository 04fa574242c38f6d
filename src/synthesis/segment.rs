//! Splitting replies into same-script runs for per-language playback

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::language::{self, LanguageTag};

/// A contiguous run of reply text spoken with one voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub language: LanguageTag,
}

impl TranscriptSegment {
    /// Whether the segment has anything worth sending to a speech engine
    pub fn is_speakable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Whether `c` is an emoji on its own or in emoji presentation.
///
/// ASCII never counts: digits, `#` and `*` only become emoji as keycaps.
fn is_emoji_char(c: char) -> bool {
    if c.is_ascii() {
        return false;
    }
    let mut buf = [0u8; 4];
    let single = c.encode_utf8(&mut buf);
    emojis::get(single).is_some()
        || emojis::get(&format!("{}\u{FE0F}", single)).is_some()
        || matches!(
            c as u32,
            0x1F000..=0x1FAFF // pictographs, regional indicators, skin tones
                | 0xE0020..=0xE007F // tag characters
        )
}

/// Whether a grapheme cluster is an emoji (including flags, keycaps, ZWJ
/// sequences and text symbols forced to emoji presentation)
fn is_emoji_cluster(grapheme: &str) -> bool {
    if emojis::get(grapheme).is_some() {
        return true;
    }
    let mut chars = grapheme.chars();
    match chars.next() {
        Some(base) if is_emoji_char(base) => true,
        Some(base) if !base.is_ascii() => chars.any(|c| c == '\u{FE0F}'),
        _ => false,
    }
}

/// Remove emoji, leaving every other character untouched.
///
/// Works on grapheme clusters, so a zero-width joiner is only dropped as part
/// of an emoji sequence; Indic scripts use it between letters and keep it.
pub fn strip_emoji(text: &str) -> String {
    text.graphemes(true)
        .filter(|grapheme| !is_emoji_cluster(grapheme))
        .flat_map(|grapheme| grapheme.chars())
        .filter(|&c| c != '\u{FE0F}')
        .collect()
}

/// Language a character votes for, or `None` for neutral characters
/// (whitespace, digits, punctuation, unknown scripts)
fn char_language(c: char, preferred: Option<&LanguageTag>) -> Option<LanguageTag> {
    let rule = language::classify(c)?;
    match preferred {
        Some(tag) if language::writes_with(tag, rule.script) => Some(tag.clone()),
        _ => Some(LanguageTag::new(rule.tag)),
    }
}

/// Partition `text` into maximal runs of one language.
///
/// Neutral characters join whatever run is open, so whitespace and punctuation
/// never start a segment of their own. A script resolves to `preferred` when
/// that language is written in it, otherwise to the script's default tag. A
/// text with no classifiable characters becomes one segment in `preferred`
/// (or `en-US`). Concatenating the segments yields `text` unchanged.
pub fn partition(text: &str, preferred: Option<&LanguageTag>) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_lang: Option<LanguageTag> = None;

    for c in text.chars() {
        if let Some(lang) = char_language(c, preferred) {
            match current_lang.replace(lang) {
                Some(open) if current_lang.as_ref() != Some(&open) => {
                    segments.push(TranscriptSegment {
                        text: std::mem::take(&mut current),
                        language: open,
                    });
                }
                _ => {}
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        let language = current_lang
            .or_else(|| preferred.cloned())
            .unwrap_or_default();
        segments.push(TranscriptSegment {
            text: current,
            language,
        });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(segments: &[TranscriptSegment]) -> String {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_strip_emoji_keeps_text() {
        assert_eq!(strip_emoji("Great job! 🎉👍"), "Great job! ");
        assert_eq!(strip_emoji("नमस्ते 🙏 friend"), "नमस्ते  friend");
        assert_eq!(strip_emoji("Score: 10/10"), "Score: 10/10");
    }

    #[test]
    fn test_strip_emoji_sequences() {
        // family emoji joined with ZWJ, heart with VS16
        assert_eq!(strip_emoji("a👨\u{200D}👩\u{200D}👧b"), "ab");
        assert_eq!(strip_emoji("love ❤\u{FE0F}"), "love ");
        assert_eq!(strip_emoji("🇮🇳 India"), " India");
    }

    #[test]
    fn test_strip_emoji_symbols_and_presentation() {
        assert_eq!(
            strip_emoji("Done \u{2B1B}\u{25FE}\u{21A9}\u{FE0F}\u{203C}\u{FE0F} ok"),
            "Done  ok"
        );
        assert_eq!(strip_emoji("\u{3030}\u{303D}\u{3297}\u{3299}"), "");
        assert_eq!(strip_emoji("go \u{2934}\u{FE0F}\u{2935}\u{FE0F} \u{2B05}\u{FE0F}\u{2B07}\u{FE0F}"), "go  ");
        assert_eq!(strip_emoji("\u{25FB}\u{FE0F}\u{25FC}\u{FE0F}x"), "x");
        assert_eq!(strip_emoji("thumbs 👍🏽 up"), "thumbs  up");
    }

    #[test]
    fn test_strip_emoji_keeps_keycap_bases() {
        assert_eq!(strip_emoji("Call 1\u{FE0F}\u{20E3} or #2 *now*"), "Call  or #2 *now*");
    }

    #[test]
    fn test_strip_emoji_keeps_indic_joiner() {
        let malayalam = "ന്\u{200D}";
        assert_eq!(strip_emoji(malayalam), malayalam);
    }

    #[test]
    fn test_partition_single_language() {
        let segments = partition("Hello, how are you?", None);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].language.as_str(), "en-US");
    }

    #[test]
    fn test_partition_neutral_only_uses_preferred() {
        let preferred = LanguageTag::new("ta-IN");
        let segments = partition("123 ... 456", Some(&preferred));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].language, preferred);

        let segments = partition("42", None);
        assert_eq!(segments[0].language.as_str(), "en-US");
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition("", None).is_empty());
    }

    #[test]
    fn test_partition_is_lossless() {
        let text = "  Hi! नमस्ते, आप कैसे हैं? I am fine. നന്ദി 123 Привет";
        let segments = partition(text, None);
        assert_eq!(joined(&segments), text);
        assert!(segments.iter().all(|s| !s.text.is_empty()));
    }

    #[test]
    fn test_partition_adjacent_segments_differ() {
        let segments = partition("one दो three നാല് five", None);
        let langs: Vec<&str> = segments.iter().map(|s| s.language.as_str()).collect();
        assert_eq!(langs, vec!["en-US", "hi-IN", "en-US", "ml-IN", "en-US"]);
        for pair in segments.windows(2) {
            assert_ne!(pair[0].language, pair[1].language);
        }
    }

    #[test]
    fn test_partition_prefers_caller_language_for_its_script() {
        let marathi = LanguageTag::new("mr-IN");
        let segments = partition("नमस्कार friend", Some(&marathi));
        assert_eq!(segments[0].language.as_str(), "mr-IN");
        assert_eq!(segments[1].language.as_str(), "en-US");

        let spanish = LanguageTag::new("es-ES");
        let segments = partition("¿Cómo estás?", Some(&spanish));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].language, spanish);
    }
}
