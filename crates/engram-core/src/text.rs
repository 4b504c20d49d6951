//! Text cleaning, tokenization, and sentence chunking
//!
//! The same cleaning pipeline runs at write time and at query time so that
//! lexical scoring compares like with like: markup stripped, entities
//! decoded, emoji and control characters removed, whitespace collapsed.

use regex::Regex;
use std::sync::OnceLock;

// ============================================================================
// COMPILED PATTERNS
// ============================================================================

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>")
            .expect("script/style pattern compiles")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern compiles"))
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(#x?[0-9a-fA-F]+|[a-zA-Z][a-zA-Z0-9]*);").expect("entity pattern compiles")
    })
}

// ============================================================================
// CLEANING
// ============================================================================

/// Clean raw text for storage or querying
///
/// Strips `<script>`/`<style>` blocks (content included) and all remaining
/// markup tags, decodes HTML entities, removes emoji and pictographic
/// codepoints, removes C0/C1 control characters except `\t`, `\n`, `\r`,
/// collapses whitespace runs to single spaces, and trims. Deterministic and
/// idempotent over already-clean text.
pub fn clean_text(input: &str) -> String {
    let stripped = script_style_re().replace_all(input, " ");
    let stripped = tag_re().replace_all(&stripped, " ");
    let decoded = decode_entities(&stripped);

    let filtered: String = decoded
        .chars()
        .filter(|&c| !is_pictographic(c))
        .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect();

    // Collapse any whitespace run (including tabs and newlines) and trim.
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode HTML entities: the common named set plus numeric references
fn decode_entities(input: &str) -> String {
    entity_re()
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let body = &caps[1];
            match body {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                "nbsp" => " ".to_string(),
                _ => decode_numeric_entity(body).unwrap_or_else(|| caps[0].to_string()),
            }
        })
        .into_owned()
}

fn decode_numeric_entity(body: &str) -> Option<String> {
    let code = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(dec) = body.strip_prefix('#') {
        dec.parse::<u32>().ok()?
    } else {
        return None;
    };
    char::from_u32(code).map(|c| c.to_string())
}

/// Emoji and pictographic codepoints removed by the cleaner
fn is_pictographic(c: char) -> bool {
    matches!(
        c as u32,
        // Mahjong tiles through symbols/pictographs extended-A
        0x1F000..=0x1FAFF
        // Misc symbols and dingbats
        | 0x2600..=0x27BF
        // Misc symbols and arrows (stars, geometric)
        | 0x2B00..=0x2BFF
        // Variation selectors
        | 0xFE00..=0xFE0F
        // Zero-width joiner
        | 0x200D
    )
}

// ============================================================================
// TOKENIZATION
// ============================================================================

/// Split text into lowercase tokens
///
/// Runs of non-letter/non-digit codepoints are treated as separators.
/// Tokens shorter than 2 codepoints are discarded. Order is preserved and
/// duplicates are kept.
pub fn tokenize(input: &str) -> Vec<String> {
    let separated: String = input
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    separated
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .filter(|word| word.chars().count() >= 2)
        .collect()
}

// ============================================================================
// SENTENCE CHUNKING
// ============================================================================

/// Split text into chunks of consecutive sentences, each chunk holding at
/// most `max_words` words
///
/// Sentence boundaries are `.`, `!`, or `?` followed by whitespace or end of
/// input. A single sentence longer than `max_words` is emitted as one
/// oversized chunk. Empty input yields no chunks.
pub fn chunk_by_sentences(input: &str, max_words: usize) -> Vec<String> {
    let sentences = split_sentences(input);
    if sentences.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_words = 0usize;

    for sentence in sentences {
        let words = sentence.split_whitespace().count();
        if current_words > 0 && current_words + words > max_words {
            chunks.push(std::mem::take(&mut current));
            current_words = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
        current_words += words;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn split_sentences(input: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = match chars.peek() {
                None => true,
                Some(next) => next.is_whitespace(),
            };
            if at_boundary {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_script_blocks() {
        let html = "before<script type=\"text/javascript\">alert('x')</script>after";
        assert_eq!(clean_text(html), "before after");
    }

    #[test]
    fn test_clean_strips_style_and_tags() {
        let html = "<style>.a { color: red }</style><p>Hello <b>world</b></p>";
        assert_eq!(clean_text(html), "Hello world");
    }

    #[test]
    fn test_clean_decodes_entities() {
        assert_eq!(clean_text("fish &amp; chips &#64; home"), "fish & chips @ home");
        assert_eq!(clean_text("a &lt; b &#x41;"), "a < b A");
    }

    #[test]
    fn test_clean_strips_emoji_and_controls() {
        assert_eq!(clean_text("deploy \u{1F680} done\u{0007}!"), "deploy done!");
        assert_eq!(clean_text("tab\tand\nnewline survive"), "tab and newline survive");
    }

    #[test]
    fn test_clean_collapses_whitespace() {
        assert_eq!(clean_text("  a \t b\n\n c  "), "a b c");
    }

    #[test]
    fn test_clean_is_idempotent() {
        for input in [
            "<p>Hello &amp; <b>welcome</b></p> \u{1F600}",
            "plain text stays plain",
            "  spaced\tout\ninput  ",
        ] {
            let once = clean_text(input);
            assert_eq!(clean_text(&once), once);
        }
    }

    #[test]
    fn test_tokenize_splits_and_lowercases() {
        assert_eq!(
            tokenize("Hello, World! rust-lang 2024"),
            vec!["hello", "world", "rust", "lang", "2024"]
        );
    }

    #[test]
    fn test_tokenize_discards_short_tokens() {
        assert_eq!(tokenize("a to be or I am"), vec!["to", "be", "or", "am"]);
    }

    #[test]
    fn test_tokenize_preserves_order_and_duplicates() {
        assert_eq!(
            tokenize("go go gadget go"),
            vec!["go", "go", "gadget", "go"]
        );
    }

    #[test]
    fn test_tokenize_unicode() {
        assert_eq!(tokenize("Grüße München"), vec!["grüße", "münchen"]);
    }

    #[test]
    fn test_chunk_by_sentences_groups_under_limit() {
        let text = "One two three. Four five. Six seven eight nine.";
        let chunks = chunk_by_sentences(text, 5);
        assert_eq!(
            chunks,
            vec!["One two three. Four five.", "Six seven eight nine."]
        );
    }

    #[test]
    fn test_chunk_by_sentences_oversized_sentence() {
        let text = "one two three four five six seven.";
        let chunks = chunk_by_sentences(text, 3);
        assert_eq!(chunks, vec!["one two three four five six seven."]);
    }

    #[test]
    fn test_chunk_by_sentences_empty_input() {
        assert!(chunk_by_sentences("", 10).is_empty());
        assert!(chunk_by_sentences("   ", 10).is_empty());
    }

    #[test]
    fn test_chunk_by_sentences_covers_every_word() {
        let text = "Alpha beta gamma. Delta epsilon! Zeta eta theta iota? Kappa.";
        let chunks = chunk_by_sentences(text, 4);
        let joined = chunks.join(" ");
        for word in text.split_whitespace() {
            let bare = word.trim_end_matches(['.', '!', '?']);
            assert!(joined.contains(bare), "word {bare:?} missing from chunks");
        }
    }
}
