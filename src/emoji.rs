//! Emoji-safe text encoding for stored posts.
//!
//! Posts are kept with every emoji replaced by its `:shortcode:` so the
//! corpus stays plain text, and are turned back into emoji on render.
//!
//! Only the exact form an emoji's shortcode decodes to is encoded, so
//! unqualified characters such as `©` or a bare `❤` are stored unchanged.
//! A literal `:` directly before an encoded emoji can pair with the
//! shortcode's opening colon when decoding (`":pizza🦀"` renders as
//! `"🍕crab:"`).

/// Longest emoji sequence (in chars) worth trying, e.g. tagged flags and
/// family ZWJ sequences
const MAX_EMOJI_CHARS: usize = 10;

/// Replace every emoji in `text` with `:shortcode:`
pub fn demojize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        match longest_emoji_prefix(rest) {
            Some((len, shortcode)) => {
                out.push(':');
                out.push_str(shortcode);
                out.push(':');
                rest = &rest[len..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}

/// Replace every known `:shortcode:` in `text` with its emoji
pub fn emojize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(':') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let emoji = after
            .find(':')
            .map(|end| (end, &after[..end]))
            .filter(|(_, code)| is_shortcode(code))
            .and_then(|(end, code)| emojis::get_by_shortcode(code).map(|e| (end, e)));
        match emoji {
            Some((end, emoji)) => {
                out.push_str(emoji.as_str());
                rest = &after[end + 1..];
            }
            None => {
                // The closing colon may open the next shortcode
                out.push(':');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn longest_emoji_prefix(text: &str) -> Option<(usize, &'static str)> {
    let ends = text
        .char_indices()
        .skip(1)
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .take(MAX_EMOJI_CHARS)
        .collect::<Vec<_>>();
    ends.into_iter().rev().find_map(|end| {
        let prefix = &text[..end];
        emojis::get(prefix)
            .filter(|e| e.as_str() == prefix)
            .and_then(|e| e.shortcode())
            .map(|code| (end, code))
    })
}

fn is_shortcode(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demojize_uses_shortcodes() {
        assert_eq!(demojize("hello 🦀"), "hello :crab:");
        assert_eq!(demojize("🍕🍕"), ":pizza::pizza:");
        assert_eq!(demojize("plain text, no emoji"), "plain text, no emoji");
    }

    #[test]
    fn demojize_prefers_the_longest_sequence() {
        assert_eq!(demojize("👩‍💻 at work"), ":woman_technologist: at work");
    }

    #[test]
    fn emojize_leaves_unknown_codes_alone() {
        assert_eq!(emojize(":crab: and :pizza:"), "🦀 and 🍕");
        assert_eq!(emojize("meet at 12:30 :crab:"), "meet at 12:30 🦀");
        assert_eq!(
            emojize(":definitely_not_an_emoji:"),
            ":definitely_not_an_emoji:"
        );
        assert_eq!(emojize("trailing colon:"), "trailing colon:");
    }

    #[test]
    fn unqualified_characters_are_stored_unchanged() {
        assert_eq!(demojize("© 2020 ™"), "© 2020 ™");
        assert_eq!(demojize("❤ and ❤️"), "❤ and :heart:");
    }

    #[test]
    fn colon_before_emoji_pairs_with_its_shortcode() {
        assert_eq!(demojize(":pizza🦀"), ":pizza:crab:");
        assert_eq!(emojize(&demojize(":pizza🦀")), "🍕crab:");
    }

    #[test]
    fn encoding_round_trips() {
        for text in [
            "I love 🦀 and 🍕\nsee you 🚀",
            "a:🦀",
            "no emoji at all",
            "Ünïcödé stays as is…",
            "© 2020",
            "❤ plain heart",
            "Brand™ and ®",
            "❤️ qualified heart",
        ] {
            assert_eq!(emojize(&demojize(text)), text);
        }
    }
}
