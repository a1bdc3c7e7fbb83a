//! Text helpers shared by the expression language and the router tests.

use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

/// Converts a name into the snaked form used as a key, e.g. `Favorite Color`
/// becomes `favorite_color`. Runs of non-alphanumeric characters collapse to
/// a single underscore.
pub fn snakify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_sep = true;
        }
    }
    out
}

fn is_variation_selector(ch: char) -> bool {
    ('\u{FE00}'..='\u{FE0F}').contains(&ch)
}

/// Splits text into words. Tokens keep letters, digits, apostrophes and
/// underscores together; symbol code points (currency, math, emoji, tone
/// modifiers) each form a standalone token; everything else separates.
/// Variation selectors are dropped entirely.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if is_variation_selector(ch) {
            continue;
        }
        if ch.is_alphanumeric() || ch == '\'' || ch == '_' {
            current.push(ch);
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            if ch.general_category_group() == GeneralCategoryGroup::Symbol {
                tokens.push(ch.to_string());
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Splits text into tokens on any of the given delimiter characters,
/// dropping empty tokens.
pub fn tokenize_by_chars(text: &str, delimiters: &str) -> Vec<String> {
    text.split(|ch: char| delimiters.contains(ch))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Returns the number of characters two strings share at their start.
pub fn prefix_overlap(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snakify() {
        let cases = [
            ("Hello World", "hello_world"),
            ("hello_world", "hello_world"),
            ("hello-world", "hello_world"),
            ("hi😀😃😄😁there", "hi_there"),
            ("昨夜のコ", "昨夜のコ"),
            ("this@isn't@email", "this_isn_t_email"),
            ("  leading", "leading"),
        ];
        for (input, expected) in cases {
            assert_eq!(expected, snakify(input), "unexpected result snakifying '{input}'");
        }

        // snaking is idempotent
        assert_eq!(snakify("Favorite Color"), snakify(&snakify("Favorite Color")));
    }

    #[test]
    fn test_tokenize() {
        let cases: &[(&str, &[&str])] = &[
            (" one ", &["one"]),
            ("  a  b  ", &["a", "b"]),
            ("one   two three", &["one", "two", "three"]),
            ("one.two.three", &["one", "two", "three"]),
            ("O'Grady can't foo_bar", &["O'Grady", "can't", "foo_bar"]),
            ("öne.βήταa.thé", &["öne", "βήταa", "thé"]),
            ("واحد اثنين ثلاثة", &["واحد", "اثنين", "ثلاثة"]),
            ("  \t\none(two!*@three ", &["one", "two", "three"]),
            ("spend$£€₠₣₪", &["spend", "$", "£", "€", "₠", "₣", "₪"]),
            ("math+=×÷√∊", &["math", "+", "=", "×", "÷", "√", "∊"]),
            ("emoji😄🏥👪👰😟🧟", &["emoji", "😄", "🏥", "👪", "👰", "😟", "🧟"]),
            ("👍🏿 👨🏼", &["👍", "🏿", "👨", "🏼"]),
            ("ℹ︎ ℹ️", &["ℹ", "ℹ"]),
        ];
        for (input, expected) in cases {
            assert_eq!(expected.to_vec(), tokenize(input), "unexpected result tokenizing '{input}'");
        }
    }

    #[test]
    fn test_tokenize_by_chars() {
        let cases: &[(&str, &str, &[&str])] = &[
            ("one   two three", " ", &["one", "two", "three"]),
            ("Jim O'Grady", " ", &["Jim", "O'Grady"]),
            ("one.βήταa/three", "./", &["one", "βήταa", "three"]),
            ("one😄three", "😄", &["one", "three"]),
            ("  one.two.*@three ", " .*@", &["one", "two", "three"]),
            (" one ", " ", &["one"]),
        ];
        for (input, delims, expected) in cases {
            assert_eq!(expected.to_vec(), tokenize_by_chars(input, delims));
        }
    }

    #[test]
    fn test_prefix_overlap() {
        assert_eq!(0, prefix_overlap("", ""));
        assert_eq!(0, prefix_overlap("abc", ""));
        assert_eq!(0, prefix_overlap("", "abc"));
        assert_eq!(0, prefix_overlap("a", "x"));
        assert_eq!(1, prefix_overlap("x", "x"));
        assert_eq!(2, prefix_overlap("xya", "xyz"));
        assert_eq!(2, prefix_overlap("😄😟👨🏼", "😄😟👰"));
        assert_eq!(4, prefix_overlap("25078", "25073254252"));
    }
}
