// WHY: standalone normalization so every heuristic sees the same cleaned stream text
// Separates token cleanup from matching so the buffer manager can normalize per token

/// Honorific suffixes dropped from detected names before comparison
const HONORIFIC_SUFFIXES: &[&str] = &["sama", "san", "chan", "kun"];

/// Normalize streamed text: drop zero-width characters and markdown emphasis,
/// fold smart quotes to straight quotes and non-breaking spaces to spaces
pub fn normalize_stream_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    normalize_stream_text_into(text, &mut result);
    result
}

/// Normalize streamed text into supplied buffer to avoid allocation
/// WHY: the buffer manager normalizes every token, reuse keeps that cheap
pub fn normalize_stream_text_into(text: &str, buffer: &mut String) {
    buffer.clear();
    buffer.reserve(text.len());

    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' => {}
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => buffer.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => buffer.push('"'),
            '\u{00A0}' => buffer.push(' '),
            '*' | '_' | '~' => {
                // Paired emphasis markers (**, __, ~~) are removed, single ones kept
                if chars.peek() == Some(&ch) {
                    chars.next();
                } else {
                    buffer.push(ch);
                }
            }
            '`' => {
                // Runs of one to three backticks are removed
                let mut run = 1;
                while run < 3 && chars.peek() == Some(&'`') {
                    chars.next();
                    run += 1;
                }
            }
            _ => buffer.push(ch),
        }
    }
}

/// Normalize a costume or character name for comparisons
/// Trims, drops a leading slash and strips a trailing honorific ("-san", "_chan", ...)
pub fn normalize_costume_name(name: &str) -> String {
    let mut trimmed = name.trim();
    if let Some(rest) = trimmed.strip_prefix('/') {
        trimmed = rest.trim();
    }

    strip_honorific(trimmed).trim().to_string()
}

fn strip_honorific(name: &str) -> &str {
    for suffix in HONORIFIC_SUFFIXES {
        // separator byte plus the ASCII suffix
        let tail_len = suffix.len() + 1;
        if name.len() <= tail_len || !name.is_char_boundary(name.len() - tail_len) {
            continue;
        }
        let (head, tail) = name.split_at(name.len() - tail_len);
        if tail.starts_with(['-', '_']) && tail[1..].eq_ignore_ascii_case(suffix) {
            return head;
        }
    }
    name
}

/// Case-insensitive key used for roster and target comparisons
pub fn comparison_key(name: &str) -> String {
    normalize_costume_name(name).to_lowercase()
}

/// Check whether a token ends a sentence, allowing trailing closing quotes and brackets
pub fn ends_with_terminal_punctuation(token: &str) -> bool {
    let trimmed = token
        .trim_end()
        .trim_end_matches(['"', '\'', ')', ']', '}', '\u{201D}', '\u{2019}', '*', '_']);

    matches!(trimmed.chars().last(), Some('.' | '!' | '?' | '\u{2026}'))
}
