// WHY: One pass over the buffer gives every heuristic the same view of quoted dialogue
// Pairing is positional because streamed text may stop in the middle of a quote

/// Byte interval of a quoted span, from opening quote to closing quote (or end of text)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteRange {
    pub start: usize,
    pub end: usize,
}

impl QuoteRange {
    /// Strict containment: the quote characters themselves are outside
    pub fn contains(&self, index: usize) -> bool {
        index > self.start && index < self.end
    }
}

fn is_double_quote(ch: char) -> bool {
    matches!(ch, '"' | '\u{201C}' | '\u{201D}')
}

/// Pair double quotes sequentially (1st with 2nd, 3rd with 4th, ...)
/// An unpaired final quote opens a span that runs to the end of the text.
pub fn index_quotes(text: &str) -> Vec<QuoteRange> {
    let mut positions = Vec::new();
    let mut prev: Option<char> = None;

    for (i, ch) in text.char_indices() {
        if is_double_quote(ch) && prev != Some('\\') {
            positions.push(i);
        }
        prev = Some(ch);
    }

    let mut ranges: Vec<QuoteRange> = positions
        .chunks_exact(2)
        .map(|pair| QuoteRange {
            start: pair[0],
            end: pair[1],
        })
        .collect();

    if positions.len() % 2 == 1 {
        if let Some(&last) = positions.last() {
            ranges.push(QuoteRange {
                start: last,
                end: text.len(),
            });
        }
    }

    ranges
}

/// True when the index falls strictly inside any quoted span
pub fn is_inside_quotes(ranges: &[QuoteRange], index: usize) -> bool {
    ranges.iter().any(|r| r.contains(index))
}
