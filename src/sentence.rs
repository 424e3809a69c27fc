//! Sentence-level splitting for paragraphs too tall for one page.

/// Split text into trimmed, non-empty sentences.
///
/// A boundary is a terminator (`.`, `!`, `?` or their full-width forms)
/// followed by whitespace, a closing quote/bracket, or end of input.
/// Closing quotes and brackets directly after the terminator stay with the
/// sentence they close; the whitespace that follows is skipped. Text without
/// any boundary comes back as a single sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::with_capacity(8);
    let mut buf = String::with_capacity(text.len().min(256));
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        buf.push(ch);
        if !is_terminator(ch) {
            continue;
        }
        let at_boundary = match chars.peek() {
            None => true,
            Some(&next) => next.is_whitespace() || is_closer(next),
        };
        if !at_boundary {
            continue;
        }
        while let Some(&next) = chars.peek() {
            if !is_closer(next) {
                break;
            }
            buf.push(next);
            chars.next();
        }
        flush(&mut buf, &mut sentences);
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
    }
    flush(&mut buf, &mut sentences);
    sentences
}

fn flush(buf: &mut String, out: &mut Vec<String>) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    buf.clear();
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '\u{3002}' | '\u{FF01}' | '\u{FF1F}' | '\u{FF0E}')
}

fn is_closer(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\''
            | '\u{201D}'
            | '\u{2019}'
            | '\u{00BB}'
            | '\u{300D}'
            | '\u{300F}'
            | ')'
            | ']'
            | '\u{FF09}'
    )
}
