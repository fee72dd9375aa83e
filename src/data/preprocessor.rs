// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises request text before it reaches the tokenizer:
//   - tabs, NBSP, zero-width spaces, BOM and control chars → ' '
//   - runs of whitespace collapse to a single space
//   - leading/trailing whitespace is dropped
//
// Sentence classification inputs are single sequences, so line
// structure is not preserved.

/// Stateless text cleaner used by the text input connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn clean(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pending_space = false;

        for c in text.chars().map(normalise_char) {
            if c == ' ' {
                pending_space = !out.is_empty();
                continue;
            }
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }

        out
    }
}

fn normalise_char(c: char) -> char {
    match c {
        '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
        c if c.is_whitespace() || c.is_control() => ' ',
        c => c,
    }
}
