//! Line tokenizer.
//!
//! Two views of a statement are needed:
//!
//! - **Words**: positional tokens (device name, nodes, model) split on
//!   whitespace and commas, each with its byte range so the untouched tail of
//!   the line can be kept verbatim.
//! - **Tokens**: a lossless token stream for expression text. Concatenating the
//!   `text` of every token reproduces the input exactly, which is what lets the
//!   `v(...)`, `i(...)`, `@dev[...]` and `poly(N)` rewriters edit a line without
//!   disturbing anything else on it.

// ============================================================================
// TOKENS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Letter or `_` followed by letters, digits and `_ . # $ : !`.
    Ident,
    /// Numeric literal with optional exponent and engineering suffix.
    Number,
    /// Double-quoted string, quotes included.
    Str,
    Space,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    Comma,
    Equals,
    At,
    /// Any other single character.
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Identifier or number: anything that can name a node.
    pub fn is_name(&self) -> bool {
        matches!(self.kind, TokenKind::Ident | TokenKind::Number)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '#' | '$' | ':' | '!')
}

/// Splits `text` into a lossless token stream.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let bytes: Vec<(usize, char)> = text.char_indices().collect();
    let mut i = 0;
    while i < bytes.len() {
        let (start, c) = bytes[i];
        let mut j = i + 1;
        let kind = if c.is_whitespace() {
            while j < bytes.len() && bytes[j].1.is_whitespace() {
                j += 1;
            }
            TokenKind::Space
        } else if is_ident_start(c) {
            while j < bytes.len() && is_ident_char(bytes[j].1) {
                j += 1;
            }
            TokenKind::Ident
        } else if c.is_ascii_digit()
            || (c == '.' && bytes.get(i + 1).map_or(false, |(_, n)| n.is_ascii_digit()))
        {
            j = scan_number(&bytes, i);
            TokenKind::Number
        } else if c == '"' {
            while j < bytes.len() && bytes[j].1 != '"' {
                j += 1;
            }
            if j < bytes.len() {
                j += 1;
            }
            TokenKind::Str
        } else {
            match c {
                '(' => TokenKind::ParenOpen,
                ')' => TokenKind::ParenClose,
                '[' => TokenKind::BracketOpen,
                ']' => TokenKind::BracketClose,
                ',' => TokenKind::Comma,
                '=' => TokenKind::Equals,
                '@' => TokenKind::At,
                _ => TokenKind::Punct,
            }
        };
        let end = bytes.get(j).map_or(text.len(), |(pos, _)| *pos);
        tokens.push(Token {
            kind,
            text: &text[start..end],
            start,
        });
        i = j;
    }
    tokens
}

// Digits, fraction, exponent, then a run of suffix letters (`1.5meg`, `10uF`).
fn scan_number(chars: &[(usize, char)], start: usize) -> usize {
    let mut j = start;
    let at = |k: usize| chars.get(k).map(|(_, c)| *c);
    while at(j).map_or(false, |c| c.is_ascii_digit() || c == '.') {
        j += 1;
    }
    if matches!(at(j), Some('e') | Some('E')) {
        let mut k = j + 1;
        if matches!(at(k), Some('+') | Some('-')) {
            k += 1;
        }
        if at(k).map_or(false, |c| c.is_ascii_digit()) {
            j = k;
            while at(j).map_or(false, |c| c.is_ascii_digit()) {
                j += 1;
            }
        }
    }
    while at(j).map_or(false, |c| c.is_ascii_alphabetic() || c == '_') {
        j += 1;
    }
    j
}

/// Reassembles tokens into text.
pub fn render(tokens: &[Token<'_>]) -> String {
    tokens.iter().map(|t| t.text).collect()
}

// ============================================================================
// WORDS
// ============================================================================

/// A positional word and its byte range in the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Splits a statement on whitespace and commas.
pub fn split_words(text: &str) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    for (pos, c) in text.char_indices() {
        let sep = c.is_whitespace() || c == ',';
        match (sep, start) {
            (true, Some(s)) => {
                words.push(Word {
                    text: &text[s..pos],
                    start: s,
                    end: pos,
                });
                start = None;
            }
            (false, None) => start = Some(pos),
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push(Word {
            text: &text[s..],
            start: s,
            end: text.len(),
        });
    }
    words
}

/// Byte offset where the `name=value` tail of a statement begins.
///
/// Finds the first `=` and backs up over any blanks and the parameter name to
/// the preceding whitespace or comma. Returns `text.len()` when there is no
/// assignment.
pub fn assignment_start(text: &str) -> usize {
    let Some(eq) = text.find('=') else {
        return text.len();
    };
    let head = &text[..eq];
    let name_end = head.trim_end_matches(|c: char| c == ' ' || c == '\t').len();
    head[..name_end]
        .char_indices()
        .rev()
        .find(|&(_, c)| c.is_whitespace() || c == ',')
        .map_or(0, |(p, c)| p + c.len_utf8())
}

// ============================================================================
// NUMBERS
// ============================================================================

/// Evaluates a numeric literal with an optional engineering suffix.
///
/// Suffixes are case-insensitive: `t g meg k mil m u n p f`. Trailing letters
/// after the suffix (units such as `10uF`) are ignored.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let split = text
        .char_indices()
        .find(|&(i, c)| {
            c.is_ascii_alphabetic()
                && !((c == 'e' || c == 'E')
                    && text[i + 1..]
                        .trim_start_matches(|s: char| s == '+' || s == '-')
                        .starts_with(|d: char| d.is_ascii_digit()))
        })
        .map_or(text.len(), |(i, _)| i);
    let mantissa: f64 = text[..split].parse().ok()?;
    let suffix = text[split..].to_ascii_lowercase();
    let scale = if suffix.starts_with("meg") {
        1e6
    } else if suffix.starts_with("mil") {
        25.4e-6
    } else {
        match suffix.chars().next() {
            None => 1.0,
            Some('t') => 1e12,
            Some('g') => 1e9,
            Some('k') => 1e3,
            Some('m') => 1e-3,
            Some('u') => 1e-6,
            Some('n') => 1e-9,
            Some('p') => 1e-12,
            Some('f') => 1e-15,
            Some(_) => 1.0,
        }
    };
    Some(mantissa * scale)
}
