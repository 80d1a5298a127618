// SPDX-License-Identifier: MIT

//! Word tokenizer for the line protocol (§4.5).
//!
//! Scoped adaptation of a shell-style quote/escape state machine: words
//! are whitespace separated, `'single'` and `"double"` quoting suppress
//! further splitting, and a backslash escapes the following character.
//! Unlike a real shell lexer there is no redirection, substitution, or
//! heredoc support — the protocol has no use for them.

/// A lexed word together with the byte offset its first character started at,
/// so syntax errors can report a precise column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

struct QuoteState {
    in_single: bool,
    in_double: bool,
    escaped: bool,
}

impl QuoteState {
    fn new() -> Self {
        Self { in_single: false, in_double: false, escaped: false }
    }

    /// Process a character, updating quote state. Returns true if the
    /// character is literal content (inside quotes, or escaped) rather
    /// than a word boundary or quote delimiter.
    fn process(&mut self, ch: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return true;
        }
        match ch {
            '\\' if !self.in_single => {
                self.escaped = true;
                false
            }
            '\'' if !self.in_double => {
                self.in_single = !self.in_single;
                false
            }
            '"' if !self.in_single => {
                self.in_double = !self.in_double;
                false
            }
            _ => self.in_single || self.in_double,
        }
    }

    fn unterminated(&self) -> bool {
        self.in_single || self.in_double || self.escaped
    }
}

/// Split a line into whitespace-separated words, honoring quoting and
/// backslash escapes. Never panics; returns [`LexError`] on unterminated
/// quotes or a trailing escape.
pub fn lex(line: &str) -> Result<Vec<Word>, LexError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut current_start: Option<usize> = None;
    let mut state = QuoteState::new();

    for (i, ch) in line.char_indices() {
        let literal = state.process(ch);
        if literal {
            if current_start.is_none() {
                current_start = Some(i);
            }
            current.push(ch);
            continue;
        }
        match ch {
            '\'' | '"' => {
                if current_start.is_none() {
                    current_start = Some(i);
                }
            }
            '\\' => {}
            c if c.is_whitespace() => {
                if let Some(start) = current_start.take() {
                    words.push(Word { text: std::mem::take(&mut current), offset: start });
                }
            }
            other => {
                if current_start.is_none() {
                    current_start = Some(i);
                }
                current.push(other);
            }
        }
    }

    if state.unterminated() {
        return Err(LexError {
            offset: current_start.unwrap_or(line.len()),
            message: "unterminated quote or trailing escape".to_string(),
        });
    }

    if let Some(start) = current_start {
        words.push(Word { text: current, offset: start });
    }

    Ok(words)
}

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod tests;
