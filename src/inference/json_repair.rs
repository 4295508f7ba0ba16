//! Malformed JSON repair for tool call arguments.
//!
//! Models emit arguments token by token without grammar enforcement, so the
//! text is often *almost* JSON: a literal `"` inside a string value, a raw
//! newline, a stray backslash from a Windows path. `repair_json_string` makes
//! one left-to-right pass with an explicit scanner state and rewrites those
//! spots so a second `serde_json` parse has a chance to succeed.
//!
//! The interesting decision is what to do with a `"` seen inside a string.
//! Keys close on the first quote. For values, the quote only closes the
//! string when the text that follows looks like the continuation of the
//! enclosing container (see [`looks_like_value_terminator`]); otherwise it is
//! escaped and the string stays open. The bias is deliberately toward keeping
//! content rather than truncating it.

// ─── Scanner State ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Object,
    Array,
}

/// One open `{` or `[`.
#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: ContainerKind,
    /// Only meaningful for objects: the next string literal is a key.
    expecting_key: bool,
}

#[derive(Debug, Default)]
struct ParserState {
    in_string: bool,
    escaping: bool,
    string_is_key: bool,
    stack: Vec<Frame>,
}

impl ParserState {
    fn container(&self) -> Option<ContainerKind> {
        self.stack.last().map(|f| f.kind)
    }

    fn parent(&self) -> Option<ContainerKind> {
        self.stack.len().checked_sub(2).map(|i| self.stack[i].kind)
    }

    fn expecting_key(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame {
                kind: ContainerKind::Object,
                expecting_key: true
            })
        )
    }

    fn set_expecting_key(&mut self, expecting: bool) {
        if let Some(frame) = self.stack.last_mut() {
            if frame.kind == ContainerKind::Object {
                frame.expecting_key = expecting;
            }
        }
    }

    /// Handle one character while inside a string literal.
    fn scan_string_char(&mut self, source: &[char], index: usize, ch: char, out: &mut String) {
        if self.escaping {
            self.escaping = false;
            match ch {
                '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u' => {
                    out.push('\\');
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                other => {
                    // Stray backslash: keep it as a literal backslash.
                    out.push_str("\\\\");
                    push_string_char(other, out);
                }
            }
            return;
        }

        match ch {
            '\\' => self.escaping = true,
            '"' => {
                if self.string_is_key
                    || looks_like_value_terminator(source, index, self.container(), self.parent())
                {
                    self.in_string = false;
                    self.string_is_key = false;
                    self.set_expecting_key(false);
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            other => push_string_char(other, out),
        }
    }

    /// Handle one character outside any string literal.
    fn scan_structural(&mut self, ch: char, out: &mut String) {
        match ch {
            '"' => {
                self.in_string = true;
                self.escaping = false;
                self.string_is_key = self.expecting_key();
            }
            '{' => self.stack.push(Frame {
                kind: ContainerKind::Object,
                expecting_key: true,
            }),
            '[' => self.stack.push(Frame {
                kind: ContainerKind::Array,
                expecting_key: false,
            }),
            '}' | ']' => {
                self.stack.pop();
            }
            ':' => self.set_expecting_key(false),
            ',' => self.set_expecting_key(true),
            _ => {}
        }
        out.push(ch);
    }
}

/// Push a character that belongs to string content, escaping control bytes.
fn push_string_char(ch: char, out: &mut String) {
    match ch {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        c if (c as u32) <= 0x1f => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Rewrite near-JSON text into something `serde_json` is more likely to accept.
///
/// Never fails. The output is not guaranteed to be valid JSON: callers must
/// parse it and treat a failure as final. Already-valid JSON comes back
/// unchanged.
pub fn repair_json_string(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let source: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut state = ParserState::default();

    for (index, &ch) in source.iter().enumerate() {
        if state.in_string {
            state.scan_string_char(&source, index, ch, &mut out);
        } else {
            state.scan_structural(ch, &mut out);
        }
    }

    if state.escaping {
        out.push_str("\\\\");
    }
    if state.in_string {
        out.push('"');
    }
    out
}

// ─── Terminator Heuristic ────────────────────────────────────────────────────

/// Decide whether the quote at `index` closes the current string value.
///
/// True when the quote is followed (after whitespace) by end of input, by a
/// `,` and a plausible next member of `container`, or by the closing bracket
/// of `container` that is itself followed by something plausible for `parent`.
fn looks_like_value_terminator(
    source: &[char],
    index: usize,
    container: Option<ContainerKind>,
    parent: Option<ContainerKind>,
) -> bool {
    let Some(next_index) = next_non_whitespace(source, index + 1) else {
        return true;
    };
    let next = source[next_index];

    if next == '}' || next == ']' {
        match (container, next) {
            (Some(ContainerKind::Object), ']') | (Some(ContainerKind::Array), '}') => return false,
            _ => {}
        }
        let Some(following_index) = next_non_whitespace(source, next_index + 1) else {
            return true;
        };
        let Some(parent) = parent else {
            return false;
        };
        let following = source[following_index];
        if following == ',' {
            let Some(token_index) = next_non_whitespace(source, following_index + 1) else {
                return true;
            };
            return plausible_member_start(source, token_index, parent);
        }
        return match parent {
            ContainerKind::Object => following == '}',
            ContainerKind::Array => following == ']',
        };
    }

    if next != ',' {
        return false;
    }
    let Some(token_index) = next_non_whitespace(source, next_index + 1) else {
        return true;
    };
    // A bare top-level string is treated like an array element.
    plausible_member_start(source, token_index, container.unwrap_or(ContainerKind::Array))
}

/// Whether the token at `index` can start the next member of `kind`.
fn plausible_member_start(source: &[char], index: usize, kind: ContainerKind) -> bool {
    let token = source[index];
    match kind {
        ContainerKind::Object => match token {
            '}' => true,
            '"' => looks_like_object_key(source, index),
            _ => false,
        },
        ContainerKind::Array => {
            matches!(token, '"' | '{' | '[' | ']' | '-' | 't' | 'f' | 'n') || token.is_ascii_digit()
        }
    }
}

/// A quoted string on one line followed by `:`.
fn looks_like_object_key(source: &[char], start: usize) -> bool {
    if source.get(start) != Some(&'"') {
        return false;
    }
    let mut cursor = start + 1;
    let mut escaping = false;
    while cursor < source.len() {
        let ch = source[cursor];
        if escaping {
            escaping = false;
        } else if ch == '\\' {
            escaping = true;
        } else if ch == '\n' || ch == '\r' {
            return false;
        } else if ch == '"' {
            return next_non_whitespace(source, cursor + 1).is_some_and(|i| source[i] == ':');
        }
        cursor += 1;
    }
    false
}

fn next_non_whitespace(source: &[char], start: usize) -> Option<usize> {
    (start..source.len()).find(|&i| !matches!(source[i], ' ' | '\t' | '\n' | '\r'))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
