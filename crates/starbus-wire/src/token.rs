//! Character-driven JSON tokenizer.
//!
//! The tokenizer is an explicit finite-state machine driven one input
//! character at a time, not a recursive-descent tree walk: its memory is a
//! state register, a container stack for `{}`/`[]` bookkeeping and one
//! scalar accumulator, independent of document size. On any character that
//! violates the current state's grammar it enters the absorbing [`TokenizerState::Error`]
//! state; the caller abandons the stream.

use crate::error::{Result, WireError};

/// The tokenizer's state register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerState {
    /// Outside any structure; only `{` is meaningful.
    Idle,
    /// Inside an object, expecting a member name or `}`.
    BeginStruct,
    /// Accumulating a member name.
    Name,
    /// Between a member name and its value (`:` then the value start).
    NameSeparator,
    /// Inside an array, expecting a value or `]`.
    BeginArray,
    /// Accumulating a quoted string value.
    TextValue,
    /// Accumulating a number literal.
    NumberValue,
    /// Accumulating a `true`/`false` literal.
    LogicalValue,
    /// After a scalar value, expecting `,` or a closer.
    ValueSeparator,
    /// Just closed an object, expecting `,` or a closer.
    EndStruct,
    /// Just closed an array, expecting `,` or a closer.
    EndArray,
    /// Absorbing error state; the stream is abandoned.
    Error,
}

/// Lexical token emitted by the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    /// Member name inside an object.
    Name(String),
    /// Quoted string value.
    Text(String),
    /// Number value.
    Number(f64),
    /// `true` or `false`.
    Logical(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// Streaming JSON tokenizer.
pub struct Tokenizer {
    state: TokenizerState,
    stack: Vec<Container>,
    buf: String,
    escaped: bool,
    string_complete: bool,
    colon_seen: bool,
    offset: u64,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            state: TokenizerState::Idle,
            stack: Vec::new(),
            buf: String::new(),
            escaped: false,
            string_complete: false,
            colon_seen: false,
            offset: 0,
        }
    }

    /// Current nesting depth; zero between top-level objects.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Current state register, exposed for diagnostics.
    pub fn state(&self) -> TokenizerState {
        self.state
    }

    /// Feed a chunk, appending emitted tokens to `out`.
    pub fn feed(&mut self, chunk: &str, out: &mut Vec<Token>) -> Result<()> {
        for c in chunk.chars() {
            self.push(c, out)?;
        }
        Ok(())
    }

    /// Drive the machine one character; a single character may emit up to
    /// two tokens (a number is only complete at its delimiter).
    pub fn push(&mut self, c: char, out: &mut Vec<Token>) -> Result<()> {
        self.offset += 1;
        match self.state {
            TokenizerState::Idle => match c {
                c if c.is_whitespace() => Ok(()),
                '{' => self.open_object(out),
                _ => self.fail(c),
            },
            TokenizerState::BeginStruct => match c {
                c if c.is_whitespace() => Ok(()),
                '"' => {
                    self.buf.clear();
                    self.escaped = false;
                    self.state = TokenizerState::Name;
                    Ok(())
                }
                '}' => self.close_object(out),
                _ => self.fail(c),
            },
            TokenizerState::Name => {
                self.accumulate_string(c);
                if self.string_done() {
                    out.push(Token::Name(std::mem::take(&mut self.buf)));
                    self.colon_seen = false;
                    self.state = TokenizerState::NameSeparator;
                }
                Ok(())
            }
            TokenizerState::NameSeparator => match c {
                c if c.is_whitespace() => Ok(()),
                ':' if !self.colon_seen => {
                    self.colon_seen = true;
                    Ok(())
                }
                _ if self.colon_seen => self.value_start(c, out),
                _ => self.fail(c),
            },
            TokenizerState::BeginArray => match c {
                c if c.is_whitespace() => Ok(()),
                ']' => self.close_array(out),
                _ => self.value_start(c, out),
            },
            TokenizerState::TextValue => {
                self.accumulate_string(c);
                if self.string_done() {
                    out.push(Token::Text(std::mem::take(&mut self.buf)));
                    self.state = TokenizerState::ValueSeparator;
                }
                Ok(())
            }
            TokenizerState::NumberValue => match c {
                '0'..='9' | '.' | '+' | '-' | 'e' | 'E' => {
                    self.buf.push(c);
                    Ok(())
                }
                _ => {
                    self.finish_number(out)?;
                    self.separator(c, out)
                }
            },
            TokenizerState::LogicalValue => match c {
                'a'..='z' => {
                    self.buf.push(c);
                    Ok(())
                }
                _ => {
                    self.finish_logical(out)?;
                    self.separator(c, out)
                }
            },
            TokenizerState::ValueSeparator
            | TokenizerState::EndStruct
            | TokenizerState::EndArray => self.separator(c, out),
            TokenizerState::Error => Err(WireError::Poisoned),
        }
    }

    // A quoted string accumulates until its closing quote; `string_done`
    // is checked right after each accumulated character.
    fn accumulate_string(&mut self, c: char) {
        if self.escaped {
            self.buf.push(match c {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
            self.escaped = false;
        } else if c == '\\' {
            self.escaped = true;
        } else if c == '"' {
            // Mark completion with a sentinel state change in push().
            self.string_complete = true;
        } else {
            self.buf.push(c);
        }
    }

    fn string_done(&mut self) -> bool {
        if self.string_complete {
            self.string_complete = false;
            true
        } else {
            false
        }
    }

    fn value_start(&mut self, c: char, out: &mut Vec<Token>) -> Result<()> {
        match c {
            '"' => {
                self.buf.clear();
                self.escaped = false;
                self.state = TokenizerState::TextValue;
                Ok(())
            }
            '{' => self.open_object(out),
            '[' => {
                self.stack.push(Container::Array);
                out.push(Token::BeginArray);
                self.state = TokenizerState::BeginArray;
                Ok(())
            }
            '-' | '0'..='9' => {
                self.buf.clear();
                self.buf.push(c);
                self.state = TokenizerState::NumberValue;
                Ok(())
            }
            't' | 'f' => {
                self.buf.clear();
                self.buf.push(c);
                self.state = TokenizerState::LogicalValue;
                Ok(())
            }
            _ => self.fail(c),
        }
    }

    fn separator(&mut self, c: char, out: &mut Vec<Token>) -> Result<()> {
        match c {
            c if c.is_whitespace() => Ok(()),
            ',' => match self.stack.last() {
                Some(Container::Object) => {
                    self.state = TokenizerState::BeginStruct;
                    Ok(())
                }
                Some(Container::Array) => {
                    self.state = TokenizerState::BeginArray;
                    Ok(())
                }
                None => self.fail(c),
            },
            '}' => self.close_object(out),
            ']' => self.close_array(out),
            _ => self.fail(c),
        }
    }

    fn open_object(&mut self, out: &mut Vec<Token>) -> Result<()> {
        self.stack.push(Container::Object);
        out.push(Token::BeginObject);
        self.state = TokenizerState::BeginStruct;
        Ok(())
    }

    fn close_object(&mut self, out: &mut Vec<Token>) -> Result<()> {
        if self.stack.pop() != Some(Container::Object) {
            self.state = TokenizerState::Error;
            return Err(WireError::Unbalanced { offset: self.offset });
        }
        out.push(Token::EndObject);
        self.state = if self.stack.is_empty() {
            TokenizerState::Idle
        } else {
            TokenizerState::EndStruct
        };
        Ok(())
    }

    fn close_array(&mut self, out: &mut Vec<Token>) -> Result<()> {
        if self.stack.pop() != Some(Container::Array) {
            self.state = TokenizerState::Error;
            return Err(WireError::Unbalanced { offset: self.offset });
        }
        out.push(Token::EndArray);
        self.state = if self.stack.is_empty() {
            TokenizerState::Idle
        } else {
            TokenizerState::EndArray
        };
        Ok(())
    }

    fn finish_number(&mut self, out: &mut Vec<Token>) -> Result<()> {
        let literal = std::mem::take(&mut self.buf);
        match literal.parse::<f64>() {
            Ok(value) => {
                out.push(Token::Number(value));
                self.state = TokenizerState::ValueSeparator;
                Ok(())
            }
            Err(_) => {
                self.state = TokenizerState::Error;
                Err(WireError::BadNumber(literal))
            }
        }
    }

    fn finish_logical(&mut self, out: &mut Vec<Token>) -> Result<()> {
        let literal = std::mem::take(&mut self.buf);
        match literal.as_str() {
            "true" => {
                out.push(Token::Logical(true));
                self.state = TokenizerState::ValueSeparator;
                Ok(())
            }
            "false" => {
                out.push(Token::Logical(false));
                self.state = TokenizerState::ValueSeparator;
                Ok(())
            }
            _ => {
                self.state = TokenizerState::Error;
                Err(WireError::BadLiteral(literal))
            }
        }
    }

    fn fail(&mut self, found: char) -> Result<()> {
        self.state = TokenizerState::Error;
        Err(WireError::Syntax {
            offset: self.offset,
            found,
        })
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Result<Vec<Token>> {
        let mut tokenizer = Tokenizer::new();
        let mut out = Vec::new();
        tokenizer.feed(input, &mut out)?;
        Ok(out)
    }

    #[test]
    fn tokenizes_a_flat_object() {
        let out = tokens(r#"{ "a": "x", "b": 1.5, "c": true }"#).unwrap();
        assert_eq!(
            out,
            vec![
                Token::BeginObject,
                Token::Name("a".into()),
                Token::Text("x".into()),
                Token::Name("b".into()),
                Token::Number(1.5),
                Token::Name("c".into()),
                Token::Logical(true),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn unescapes_strings() {
        let out = tokens(r#"{ "m": "line\n\"quoted\"\ttab" }"#).unwrap();
        assert_eq!(out[2], Token::Text("line\n\"quoted\"\ttab".into()));
    }

    #[test]
    fn mismatched_close_is_an_error() {
        assert!(matches!(
            tokens(r#"{ "a": [1, 2 } }"#),
            Err(WireError::Unbalanced { .. })
        ));
    }

    #[test]
    fn error_state_absorbs() {
        let mut tokenizer = Tokenizer::new();
        let mut out = Vec::new();
        assert!(tokenizer.feed("]", &mut out).is_err());
        assert!(matches!(
            tokenizer.push('{', &mut out),
            Err(WireError::Poisoned)
        ));
        assert_eq!(tokenizer.state(), TokenizerState::Error);
    }

    #[test]
    fn depth_returns_to_zero_between_requests() {
        let mut tokenizer = Tokenizer::new();
        let mut out = Vec::new();
        tokenizer.feed(r#"{"a":{"b":[1]}}"#, &mut out).unwrap();
        assert_eq!(tokenizer.depth(), 0);
        assert_eq!(tokenizer.state(), TokenizerState::Idle);
        tokenizer.feed(r#" {"c":2}"#, &mut out).unwrap();
        assert_eq!(tokenizer.depth(), 0);
    }
}
