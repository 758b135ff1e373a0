//! Field codec for the delimited record files.
//!
//! One record is one line: fields joined by [`DELIMITER`]. A field that
//! contains the delimiter, a quote or a line break is wrapped in [`QUOTE`]s and
//! its inner quotes are doubled. Decoding tracks the quote state one character
//! at a time, so a delimiter inside quotes never splits a field. Lines written
//! by older builds, which quote every text field unconditionally, decode the
//! same way.

use std::borrow::Cow;
use std::fmt::Display;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

pub const DELIMITER: char = ',';
pub const QUOTE: char = '"';

/// Failure to turn a decoded line into a typed record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("missing field {0}")]
    Missing(usize),

    #[error("field {index} has invalid value '{value}': {reason}")]
    Invalid {
        index: usize,
        value: String,
        reason: String,
    },
}

fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| c == DELIMITER || c == QUOTE || c == '\n' || c == '\r')
}

/// Encodes one field, quoting only when the value would otherwise be ambiguous.
pub fn encode_field(value: &str) -> Cow<'_, str> {
    if !needs_quoting(value) {
        return Cow::Borrowed(value);
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push(QUOTE);
    for c in value.chars() {
        if c == QUOTE {
            quoted.push(QUOTE);
        }
        quoted.push(c);
    }
    quoted.push(QUOTE);
    Cow::Owned(quoted)
}

/// Joins already-ordered field values into a single line (without terminator).
pub fn encode_record<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        line.push_str(&encode_field(field.as_ref()));
    }
    line
}

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(&['\n', '\r'][..])
}

/// Lazily decoded fields of one line, in order.
pub struct Fields<'a> {
    chars: Peekable<Chars<'a>>,
    finished: bool,
}

impl<'a> Fields<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            chars: strip_terminator(line).chars().peekable(),
            finished: false,
        }
    }
}

impl Iterator for Fields<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }

        let mut field = String::new();
        let mut in_quotes = false;

        while let Some(c) = self.chars.next() {
            match c {
                QUOTE if in_quotes => {
                    // A doubled quote inside a quoted section is a literal quote.
                    if self.chars.next_if_eq(&QUOTE).is_some() {
                        field.push(QUOTE);
                    } else {
                        in_quotes = false;
                    }
                }
                QUOTE => in_quotes = true,
                DELIMITER if !in_quotes => return Some(field),
                other => field.push(other),
            }
        }

        self.finished = true;
        Some(field)
    }
}

/// Returns the unquoted value of field `index`, or `None` when the line has
/// fewer fields. An empty field decodes to `Some("")`.
pub fn decode_field(line: &str, index: usize) -> Option<String> {
    Fields::new(line).nth(index)
}

/// All fields of one line.
pub fn decode_record(line: &str) -> Vec<String> {
    Fields::new(line).collect()
}

/// A decoded line with typed accessors used by `Record` implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<String>,
}

impl RawRecord {
    pub fn parse(line: &str) -> Self {
        Self {
            fields: decode_record(line),
        }
    }

    pub fn text(&self, index: usize) -> Result<&str, FieldError> {
        self.fields
            .get(index)
            .map(String::as_str)
            .ok_or(FieldError::Missing(index))
    }

    /// Parses a field after trimming surrounding whitespace.
    pub fn parse_field<T>(&self, index: usize) -> Result<T, FieldError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.text(index)?;
        raw.trim().parse().map_err(|err: T::Err| FieldError::Invalid {
            index,
            value: raw.to_string(),
            reason: err.to_string(),
        })
    }

    /// Boolean flags are persisted as integers; any non-zero value is set.
    pub fn flag(&self, index: usize) -> Result<bool, FieldError> {
        self.parse_field::<i64>(index).map(|value| value != 0)
    }
}
