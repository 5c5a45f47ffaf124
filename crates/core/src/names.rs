//! Recovering variable names from the text of a save call.
//!
//! The `save!` family of macros captures its own invocation text; this module
//! turns that text back into the list of names the values were bound to. Only
//! the simple case is accepted: one line, each argument a bare identifier.

use miette::SourceSpan;

use crate::document::is_identifier;
use crate::error::{PersistError, PersistResult};

/// Argument layout of the call being resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallShape {
    /// `save(destination, a, b)`: the first argument is not a name.
    DestinationFirst,
    /// `saver.add(a, b)`: every argument is a name.
    NamesOnly,
}

#[derive(Clone, Copy, Debug)]
pub struct NameResolver {
    shape: CallShape,
}

/// A top-level argument as a byte range of the call text.
#[derive(Clone, Copy, Debug)]
struct Segment {
    start: usize,
    end: usize,
}

impl NameResolver {
    pub fn new(shape: CallShape) -> Self {
        Self { shape }
    }

    /// Returns the `arg_count` names passed in `line`, in call order.
    pub fn resolve(&self, line: &str, arg_count: usize) -> PersistResult<Vec<String>> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if let Some(offset) = trimmed.find(['\r', '\n']) {
            return Err(failure(
                line,
                "the call spans more than one line",
                None,
                (offset, 1),
            ));
        }
        let line = trimmed;

        let code = code_chars(line);
        let open_index = find_open_paren(&code)
            .ok_or_else(|| failure(line, "no argument list found", None, (0, line.len())))?;
        let open = code[open_index].0;
        let close_index = find_close_paren(&code, open_index).ok_or_else(|| {
            failure(
                line,
                "the argument list does not close on this line",
                None,
                (open, line.len() - open),
            )
        })?;
        let close = code[close_index].0;

        let mut segments = split_arguments(&code, open_index, close_index);
        if segments.len() > 1
            && segments
                .last()
                .is_some_and(|segment| line[segment.start..segment.end].trim().is_empty())
        {
            segments.pop();
        }
        if segments.len() == 1 && line[segments[0].start..segments[0].end].trim().is_empty() {
            segments.clear();
        }

        let named = match self.shape {
            CallShape::DestinationFirst => {
                if segments.is_empty() {
                    return Err(failure(
                        line,
                        "the destination argument is missing",
                        None,
                        (open, close + 1 - open),
                    ));
                }
                &segments[1..]
            }
            CallShape::NamesOnly => &segments[..],
        };

        let mut names: Vec<String> = Vec::with_capacity(named.len());
        for (index, segment) in named.iter().enumerate() {
            let position = index + 1;
            let (start, text) = trimmed_segment(line, *segment);
            if text.is_empty() {
                return Err(failure(
                    line,
                    format!("argument {position} is empty"),
                    Some(position),
                    (segment.start, segment.end - segment.start),
                ));
            }
            if !is_identifier(text) {
                return Err(failure(
                    line,
                    format!("argument {position} (`{text}`) is not a plain variable name"),
                    Some(position),
                    (start, text.len()),
                ));
            }
            if names.iter().any(|name| name == text) {
                return Err(failure(
                    line,
                    format!("variable `{text}` is passed more than once"),
                    Some(position),
                    (start, text.len()),
                ));
            }
            names.push(text.to_string());
        }

        if names.len() != arg_count {
            return Err(failure(
                line,
                format!(
                    "expected {arg_count} named arguments, found {}",
                    names.len()
                ),
                None,
                (open, close + 1 - open),
            ));
        }
        Ok(names)
    }
}

fn failure(
    line: &str,
    message: impl Into<String>,
    position: Option<usize>,
    span: (usize, usize),
) -> PersistError {
    let message = message.into();
    tracing::debug!(%message, ?position, "name resolution failed");
    PersistError::NameResolution {
        message,
        position,
        src: line.to_string(),
        span: SourceSpan::from(span),
    }
}

fn trimmed_segment(line: &str, segment: Segment) -> (usize, &str) {
    let raw = &line[segment.start..segment.end];
    let leading = raw.len() - raw.trim_start().len();
    (segment.start + leading, raw.trim())
}

/// Characters of `line` outside string and char literals, with their byte
/// offsets. Raw strings (`r"..."`, `r#"..."#`) and lifetimes are recognised.
fn code_chars(line: &str) -> Vec<(usize, char)> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut code = Vec::with_capacity(chars.len());
    let mut index = 0;
    while index < chars.len() {
        let c = chars[index].1;
        let literal_end = match c {
            '"' => Some(skip_string(&chars, index + 1)),
            'r' if opens_raw_string(&chars, index) => Some(skip_raw_string(&chars, index + 1)),
            '\'' => skip_char_literal(&chars, index),
            _ => None,
        };
        match literal_end {
            Some(end) => index = end,
            None => {
                code.push(chars[index]);
                index += 1;
            }
        }
    }
    code
}

fn char_at(chars: &[(usize, char)], index: usize) -> Option<char> {
    chars.get(index).map(|&(_, c)| c)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `index` points past the opening quote; returns the index past the close.
fn skip_string(chars: &[(usize, char)], mut index: usize) -> usize {
    while let Some(c) = char_at(chars, index) {
        match c {
            '\\' => index += 2,
            '"' => return index + 1,
            _ => index += 1,
        }
    }
    chars.len()
}

/// An `r` that starts `r"`, `r#"` or `br"` rather than ending an identifier.
fn opens_raw_string(chars: &[(usize, char)], index: usize) -> bool {
    let standalone = match index.checked_sub(1).and_then(|prev| char_at(chars, prev)) {
        None => true,
        Some('b') => index
            .checked_sub(2)
            .and_then(|prev| char_at(chars, prev))
            .map_or(true, |c| !is_ident_char(c)),
        Some(c) => !is_ident_char(c),
    };
    let mut next = index + 1;
    while char_at(chars, next) == Some('#') {
        next += 1;
    }
    standalone && char_at(chars, next) == Some('"')
}

/// `index` points at the hashes after `r`; no escapes apply inside.
fn skip_raw_string(chars: &[(usize, char)], mut index: usize) -> usize {
    let mut hashes = 0;
    while char_at(chars, index) == Some('#') {
        hashes += 1;
        index += 1;
    }
    index += 1;
    while index < chars.len() {
        if chars[index].1 == '"'
            && (1..=hashes).all(|offset| char_at(chars, index + offset) == Some('#'))
        {
            return index + 1 + hashes;
        }
        index += 1;
    }
    chars.len()
}

/// Returns the end of a char literal at `index`, or `None` for a lifetime.
fn skip_char_literal(chars: &[(usize, char)], index: usize) -> Option<usize> {
    match char_at(chars, index + 1)? {
        '\\' => {
            let mut end = index + 3;
            while let Some(c) = char_at(chars, end) {
                if c == '\'' {
                    return Some(end + 1);
                }
                end += 1;
            }
            Some(chars.len())
        }
        _ if char_at(chars, index + 2) == Some('\'') => Some(index + 3),
        _ => None,
    }
}

/// Position in `code` of the first `(`.
fn find_open_paren(code: &[(usize, char)]) -> Option<usize> {
    code.iter().position(|&(_, c)| c == '(')
}

/// Position in `code` of the `)` that balances the one at `open`.
fn find_close_paren(code: &[(usize, char)], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, &(_, c)) in code.iter().enumerate().skip(open) {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return (c == ')').then_some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits the text between `code[open]` and `code[close]` on commas outside
/// brackets and literals.
fn split_arguments(code: &[(usize, char)], open: usize, close: usize) -> Vec<Segment> {
    let mut depth = 0usize;
    let mut segments = Vec::new();
    let mut segment_start = code[open].0 + 1;
    for &(offset, c) in &code[open + 1..close] {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                segments.push(Segment {
                    start: segment_start,
                    end: offset,
                });
                segment_start = offset + 1;
            }
            _ => {}
        }
    }
    segments.push(Segment {
        start: segment_start,
        end: code[close].0,
    });
    segments
}

#[cfg(test)]
#[path = "tests/names_tests.rs"]
mod tests;
