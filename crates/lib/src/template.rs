//! Placeholder parsing and substitution for templated configuration fields.
//!
//! Target fields (names, context paths, stages, tags) and variable defaults may
//! reference variables or matrix axes by name. This module handles parsing
//! those strings and substituting resolved values.
//!
//! # Placeholder Format
//!
//! - `${NAME}` - value of the variable or matrix axis `NAME`
//!
//! Names consist of ASCII letters, digits and `_`.
//!
//! # Escaping
//!
//! Use `$${` to produce a literal `${` sequence. A single `$` that is not
//! followed by `{` passes through unchanged, so shell-style `$HOME` in build
//! arguments needs no escaping.
//!
//! # Example
//!
//! ```
//! use bakery_lib::template::{parse, Segment};
//!
//! let segments = parse("${tgt}-runtime:$HOME").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Placeholder("tgt".to_string()),
//!     Segment::Literal("-runtime:$HOME".to_string()),
//! ]);
//! ```

use thiserror::Error;

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no placeholders)
  Literal(String),

  /// A named placeholder to be resolved
  Placeholder(String),
}

/// Errors that can occur during placeholder parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("empty placeholder at position {0}")]
  Empty(usize),

  #[error("invalid placeholder name: '{0}'")]
  InvalidName(String),

  #[error("unresolved placeholder: '{0}'")]
  Unresolved(String),
}

/// Resolves placeholder names to values during substitution.
///
/// The associated error lets callers attach their own context (which target,
/// which field) instead of the bare [`TemplateError::Unresolved`].
pub trait Resolver {
  type Error: From<TemplateError>;

  fn resolve(&self, name: &str) -> Result<&str, Self::Error>;
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error if a placeholder is unclosed, empty, or has an invalid name.
pub fn parse(input: &str) -> Result<Vec<Segment>, TemplateError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next(); // consume the second $

        match chars.peek() {
          Some((_, '{')) => {
            // Escaped: $${ -> ${ (literal)
            chars.next();
            literal.push_str("${");
          }
          _ => literal.push_str("$$"),
        }
      }
      Some((_, '{')) => {
        chars.next(); // consume the {

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }

        let mut name = String::new();
        let mut found_close = false;

        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          name.push(c);
        }

        if !found_close {
          return Err(TemplateError::Unclosed(pos));
        }

        let name = name.trim();
        if name.is_empty() {
          return Err(TemplateError::Empty(pos));
        }
        if !is_valid_name(name) {
          return Err(TemplateError::InvalidName(name.to_string()));
        }

        segments.push(Segment::Placeholder(name.to_string()));
      }
      _ => {
        // Lone $, passes through
        literal.push('$');
      }
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Check whether a placeholder name is well formed.
pub fn is_valid_name(name: &str) -> bool {
  !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Substitute all placeholders in a string using the provided resolver.
///
/// # Errors
///
/// Returns an error if parsing fails or if any placeholder cannot be resolved.
pub fn substitute<R: Resolver>(input: &str, resolver: &R) -> Result<String, R::Error> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

/// Substitute placeholders in pre-parsed segments.
pub fn substitute_segments<R: Resolver>(segments: &[Segment], resolver: &R) -> Result<String, R::Error> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(name) => result.push_str(resolver.resolve(name)?),
    }
  }

  Ok(result)
}
