//! Path declaration parser.
//!
//! A declaration list is a comma-separated sequence of clauses:
//!
//! ```text
//! com.example.api;version=latest, util;version='[1.0,2.0)';strategy=lowest
//! ```
//!
//! A clause may name several entries that share the attributes after them
//! (`a;b;version=1.0`). Values may be quoted with `'` or `"` so they can
//! contain commas and semicolons. A name repeated in the same list gets the
//! duplicate marker `~` appended, once per repetition, so every entry keeps
//! its own attributes.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Suffix that keeps repeated names distinct.
pub const DUPLICATE_MARKER: char = '~';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("unterminated quote in `{0}`")]
    UnterminatedQuote(String),

    #[error("attribute without a name in `{0}`")]
    EmptyAttribute(String),

    #[error("clause `{0}` has attributes but no name")]
    MissingName(String),
}

/// One entry of a declaration list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Name as written, including any duplicate markers
    pub key: String,
    pub attrs: BTreeMap<String, String>,
}

impl Declaration {
    pub fn new(key: impl Into<String>) -> Self {
        Declaration {
            key: key.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// The symbolic name with duplicate markers removed.
    pub fn name(&self) -> &str {
        strip_duplicate_marker(&self.key)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.attr("version")
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)?;
        for (k, v) in &self.attrs {
            if v.contains([',', ';']) {
                write!(f, ";{}='{}'", k, v)?;
            } else {
                write!(f, ";{}={}", k, v)?;
            }
        }
        Ok(())
    }
}

/// Remove trailing duplicate markers from a name.
pub fn strip_duplicate_marker(key: &str) -> &str {
    key.trim_end_matches(DUPLICATE_MARKER)
}

/// Split `s` on `sep`, ignoring separators inside quotes.
fn split_unquoted(s: &str, sep: char) -> Result<Vec<String>, DeclarationError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in s.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == sep => parts.push(std::mem::take(&mut current)),
            None => current.push(c),
        }
    }

    if quote.is_some() {
        return Err(DeclarationError::UnterminatedQuote(s.to_string()));
    }
    parts.push(current);
    Ok(parts)
}

fn unquote(value: &str) -> &str {
    let v = value.trim();
    let bytes = v.as_bytes();
    if v.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[v.len() - 1] == bytes[0]
    {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

/// Parse a declaration list.
///
/// Empty clauses are skipped, so trailing commas are harmless. Attribute
/// keys also accept the directive form `key:=value`.
pub fn parse(input: &str) -> Result<Vec<Declaration>, DeclarationError> {
    let mut out: Vec<Declaration> = Vec::new();

    for clause in split_unquoted(input, ',')? {
        if clause.trim().is_empty() {
            continue;
        }

        let mut keys = Vec::new();
        let mut attrs = BTreeMap::new();

        for part in split_unquoted(&clause, ';')? {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.split_once('=') {
                Some((k, v)) => {
                    let k = k.trim().trim_end_matches(':').trim();
                    if k.is_empty() {
                        return Err(DeclarationError::EmptyAttribute(clause.trim().to_string()));
                    }
                    attrs.insert(k.to_string(), unquote(v).to_string());
                }
                None => keys.push(unquote(part).to_string()),
            }
        }

        if keys.is_empty() {
            return Err(DeclarationError::MissingName(clause.trim().to_string()));
        }

        for key in keys {
            let mut key = key;
            while out.iter().any(|d| d.key == key) {
                key.push(DUPLICATE_MARKER);
            }
            out.push(Declaration {
                key,
                attrs: attrs.clone(),
            });
        }
    }

    Ok(out)
}
