//! Grammar-source tree.
//!
//! The engine does not read grammar text itself; an external producer hands it
//! a tree of definitions. Each `Definition` names a symbol and carries one or
//! more `Description`s (alternatives); each description is an ordered list of
//! `Phrase`s (a literal, a character class, or a reference to another
//! definition, plus an optional flag).
//!
//! Phrase notation:
//!   - `'…'` or `"…"`       literal text (decomposed into character terminals)
//!   - `<letter>`, `<digit>`, `<whitespace>`, `<punct>`, `<any>`, `<a-z>`
//!                          Unicode class / range terminals
//!   - anything else        a reference to a definition by name
//!
//! The tree is plain serde data, so grammar files are just YAML or JSON.

use serde::{Deserialize, Serialize};

/// A named grammar symbol with its alternative productions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub descriptions: Vec<Description>,
}

/// One alternative production: an ordered list of phrases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub phrases: Vec<Phrase>,
}

/// One slot of a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    pub text: String,
    #[serde(default)]
    pub optional: bool,
}

impl Definition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptions: Vec::new(),
        }
    }

    /// Builder-style: append an alternative.
    pub fn describe(mut self, description: Description) -> Self {
        self.descriptions.push(description);
        self
    }

    /// Builder-style: append an alternative made of plain (non-optional)
    /// phrases.
    pub fn alt<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let description = Description {
            phrases: phrases
                .into_iter()
                .map(|text| Phrase::new(text.into()))
                .collect(),
        };
        self.descriptions.push(description);
        self
    }
}

impl Description {
    pub fn new() -> Self {
        Self {
            phrases: Vec::new(),
        }
    }

    /// Builder-style: append a required phrase.
    pub fn phrase(mut self, text: impl Into<String>) -> Self {
        self.phrases.push(Phrase::new(text));
        self
    }

    /// Builder-style: append an optional phrase.
    pub fn optional(mut self, text: impl Into<String>) -> Self {
        self.phrases.push(Phrase {
            text: text.into(),
            optional: true,
        });
        self
    }
}

impl Default for Description {
    fn default() -> Self {
        Self::new()
    }
}

impl Phrase {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            optional: false,
        }
    }

    /// The literal content if this phrase is a quoted literal.
    ///
    /// Both `'…'` and `"…"` quoting are accepted. Empty literals yield `None`;
    /// a grammar slot has to match at least one code point.
    pub fn literal(&self) -> Option<&str> {
        let text = self.text.as_str();
        for quote in ['\'', '"'] {
            if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
                let inner = &text[1..text.len() - 1];
                if !inner.is_empty() {
                    return Some(inner);
                }
            }
        }
        None
    }

    /// The class name if this phrase is an angle-bracketed character class,
    /// e.g. `<digit>` yields `digit`.
    pub fn class(&self) -> Option<&str> {
        let text = self.text.as_str();
        if text.len() >= 3 && text.starts_with('<') && text.ends_with('>') {
            Some(&text[1..text.len() - 1])
        } else {
            None
        }
    }
}

/// A whole grammar file: a name plus its definitions. This is the document
/// shape the CLI deserializes from YAML/JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarSource {
    pub name: String,
    pub definitions: Vec<Definition>,
}
