//! Error Classifier
//!
//! The single place where raw engine diagnostics are mapped to an
//! [`ErrorKind`]. Matching is case-insensitive substring search over an
//! ordered signature table; the first hit wins, so specific signatures are
//! listed before broad ones.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable classification of an execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TypeMismatch,
    DateParse,
    Syntax,
    UnresolvedReference,
    UnknownFunction,
    Other,
}

impl ErrorKind {
    /// Every kind except `Other` has known remediation.
    pub fn is_fixable(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TypeMismatch => write!(f, "TypeMismatch"),
            ErrorKind::DateParse => write!(f, "DateParse"),
            ErrorKind::Syntax => write!(f, "Syntax"),
            ErrorKind::UnresolvedReference => write!(f, "UnresolvedReference"),
            ErrorKind::UnknownFunction => write!(f, "UnknownFunction"),
            ErrorKind::Other => write!(f, "Other"),
        }
    }
}

/// One entry of the fixable-failure vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub kind: ErrorKind,
    pub needle: String,
}

impl Signature {
    pub fn new(kind: ErrorKind, needle: &str) -> Self {
        Self {
            kind,
            needle: needle.to_lowercase(),
        }
    }
}

/// Default vocabulary, most specific first.
///
/// Function-support errors name the missing function, so they are checked
/// before the date and cast needles that the function name could trip.
const DEFAULT_SIGNATURES: &[(ErrorKind, &str)] = &[
    // unknown functions / wrong dialect
    (ErrorKind::UnknownFunction, "unsupported sql function"),
    (ErrorKind::UnknownFunction, "unsupported function"),
    (ErrorKind::UnknownFunction, "unknown function"),
    (ErrorKind::UnknownFunction, "list_aggr"),
    (ErrorKind::UnknownFunction, "group_concat"),
    (ErrorKind::UnknownFunction, "listagg"),
    (ErrorKind::UnknownFunction, "string_agg"),
    // date parsing
    (ErrorKind::DateParse, "to `date`"),
    (ErrorKind::DateParse, "to `datetime"),
    (ErrorKind::DateParse, "could not parse"),
    (ErrorKind::DateParse, "invalid date"),
    (ErrorKind::DateParse, "date format"),
    // type mismatch / casts
    (ErrorKind::TypeMismatch, "type mismatch"),
    (ErrorKind::TypeMismatch, "conversion from"),
    (ErrorKind::TypeMismatch, "cannot cast"),
    (ErrorKind::TypeMismatch, "could not convert"),
    (ErrorKind::TypeMismatch, "not supported for dtype"),
    (ErrorKind::TypeMismatch, "arithmetic on string"),
    (ErrorKind::TypeMismatch, "cannot compare"),
    (ErrorKind::TypeMismatch, "dtype"),
    // unresolved tables / columns
    (ErrorKind::UnresolvedReference, "columnnotfound"),
    (ErrorKind::UnresolvedReference, "unable to find column"),
    (ErrorKind::UnresolvedReference, "not found"),
    (ErrorKind::UnresolvedReference, "does not exist"),
    (ErrorKind::UnresolvedReference, "unknown column"),
    (ErrorKind::UnresolvedReference, "no such table"),
    // syntax, including UNION arms of different widths
    (ErrorKind::Syntax, "schema lengths differ"),
    (ErrorKind::Syntax, "vertical concat"),
    (ErrorKind::Syntax, "sql parser"),
    (ErrorKind::Syntax, "parser error"),
    (ErrorKind::Syntax, "syntax"),
    (ErrorKind::Syntax, "expected"),
    (ErrorKind::Syntax, "unexpected"),
    (ErrorKind::Syntax, "union"),
    // broad fallbacks
    (ErrorKind::DateParse, "date"),
    (ErrorKind::TypeMismatch, "type"),
    (ErrorKind::TypeMismatch, "cast"),
    (ErrorKind::UnresolvedReference, "table"),
    (ErrorKind::UnresolvedReference, "relation"),
];

/// Maps engine diagnostics to an [`ErrorKind`].
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    signatures: Vec<Signature>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::with_signatures(
            DEFAULT_SIGNATURES
                .iter()
                .map(|(kind, needle)| Signature::new(*kind, needle))
                .collect(),
        )
    }

    /// Replace the vocabulary entirely.
    pub fn with_signatures(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    /// Append a signature; it is checked after the existing ones.
    pub fn add_signature(&mut self, kind: ErrorKind, needle: &str) {
        self.signatures.push(Signature::new(kind, needle));
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Classify an engine diagnostic.
    pub fn classify(&self, message: &str) -> ErrorKind {
        let lowered = message.to_lowercase();
        self.signatures
            .iter()
            .find(|sig| lowered.contains(&sig.needle))
            .map(|sig| sig.kind)
            .unwrap_or(ErrorKind::Other)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
