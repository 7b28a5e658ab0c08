//! Diagnostics collected during translation.
//!
//! The translator never throws across its API boundary; every failure is
//! recorded here and replaced in the output by the error placeholder.

use quill_ast::Span;
use thiserror::Error;

/// Error taxonomy of the translation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("{0}")]
    SourceError(String),

    #[error("Type not found in metadata: {0}")]
    TypeNotFound(String),

    #[error("Member not found in metadata: {0}")]
    MemberNotFound(String),

    #[error("Error in macro {name}: {message}")]
    MacroError { name: String, message: String },

    #[error("Error in generator {name}: {message}")]
    GeneratorError { name: String, message: String },
}

/// An error with the source position it was reported at.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub span: Option<Span>,
    pub error: TranslationError,
}

/// A warning with the source position it was reported at.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub span: Option<Span>,
    pub message: String,
}
