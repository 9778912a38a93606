//! Error types for pattern compilation and parsing.
//!
//! Matching and replacement never fail: a candidate that does not match is an
//! ordinary outcome. Errors are raised only while setting up a parser or while
//! compiling a search pattern or replacement template.

use thiserror::Error;

use crate::language::SupportedLanguage;

/// Errors from parsing and pattern compilation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StencilError {
    /// Failed to initialise the Tree-sitter parser for a language.
    #[error("failed to initialise parser for {language}: {message}")]
    ParserInit {
        /// The language that failed to initialise.
        language: SupportedLanguage,
        /// Description of the failure.
        message: String,
    },

    /// Failed to parse source code.
    #[error("failed to parse {language}: {message}")]
    Parse {
        /// The language that failed to parse.
        language: SupportedLanguage,
        /// Description of the failure.
        message: String,
    },

    /// The file extension is not supported.
    #[error("unsupported file extension: {extension}")]
    UnsupportedExtension {
        /// The extension that was not recognised.
        extension: String,
    },

    /// A language name could not be recognised.
    #[error("unknown language: {name}")]
    UnknownLanguage {
        /// The name that was not recognised.
        name: String,
    },

    /// The pattern text is lexically invalid regardless of the target grammar.
    ///
    /// Raised for bad placeholder syntax, unterminated quantifier ranges,
    /// invalid constraint expressions and invalid regular expressions.
    #[error("malformed pattern at offset {offset}: {message}")]
    MalformedPattern {
        /// Description of the problem.
        message: String,
        /// Byte offset in the pattern text where the problem was detected.
        offset: usize,
    },

    /// The pattern is well formed but has no supported reading in the target
    /// grammar, or a replacement refers to a variable the pattern lacks.
    #[error("unsupported pattern for {language}: {message}")]
    UnsupportedPattern {
        /// The language the pattern was compiled for.
        language: SupportedLanguage,
        /// Description of the problem.
        message: String,
    },

    /// Internal error indicating a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StencilError {
    /// Creates a parser initialisation error.
    #[must_use]
    pub fn parser_init(language: SupportedLanguage, message: impl Into<String>) -> Self {
        Self::ParserInit {
            language,
            message: message.into(),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(language: SupportedLanguage, message: impl Into<String>) -> Self {
        Self::Parse {
            language,
            message: message.into(),
        }
    }

    /// Creates an unsupported extension error.
    #[must_use]
    pub fn unsupported_extension(extension: impl Into<String>) -> Self {
        Self::UnsupportedExtension {
            extension: extension.into(),
        }
    }

    /// Creates an unknown language error.
    #[must_use]
    pub fn unknown_language(name: impl Into<String>) -> Self {
        Self::UnknownLanguage { name: name.into() }
    }

    /// Creates a malformed pattern error.
    #[must_use]
    pub fn malformed(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedPattern {
            message: message.into(),
            offset,
        }
    }

    /// Creates an unsupported pattern error.
    #[must_use]
    pub fn unsupported(language: SupportedLanguage, message: impl Into<String>) -> Self {
        Self::UnsupportedPattern {
            language,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns whether this error reports a malformed pattern.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPattern { .. })
    }

    /// Returns whether this error reports an unsupported pattern.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedPattern { .. })
    }
}
