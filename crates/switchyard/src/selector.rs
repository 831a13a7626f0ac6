//! Document selectors attached to handler registrations.

use glob::{MatchOptions, Pattern};
use thiserror::Error;

use crate::document::DocumentContext;

/// `*` and `?` stay within one path segment; only `**` crosses `/`.
const PATH_MATCHING: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Errors raised while building a selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The glob pattern could not be compiled.
    #[error("invalid document pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Rejected pattern.
        pattern: String,
        /// Compiler diagnostic.
        message: String,
    },
}

/// One alternative of a [`DocumentSelector`].
///
/// Every condition that is set must hold; an unset condition matches
/// anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocumentFilter {
    scheme: Option<String>,
    language: Option<String>,
    pattern: Option<Pattern>,
}

impl DocumentFilter {
    /// Creates a filter that matches every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the document URI scheme, compared case-insensitively.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into().to_ascii_lowercase());
        self
    }

    /// Requires the document language id.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Requires the decoded document path to match a glob such as `**/*.cs`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::InvalidPattern`] when the glob is malformed.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, SelectorError> {
        let compiled = Pattern::new(pattern).map_err(|error| SelectorError::InvalidPattern {
            pattern: pattern.to_owned(),
            message: error.to_string(),
        })?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    /// Returns the scheme condition.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Returns the language condition.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Returns the pattern condition as written.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Pattern::as_str)
    }

    /// Returns true when the document satisfies every condition.
    #[must_use]
    pub fn matches(&self, context: &DocumentContext) -> bool {
        let uri = context.uri();
        let scheme_ok = self
            .scheme
            .as_deref()
            .is_none_or(|scheme| scheme == uri.scheme());
        let language_ok = self
            .language
            .as_deref()
            .is_none_or(|language| context.language_id() == Some(language));
        let pattern_ok = self
            .pattern
            .as_ref()
            .is_none_or(|pattern| pattern.matches_with(uri.path(), PATH_MATCHING));
        scheme_ok && language_ok && pattern_ok
    }
}

/// Ordered list of filters; a document matches when any filter does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocumentSelector {
    filters: Vec<DocumentFilter>,
}

impl DocumentSelector {
    /// Builds a selector from filters.
    #[must_use]
    pub fn new(filters: impl IntoIterator<Item = DocumentFilter>) -> Self {
        Self {
            filters: filters.into_iter().collect(),
        }
    }

    /// Selector for documents whose path matches `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::InvalidPattern`] when the glob is malformed.
    pub fn for_pattern(pattern: &str) -> Result<Self, SelectorError> {
        Ok(Self::new([DocumentFilter::new().with_pattern(pattern)?]))
    }

    /// Selector for documents in `language`.
    #[must_use]
    pub fn for_language(language: impl Into<String>) -> Self {
        Self::new([DocumentFilter::new().with_language(language)])
    }

    /// Selector for documents with URI `scheme`.
    #[must_use]
    pub fn for_scheme(scheme: impl Into<String>) -> Self {
        Self::new([DocumentFilter::new().with_scheme(scheme)])
    }

    /// Adds another alternative.
    #[must_use]
    pub fn or(mut self, filter: DocumentFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Returns the filters in declaration order.
    #[must_use]
    pub fn filters(&self) -> &[DocumentFilter] {
        &self.filters
    }

    /// Returns true when any filter matches the document.
    #[must_use]
    pub fn matches(&self, context: &DocumentContext) -> bool {
        self.filters.iter().any(|filter| filter.matches(context))
    }
}

/// Options supplied alongside a handler registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationOptions {
    document_selector: Option<DocumentSelector>,
}

impl RegistrationOptions {
    /// Options without a selector; the handler accepts every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the handler to documents matched by `selector`.
    #[must_use]
    pub fn with_selector(mut self, selector: DocumentSelector) -> Self {
        self.document_selector = Some(selector);
        self
    }

    /// Returns the selector, if any.
    #[must_use]
    pub const fn document_selector(&self) -> Option<&DocumentSelector> {
        self.document_selector.as_ref()
    }
}

impl From<DocumentSelector> for RegistrationOptions {
    fn from(selector: DocumentSelector) -> Self {
        Self::new().with_selector(selector)
    }
}
