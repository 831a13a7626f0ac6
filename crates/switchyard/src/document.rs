//! Document identity extracted from message parameters.
//!
//! The capability matcher never inspects parameter shapes directly. It asks
//! for a [`DocumentContext`] through [`DocumentParams`], which is implemented
//! for raw JSON parameters and for the common `lsp_types` document parameter
//! structs.

use std::fmt;
use std::str::FromStr;

use lsp_types::{
    CompletionParams, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DidSaveTextDocumentParams, DocumentSymbolParams,
    GotoDefinitionParams, HoverParams, ReferenceParams, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, Uri,
};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Characters escaped when rebuilding a URI path from its decoded form.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Errors raised while parsing a document URI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentUriError {
    /// The input was empty or whitespace.
    #[error("document URI is empty")]
    Empty,
    /// The input was neither a URI nor an absolute path.
    #[error("'{input}' is not a document URI: {message}")]
    Invalid {
        /// Rejected input.
        input: String,
        /// Parser diagnostic.
        message: String,
    },
}

/// Normalised document URI.
///
/// File URIs are stored as `file://[host]/path` with a lower-case drive
/// letter and an unescaped colon after it, so `file:///C%3A/src/a.cs`,
/// `c:\src\a.cs` and `file:///c:/src/a.cs` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentUri {
    uri: String,
    scheme: String,
    path: String,
}

impl DocumentUri {
    /// Parses a URI or an absolute file-system path.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentUriError`] when the input is empty or cannot be
    /// parsed as a URI.
    pub fn parse(input: &str) -> Result<Self, DocumentUriError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DocumentUriError::Empty);
        }

        if is_windows_path(trimmed) {
            return Ok(Self::from_file_path(None, &trimmed.replace('\\', "/")));
        }
        if trimmed.starts_with('/') && !trimmed.starts_with("//") {
            return Ok(Self::from_file_path(None, trimmed));
        }

        let url = Url::parse(trimmed).map_err(|error| DocumentUriError::Invalid {
            input: trimmed.to_owned(),
            message: error.to_string(),
        })?;
        let decoded = percent_decode_str(url.path())
            .decode_utf8_lossy()
            .into_owned();

        if url.scheme() == "file" {
            return Ok(Self::from_file_path(url.host_str(), &decoded));
        }

        Ok(Self {
            uri: url.as_str().to_owned(),
            scheme: url.scheme().to_owned(),
            path: decoded,
        })
    }

    fn from_file_path(host: Option<&str>, path: &str) -> Self {
        let normalised = normalise_drive(path);
        let encoded = utf8_percent_encode(&normalised, PATH_ESCAPES);
        let uri = format!("file://{}{encoded}", host.unwrap_or_default());
        Self {
            uri,
            scheme: String::from("file"),
            path: normalised,
        }
    }

    /// Returns the lower-case scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the percent-decoded path used for glob matching.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the normalised URI text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

/// Matches `c:\...` and `c:/...`.
fn is_windows_path(input: &str) -> bool {
    matches!(
        input.as_bytes(),
        [drive, b':', b'\\' | b'/', ..] if drive.is_ascii_alphabetic()
    )
}

/// Prefixes a slash and lower-cases the drive letter of Windows paths.
fn normalise_drive(path: &str) -> String {
    let rooted = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };
    match rooted.as_bytes() {
        [b'/', drive, b':', ..] if drive.is_ascii_uppercase() => {
            let rest = rooted.get(2..).unwrap_or_default();
            format!("/{}{rest}", char::from(drive.to_ascii_lowercase()))
        }
        _ => rooted,
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.uri)
    }
}

impl AsRef<str> for DocumentUri {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

impl FromStr for DocumentUri {
    type Err = DocumentUriError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl TryFrom<String> for DocumentUri {
    type Error = DocumentUriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&Uri> for DocumentUri {
    type Error = DocumentUriError;

    fn try_from(value: &Uri) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<DocumentUri> for String {
    fn from(value: DocumentUri) -> Self {
        value.uri
    }
}

/// The document a message concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContext {
    uri: DocumentUri,
    language_id: Option<String>,
}

impl DocumentContext {
    /// Builds a context without a language id.
    #[must_use]
    pub const fn new(uri: DocumentUri) -> Self {
        Self {
            uri,
            language_id: None,
        }
    }

    /// Attaches a language id.
    #[must_use]
    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = Some(language_id.into());
        self
    }

    /// Returns the document URI.
    #[must_use]
    pub const fn uri(&self) -> &DocumentUri {
        &self.uri
    }

    /// Returns the language id, when the message carried one.
    #[must_use]
    pub fn language_id(&self) -> Option<&str> {
        self.language_id.as_deref()
    }
}

/// Parameters that can name the document they concern.
pub trait DocumentParams {
    /// Extracts the document, if any.
    fn document_context(&self) -> Option<DocumentContext>;
}

impl DocumentParams for Value {
    fn document_context(&self) -> Option<DocumentContext> {
        let text_document = self.get("textDocument");
        let raw_uri = text_document
            .and_then(|document| document.get("uri"))
            .or_else(|| self.get("uri"))?
            .as_str()?;
        let context = DocumentContext::new(DocumentUri::parse(raw_uri).ok()?);
        let language = text_document
            .and_then(|document| document.get("languageId"))
            .and_then(Value::as_str);
        Some(match language {
            Some(language_id) => context.with_language(language_id),
            None => context,
        })
    }
}

impl<T: DocumentParams> DocumentParams for Option<T> {
    fn document_context(&self) -> Option<DocumentContext> {
        self.as_ref().and_then(DocumentParams::document_context)
    }
}

fn context_for(uri: &Uri) -> Option<DocumentContext> {
    DocumentUri::try_from(uri).ok().map(DocumentContext::new)
}

impl DocumentParams for TextDocumentIdentifier {
    fn document_context(&self) -> Option<DocumentContext> {
        context_for(&self.uri)
    }
}

impl DocumentParams for TextDocumentItem {
    fn document_context(&self) -> Option<DocumentContext> {
        context_for(&self.uri).map(|context| context.with_language(self.language_id.as_str()))
    }
}

impl DocumentParams for TextDocumentPositionParams {
    fn document_context(&self) -> Option<DocumentContext> {
        self.text_document.document_context()
    }
}

impl DocumentParams for DidOpenTextDocumentParams {
    fn document_context(&self) -> Option<DocumentContext> {
        self.text_document.document_context()
    }
}

impl DocumentParams for DidChangeTextDocumentParams {
    fn document_context(&self) -> Option<DocumentContext> {
        context_for(&self.text_document.uri)
    }
}

macro_rules! document_params_via {
    ($($params:ty => $($field:ident).+;)+) => {
        $(
            impl DocumentParams for $params {
                fn document_context(&self) -> Option<DocumentContext> {
                    self.$($field).+.document_context()
                }
            }
        )+
    };
}

document_params_via! {
    DidSaveTextDocumentParams => text_document;
    DidCloseTextDocumentParams => text_document;
    DocumentSymbolParams => text_document;
    HoverParams => text_document_position_params;
    GotoDefinitionParams => text_document_position_params;
    CompletionParams => text_document_position;
    ReferenceParams => text_document_position;
}
