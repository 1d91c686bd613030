//! Error types for barnhunt.
//!
//! ## Rust Lesson #20: Error Handling
//!
//! Expected failures (bad selection, dangling references, missing symbol
//! sets) are values of these enums, returned through `Result` and bubbled up
//! with `?`. `thiserror` derives the `Display` and `Error` impls from the
//! `#[error(...)]` attributes.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading an XML document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("invalid UTF-8 in XML name: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("unexpected closing tag </{0}>")]
    UnbalancedTag(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("document ended inside <{0}>")]
    Unclosed(String),
}

/// A `use`-style reference that could not be followed.
///
/// Callers report these as warnings and carry on with an empty
/// contribution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("missing href in reference element")]
    MissingHref,

    #[error("invalid href={0:?} in use")]
    MalformedHref(String),

    #[error("no element for href #{0}")]
    NotFound(String),

    #[error("reference cycle through #{0}")]
    Cycle(String),
}

/// Selections the rat hider refuses to work with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BadRats {
    #[error("Fishy looking rats")]
    Fishy,

    #[error("No rats selected")]
    NoneSelected,

    #[error("Rats are not all on the same layer")]
    MultipleLayers,

    #[error("Rats are not on a layer")]
    NotOnLayer,

    #[error("Selected element #{0} not found in document")]
    UnknownSelection(String),
}

#[derive(Error, Debug)]
pub enum HideRatsError {
    #[error(transparent)]
    BadRats(#[from] BadRats),

    /// The document is not shaped the way we expect (hand edited or
    /// corrupted).
    #[error("Unexpected document structure: {0}")]
    Structure(String),
}

/// Errors from the symbol-library synchronizer.
#[derive(Error, Debug)]
pub enum SymbolError {
    #[error("can not find symbol set with name {0:?}")]
    SymbolSetNotFound(String),

    #[error("failed to run {program}: {source}")]
    Command {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    CommandFailed { program: String, status: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid METADATA.json in {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("can not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
}

/// Errors from the PNG inset exporter.
#[derive(Error, Debug)]
pub enum InsetError {
    #[error("You must select exactly one object.")]
    SelectionCount,

    #[error("Selected object has no id")]
    MissingId,

    #[error("Can not find export node #{0}")]
    ExportNodeNotFound(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed ({status}): {output}")]
    CommandFailed {
        program: String,
        status: String,
        output: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid PNG data: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid background color {0:?}")]
    Color(String),

    #[error("in-process rendering failed: {0}")]
    Render(String),
}
