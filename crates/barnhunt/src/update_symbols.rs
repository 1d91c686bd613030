//! The "Update Symbols" effect: refresh a drawing's symbol definitions from
//! the installed symbol library.
//!
//! A symbol set is a directory under `<inkscape data dir>/symbols/` holding
//! a `METADATA.json` (`{"name": "bh-symbols"}`) and one or more SVG files.
//! File stems ending in `-<a>to<b>` hold symbols drawn at scale `a:b`;
//! everything else is `48:1`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Namespaces;
use crate::document::{Document, ElementKind, NodeId};
use crate::error::SymbolError;

pub const DEFAULT_SYMBOL_SET: &str = "bh-symbols";
pub const DEFAULT_SCALE: &str = "48:1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSymbolsOptions {
    /// Name of the symbol set, as given in its `METADATA.json`.
    pub symbol_set: String,
    /// Data directories to search; empty means ask inkscape.
    pub data_paths: Vec<PathBuf>,
}

impl Default for UpdateSymbolsOptions {
    fn default() -> Self {
        Self {
            symbol_set: DEFAULT_SYMBOL_SET.to_string(),
            data_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: Option<String>,
}

/// Inkscape's system and user data directories.
pub fn inkscape_data_paths() -> Result<Vec<PathBuf>, SymbolError> {
    Ok(vec![
        inkscape_data_path("--system-data-directory")?,
        inkscape_data_path("--user-data-directory")?,
    ])
}

fn inkscape_data_path(flag: &str) -> Result<PathBuf, SymbolError> {
    let program = "inkscape";
    let output = Command::new(program)
        .arg(flag)
        .output()
        .map_err(|source| SymbolError::Command {
            program: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(SymbolError::CommandFailed {
            program: format!("{} {}", program, flag),
            status: output.status.to_string(),
        });
    }
    Ok(PathBuf::from(String::from_utf8_lossy(&output.stdout).trim()))
}

/// Directory of the symbol set called `name`, searching `symbols/` under
/// each data path in turn. Missing data paths are skipped.
pub fn find_symbol_set(data_paths: &[PathBuf], name: &str) -> Result<Option<PathBuf>, SymbolError> {
    for data_path in data_paths {
        if let Some(found) = search_dir(&data_path.join("symbols"), name)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Directories holding a `METADATA.json` end the search below them.
fn search_dir(dir: &Path, name: &str) -> Result<Option<PathBuf>, SymbolError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let metadata_path = dir.join("METADATA.json");
    if metadata_path.is_file() {
        let text = fs::read_to_string(&metadata_path).map_err(|source| SymbolError::Io {
            path: metadata_path.clone(),
            source,
        })?;
        let metadata: Metadata =
            serde_json::from_str(&text).map_err(|source| SymbolError::Metadata {
                path: metadata_path.clone(),
                source,
            })?;
        return Ok((metadata.name.as_deref() == Some(name)).then(|| dir.to_path_buf()));
    }

    let mut subdirs = list_dir(dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect::<Vec<_>>();
    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = search_dir(&subdir, name)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, SymbolError> {
    let io_err = |source| SymbolError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    Ok(paths)
}

static SCALE_SUFFIX: OnceLock<Regex> = OnceLock::new();

/// Drawing scale of a library file, from its file stem.
pub fn symbol_scale(path: &Path) -> String {
    let re = SCALE_SUFFIX.get_or_init(|| Regex::new(r"-(\d+)to(\d+)\z").expect("invalid regex pattern"));
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    match re.captures(&stem) {
        Some(caps) => format!("{}:{}", &caps[1], &caps[2]),
        None => DEFAULT_SCALE.to_string(),
    }
}

/// True when some element inside the symbol has an id not prefixed with
/// `<symbol id>:`.
pub fn has_unscoped_ids(doc: &Document, symbol: NodeId) -> bool {
    let prefix = format!("{}:", doc.xml_id(symbol).unwrap_or_default());
    doc.descendants(symbol)
        .into_iter()
        .skip(1)
        .filter_map(|n| doc.xml_id(n))
        .any(|id| !id.starts_with(&prefix))
}

/// `./defs/symbol[@id]` of a document: top-level defs only.
fn top_level_symbols(doc: &Document, ns: &Namespaces) -> Vec<NodeId> {
    doc.element_children(doc.root())
        .filter(|&n| doc.element_kind(ns, n) == Some(ElementKind::Defs))
        .flat_map(|defs| doc.element_children(defs).collect::<Vec<_>>())
        .filter(|&n| doc.element_kind(ns, n) == Some(ElementKind::Symbol) && doc.xml_id(n).is_some())
        .collect()
}

/// One library file: the parsed document and its usable symbols.
#[derive(Debug)]
struct SymbolFile {
    doc: Document,
    symbols: Vec<(String, NodeId)>,
}

fn load_symbol_file(path: &Path, ns: &Namespaces) -> Result<SymbolFile, SymbolError> {
    let text = fs::read_to_string(path).map_err(|source| SymbolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = Document::parse(&text).map_err(|source| SymbolError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let file_name = path.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
    let mut symbols: Vec<(String, NodeId)> = Vec::new();
    for node in top_level_symbols(&doc, ns) {
        let id = doc.xml_id(node).unwrap_or_default().to_string();
        if has_unscoped_ids(&doc, node) {
            warn!("WARNING: skipping symbol #{} that contains unscoped id(s)", id);
        } else if symbols.iter().any(|(seen, _)| *seen == id) {
            warn!("WARNING: skipping symbol #{} with duplicate id in {}", id, file_name);
        } else {
            symbols.push((id, node));
        }
    }
    Ok(SymbolFile { doc, symbols })
}

/// Symbols loaded from one symbol set, by id.
#[derive(Debug, Default)]
pub struct SymbolLibrary {
    files: Vec<SymbolFile>,
    by_id: HashMap<String, (usize, NodeId)>,
}

impl SymbolLibrary {
    /// Load every `*.svg` in a symbol set directory.
    ///
    /// `48:1` files come first, then the others by scale. A file sharing
    /// any symbol id with an earlier file is skipped entirely.
    pub fn load(dir: &Path, ns: &Namespaces) -> Result<SymbolLibrary, SymbolError> {
        let mut paths: Vec<PathBuf> = list_dir(dir)?
            .into_iter()
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "svg"))
            .collect();
        paths.sort_by_cached_key(|p| {
            let scale = symbol_scale(p);
            (scale != DEFAULT_SCALE, scale, p.clone())
        });

        let mut library = SymbolLibrary::default();
        for path in paths {
            let file = load_symbol_file(&path, ns)?;
            if file.symbols.iter().any(|(id, _)| library.by_id.contains_key(id)) {
                warn!(
                    "WARNING: {} contains duplicate symbol ids, skipping",
                    path.file_name().map(|s| s.to_string_lossy()).unwrap_or_default()
                );
                continue;
            }
            debug!("loaded {} symbols from {}", file.symbols.len(), path.display());
            let index = library.files.len();
            for (id, node) in &file.symbols {
                library.by_id.insert(id.clone(), (index, *node));
            }
            library.files.push(file);
        }
        Ok(library)
    }

    pub fn get(&self, id: &str) -> Option<(&Document, NodeId)> {
        let &(index, node) = self.by_id.get(id)?;
        Some((&self.files[index].doc, node))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Symbol ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_id.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Locate and load the configured symbol set.
pub fn load_symbols(options: &UpdateSymbolsOptions, ns: &Namespaces) -> Result<SymbolLibrary, SymbolError> {
    let data_paths = if options.data_paths.is_empty() {
        inkscape_data_paths()?
    } else {
        options.data_paths.clone()
    };
    let dir = find_symbol_set(&data_paths, &options.symbol_set)?
        .ok_or_else(|| SymbolError::SymbolSetNotFound(options.symbol_set.clone()))?;
    SymbolLibrary::load(&dir, ns)
}

/// Replace the drawing's top-level symbol definitions with the library's
/// versions. Returns the ids that were replaced.
pub fn update_symbols(doc: &mut Document, ns: &Namespaces, library: &SymbolLibrary) -> Vec<String> {
    let mut updated = Vec::new();
    for old in top_level_symbols(doc, ns) {
        let id = doc.xml_id(old).unwrap_or_default().to_string();
        let Some((source, node)) = library.get(&id) else {
            continue;
        };
        info!("Updating #{}", id);
        let replacement = doc.import(source, node);
        doc.replace(old, replacement);
        updated.push(id);
    }
    updated
}
