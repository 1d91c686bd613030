//! The "Count Symbols" effect: tally how often each symbol is used.
//!
//! Every `use` outside a symbol definition is counted. A `use` of a symbol
//! counts once for that symbol (or for whatever its `bh:count-as` names); a
//! `use` of anything else counts all the uses inside it, so a group of two
//! bales used three times counts six bales.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::AddAssign;

use serde::Serialize;
use tracing::warn;

use crate::config::Namespaces;
use crate::document::{Document, ElementKind, NodeId};
use crate::resolve::Resolver;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountSymbolsOptions {
    /// Also count uses inside hidden (`display:none`) elements.
    pub include_hidden: bool,
}

/// Usage counts keyed by symbol reference (`#id` unless overridden).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SymbolCounts(BTreeMap<String, usize>);

impl SymbolCounts {
    pub fn get(&self, symbol: &str) -> usize {
        self.0.get(symbol).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    fn add(&mut self, symbol: impl Into<String>, count: usize) {
        *self.0.entry(symbol.into()).or_default() += count;
    }

    /// Highest count first; ties in symbol order.
    pub fn most_common(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self.0.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        entries
    }

    /// One `"{count:4}: {symbol}"` line per symbol.
    pub fn to_text(&self) -> String {
        self.most_common()
            .into_iter()
            .map(|(symbol, count)| format!("{:4}: {}\n", count, symbol))
            .collect()
    }
}

impl AddAssign<&SymbolCounts> for SymbolCounts {
    fn add_assign(&mut self, other: &SymbolCounts) {
        for (symbol, &count) in &other.0 {
            self.add(symbol.clone(), count);
        }
    }
}

/// Memoizing counter over one document.
pub struct SymbolCounter<'a> {
    doc: &'a Document,
    ns: &'a Namespaces,
    resolver: Resolver<'a>,
    memo: HashMap<String, SymbolCounts>,
    in_progress: HashSet<String>,
}

impl<'a> SymbolCounter<'a> {
    pub fn new(doc: &'a Document, ns: &'a Namespaces) -> Self {
        Self {
            doc,
            ns,
            resolver: Resolver::new(doc, ns),
            memo: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Counts contributed by one `use` element.
    pub fn use_counts(&mut self, node: NodeId) -> SymbolCounts {
        match self.resolver.target_id(node) {
            Ok(id) => self.symbol_counts(id),
            Err(err) => {
                warn!("WARNING: {}", err);
                SymbolCounts::default()
            }
        }
    }

    /// Counts for a reference to `id`, computed once per id.
    pub fn symbol_counts(&mut self, id: &str) -> SymbolCounts {
        if let Some(counts) = self.memo.get(id) {
            return counts.clone();
        }
        if !self.in_progress.insert(id.to_string()) {
            warn!("WARNING: reference cycle through #{}", id);
            return SymbolCounts::default();
        }
        let counts = self.count(id);
        self.in_progress.remove(id);
        self.memo.insert(id.to_string(), counts.clone());
        counts
    }

    fn count(&mut self, id: &str) -> SymbolCounts {
        let target = match self.resolver.lookup(id) {
            Ok(target) => target,
            Err(err) => {
                warn!("WARNING: {}", err);
                return SymbolCounts::default();
            }
        };
        let mut counts = SymbolCounts::default();
        if self.doc.element_kind(self.ns, target) == Some(ElementKind::Symbol) {
            let symbol = self
                .doc
                .attr(target, self.ns.count_as())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", id));
            counts.add(symbol, 1);
        } else {
            let uses: Vec<NodeId> = self
                .doc
                .descendants(target)
                .into_iter()
                .filter(|&n| self.is_local_use(n))
                .collect();
            for node in uses {
                let inner = self.use_counts(node);
                counts += &inner;
            }
        }
        counts
    }

    fn is_local_use(&self, node: NodeId) -> bool {
        self.doc.element_kind(self.ns, node) == Some(ElementKind::Reference)
            && self.resolver.href(node).is_some_and(|h| h.starts_with('#'))
    }
}

/// Count symbol usage across the whole drawing.
pub fn count_symbols(doc: &Document, ns: &Namespaces, options: &CountSymbolsOptions) -> SymbolCounts {
    let mut counter = SymbolCounter::new(doc, ns);
    let uses: Vec<NodeId> = doc
        .descendants(doc.root())
        .into_iter()
        .filter(|&n| counter.is_local_use(n))
        .filter(|&n| {
            !doc.ancestors(n)
                .any(|a| doc.element_kind(ns, a) == Some(ElementKind::Symbol))
        })
        .filter(|&n| options.include_hidden || !doc.ancestors(n).any(|a| doc.is_display_none(a)))
        .collect();

    let mut total = SymbolCounts::default();
    for node in uses {
        let counts = counter.use_counts(node);
        total += &counts;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(layer: &str) -> Document {
        Document::parse(&format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:svg="http://www.w3.org/2000/svg"
                  xmlns:xlink="http://www.w3.org/1999/xlink"
                  xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
                  xmlns:bh="http://dairiki.org/barnhunt/inkscape-extensions">
                 <defs><svg:symbol id="sym1"/><svg:symbol id="sym2"/>
                   <symbol id="bale-48" bh:count-as="#bale"><use xlink:href="#sym1"/></symbol>
                 </defs>
                 <g inkscape:groupmode="layer" id="layer1">{}</g>
               </svg>"##,
            layer
        ))
        .unwrap()
    }

    fn count(d: &Document) -> SymbolCounts {
        count_symbols(d, &Namespaces::default(), &CountSymbolsOptions::default())
    }

    #[test]
    fn counts_direct_uses() {
        let d = doc(r##"<use xlink:href="#sym1"/><use xlink:href="#sym2"/><use xlink:href="#sym2"/>"##);
        let counts = count(&d);
        assert_eq!(counts.get("#sym1"), 1);
        assert_eq!(counts.get("#sym2"), 2);
        assert_eq!(counts.most_common(), vec![("#sym2", 2), ("#sym1", 1)]);
    }

    #[test]
    fn counts_through_groups() {
        let d = doc(
            r##"<g id="group1"><use xlink:href="#sym1"/><use xlink:href="#sym1"/></g>
                <g id="group2"><use xlink:href="#group1"/><use xlink:href="#sym1"/></g>
                <use xlink:href="#group1"/>
                <use xlink:href="#group2"/>
                <use xlink:href="#sym1"/>"##,
        );
        let counts = count(&d);
        assert_eq!(counts.get("#sym1"), 11);
        assert_eq!(counts.total(), 11);
    }

    #[test]
    fn count_as_overrides_the_name() {
        let d = doc(r##"<use xlink:href="#bale-48"/><use xlink:href="#bale-48"/>"##);
        let counts = count(&d);
        assert_eq!(counts.get("#bale"), 2);
        // Uses inside symbol definitions are not counted on their own.
        assert_eq!(counts.get("#sym1"), 0);
    }

    #[test]
    fn hidden_uses_are_skipped_unless_asked() {
        let d = doc(
            r##"<use xlink:href="#sym1"/>
                <g style="display:none"><use xlink:href="#sym2"/></g>"##,
        );
        assert_eq!(count(&d).get("#sym2"), 0);
        let all = count_symbols(
            &d,
            &Namespaces::default(),
            &CountSymbolsOptions { include_hidden: true },
        );
        assert_eq!(all.get("#sym2"), 1);
    }

    #[tracing_test::traced_test]
    #[test]
    fn missing_href_warns() {
        let d = doc(r##"<use xlink:href="#missing-ref"/>"##);
        assert!(count(&d).is_empty());
        assert!(logs_contain("no element for href #missing-ref"));
    }

    #[tracing_test::traced_test]
    #[test]
    fn cycles_count_nothing() {
        let d = doc(r##"<g id="a"><use xlink:href="#b"/></g><g id="b"><use xlink:href="#a"/><use xlink:href="#sym1"/></g>"##);
        let counts = count(&d);
        assert!(logs_contain("reference cycle"));
        assert!(counts.get("#sym1") >= 1);
    }

    #[test]
    fn text_and_json_output() {
        let d = doc(r##"<use xlink:href="#sym2"/><use xlink:href="#sym1"/><use xlink:href="#sym2"/>"##);
        let counts = count(&d);
        assert_eq!(counts.to_text(), "   2: #sym2\n   1: #sym1\n");
        assert_eq!(
            serde_json::to_string(&counts).unwrap(),
            r##"{"#sym1":1,"#sym2":2}"##
        );
    }
}
