//! Namespace configuration shared by every effect.
//!
//! One `Namespaces` value is built per invocation and passed explicitly to
//! the components that read or write namespaced attributes.

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const INKSCAPE_NS: &str = "http://www.inkscape.org/namespaces/inkscape";
pub const SODIPODI_NS: &str = "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd";
pub const BH_NS: &str = "http://dairiki.org/barnhunt/inkscape-extensions";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// A namespace-qualified name used for lookups and for creating new
/// elements or attributes.
///
/// `prefix` is only a hint for newly written names; matching compares the
/// namespace URI and local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Name<'a> {
    pub ns: Option<&'a str>,
    pub prefix: Option<&'a str>,
    pub local: &'a str,
}

impl<'a> Name<'a> {
    /// A name in no namespace (ordinary attributes such as `id` or `x`).
    pub const fn plain(local: &'a str) -> Self {
        Self {
            ns: None,
            prefix: None,
            local,
        }
    }

    pub const fn qualified(ns: &'a str, prefix: &'a str, local: &'a str) -> Self {
        Self {
            ns: Some(ns),
            prefix: Some(prefix),
            local,
        }
    }
}

/// The XML namespaces understood by the extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    pub svg: String,
    pub xlink: String,
    pub inkscape: String,
    pub sodipodi: String,
    pub bh: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            svg: SVG_NS.to_string(),
            xlink: XLINK_NS.to_string(),
            inkscape: INKSCAPE_NS.to_string(),
            sodipodi: SODIPODI_NS.to_string(),
            bh: BH_NS.to_string(),
        }
    }
}

impl Namespaces {
    pub fn svg<'a>(&'a self, local: &'a str) -> Name<'a> {
        Name::qualified(&self.svg, "svg", local)
    }

    pub fn xlink<'a>(&'a self, local: &'a str) -> Name<'a> {
        Name::qualified(&self.xlink, "xlink", local)
    }

    pub fn inkscape<'a>(&'a self, local: &'a str) -> Name<'a> {
        Name::qualified(&self.inkscape, "inkscape", local)
    }

    pub fn sodipodi<'a>(&'a self, local: &'a str) -> Name<'a> {
        Name::qualified(&self.sodipodi, "sodipodi", local)
    }

    pub fn bh<'a>(&'a self, local: &'a str) -> Name<'a> {
        Name::qualified(&self.bh, "bh", local)
    }

    /// `bh:rat-placement` on permanent boundary/exclusion elements.
    pub fn rat_placement(&self) -> Name<'_> {
        self.bh("rat-placement")
    }

    /// `bh:rat-guide-mode` on the guide layer and its generated content.
    pub fn rat_guide_mode(&self) -> Name<'_> {
        self.bh("rat-guide-mode")
    }

    /// `bh:rat-guide-source`, the back-link from an exclusion to its marker.
    pub fn rat_guide_source(&self) -> Name<'_> {
        self.bh("rat-guide-source")
    }

    /// `bh:count-as` on symbol definitions.
    pub fn count_as(&self) -> Name<'_> {
        self.bh("count-as")
    }

    pub fn random_seed(&self) -> Name<'_> {
        self.bh("random-seed")
    }

    pub fn inset_export_id(&self) -> Name<'_> {
        self.bh("inset-export-id")
    }

    pub fn inset_visible_layers(&self) -> Name<'_> {
        self.bh("inset-visible-layers")
    }

    pub fn label(&self) -> Name<'_> {
        self.inkscape("label")
    }

    pub fn groupmode(&self) -> Name<'_> {
        self.inkscape("groupmode")
    }

    pub fn insensitive(&self) -> Name<'_> {
        self.sodipodi("insensitive")
    }

    /// True for names in the SVG namespace. Documents without a default
    /// namespace declaration are treated as SVG too.
    pub fn is_svg(&self, ns: Option<&str>) -> bool {
        match ns {
            None => true,
            Some(uri) => uri == self.svg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bh_names() {
        let ns = Namespaces::default();
        let name = ns.rat_placement();
        assert_eq!(name.ns, Some(BH_NS));
        assert_eq!(name.prefix, Some("bh"));
        assert_eq!(name.local, "rat-placement");
    }

    #[test]
    fn undeclared_namespace_counts_as_svg() {
        let ns = Namespaces::default();
        assert!(ns.is_svg(None));
        assert!(ns.is_svg(Some(SVG_NS)));
        assert!(!ns.is_svg(Some(INKSCAPE_NS)));
    }
}
