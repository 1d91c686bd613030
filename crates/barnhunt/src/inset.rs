//! The "Create Inset" effect: embed a PNG snapshot of part of the drawing.
//!
//! The selected element is rendered to a PNG which is embedded as a
//! `data:` URL in a new `image` on the root. The image remembers what it
//! was exported from (`bh:inset-export-id`) and which layers were visible
//! (`bh:inset-visible-layers`), so selecting the image and running the
//! effect again re-renders it with the same layer visibility.
//!
//! ## Rust Lesson #21: RAII Guards
//!
//! [`TemporaryVisibility`] borrows the document mutably and records every
//! style it changes. Its `Drop` impl puts the styles back, so visibility is
//! restored however the render exits: success, `?` early return or panic.

use std::fs;
use std::io::{self, Cursor};
use std::process::Command;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ImageReader;
use tracing::{debug, info, warn};

use crate::config::{Name, Namespaces};
use crate::document::{Document, ElementKind, NodeId};
use crate::error::InsetError;
use crate::bbox::page_bounds;
use crate::geometry::{BoundingBox, fmt_number};

/// Which rasterizer renders the PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Renderer {
    /// Run the `inkscape` binary.
    #[default]
    Inkscape,
    /// Render in-process with resvg.
    Resvg,
}

impl FromStr for Renderer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inkscape" => Ok(Renderer::Inkscape),
            "resvg" => Ok(Renderer::Resvg),
            _ => Err(format!("Unknown renderer: {}. Use 'inkscape' or 'resvg'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsetOptions {
    /// Size of the inset relative to the original.
    pub scale: f64,
    /// Resolution of the embedded PNG.
    pub dpi: f64,
    pub background: String,
    /// `optipng -o` level; negative disables optimization.
    pub optipng_level: i32,
    pub verbose: bool,
    pub renderer: Renderer,
}

impl Default for InsetOptions {
    fn default() -> Self {
        Self {
            scale: 0.5,
            dpi: 144.0,
            background: "#ffffff".to_string(),
            optipng_level: 2,
            verbose: false,
            renderer: Renderer::Inkscape,
        }
    }
}

impl InsetOptions {
    /// Export resolution handed to the rasterizer.
    #[inline]
    pub fn export_dpi(&self) -> f64 {
        self.scale * self.dpi
    }

    /// Background as `(#rrggbb, opacity)`.
    pub fn background_color(&self) -> Result<(String, f64), InsetError> {
        let [red, green, blue, alpha] = self.background_rgba()?;
        Ok((
            format!("#{:02x}{:02x}{:02x}", red, green, blue),
            f64::from(alpha) / 255.0,
        ))
    }

    /// Background as RGBA bytes.
    ///
    /// Accepts any CSS color, or the packed `0xRRGGBBAA` integer Inkscape
    /// passes for color parameters.
    pub fn background_rgba(&self) -> Result<[u8; 4], InsetError> {
        let text = self.background.trim();
        if let Ok(packed) = text.parse::<u32>() {
            return Ok(packed.to_be_bytes());
        }
        let color = svgtypes::Color::from_str(text).map_err(|_| InsetError::Color(self.background.clone()))?;
        Ok([color.red, color.green, color.blue, color.alpha])
    }
}

// ============================================================================
// Rasterizers
// ============================================================================

/// Renders the element with a given id to PNG bytes.
pub trait Rasterizer {
    fn render(&self, doc: &Document, export_id: &str, options: &InsetOptions) -> Result<Vec<u8>, InsetError>;
}

/// Rasterizer for the configured [`Renderer`].
pub fn rasterizer(renderer: Renderer) -> Box<dyn Rasterizer> {
    match renderer {
        Renderer::Inkscape => Box::new(InkscapeRasterizer::default()),
        Renderer::Resvg => Box::new(ResvgRasterizer),
    }
}

/// Exports through the `inkscape` command line, then squeezes the result
/// with `optipng` when it is installed.
#[derive(Debug, Clone)]
pub struct InkscapeRasterizer {
    pub inkscape: String,
    pub optipng: String,
}

impl Default for InkscapeRasterizer {
    fn default() -> Self {
        Self {
            inkscape: "inkscape".to_string(),
            optipng: "optipng".to_string(),
        }
    }
}

impl Rasterizer for InkscapeRasterizer {
    fn render(&self, doc: &Document, export_id: &str, options: &InsetOptions) -> Result<Vec<u8>, InsetError> {
        let (background, opacity) = options.background_color()?;
        // Removed when dropped, whatever happens below.
        let tmpdir = tempfile::Builder::new().prefix("bh-").tempdir()?;
        let input_svg = tmpdir.path().join("input.svg");
        let output_png = tmpdir.path().join("output.png");
        fs::write(&input_svg, doc.to_xml_string())?;

        let args = vec![
            format!("--export-filename={}", output_png.display()),
            "--export-type=png".to_string(),
            format!("--export-id={}", export_id),
            format!("--export-background={}", background),
            format!("--export-background-opacity={:.6}", opacity),
            format!("--export-dpi={:.6}", options.export_dpi()),
            input_svg.display().to_string(),
        ];
        run(&self.inkscape, &args, options.verbose)?;

        if options.optipng_level >= 0 {
            let args = vec![
                "-o".to_string(),
                options.optipng_level.to_string(),
                output_png.display().to_string(),
            ];
            match run(&self.optipng, &args, options.verbose) {
                Err(InsetError::Spawn { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                    warn!("WARNING: Can not find executable for {}", self.optipng);
                }
                other => other?,
            }
        }

        Ok(fs::read(&output_png)?)
    }
}

fn run(program: &str, args: &[String], verbose: bool) -> Result<(), InsetError> {
    debug!("running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| InsetError::Spawn {
            program: program.to_string(),
            source,
        })?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        return Err(InsetError::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            output: text.trim().to_string(),
        });
    }
    if verbose && !text.trim().is_empty() {
        info!("{}", text.trim_end());
    }
    Ok(())
}

/// Renders in-process with usvg/resvg, cropped to the export node's
/// stroke bounding box.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResvgRasterizer;

impl Rasterizer for ResvgRasterizer {
    fn render(&self, doc: &Document, export_id: &str, options: &InsetOptions) -> Result<Vec<u8>, InsetError> {
        let [red, green, blue, alpha] = options.background_rgba()?;

        let usvg_options = usvg::Options::default();
        let tree = usvg::Tree::from_str(&doc.to_xml_string(), &usvg_options)
            .map_err(|e| InsetError::Render(e.to_string()))?;
        let node = tree
            .node_by_id(export_id)
            .ok_or_else(|| InsetError::ExportNodeNotFound(export_id.to_string()))?;
        let bbox = node.abs_stroke_bounding_box();

        let zoom = (options.export_dpi() / 96.0) as f32;
        let width = (bbox.width() * zoom).ceil().max(1.0) as u32;
        let height = (bbox.height() * zoom).ceil().max(1.0) as u32;
        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| InsetError::Render(format!("can not create {}x{} pixmap", width, height)))?;
        pixmap.fill(tiny_skia::Color::from_rgba8(red, green, blue, alpha));

        let transform = tiny_skia::Transform::from_translate(-bbox.x(), -bbox.y()).post_scale(zoom, zoom);
        resvg::render(&tree, transform, &mut pixmap.as_mut());
        pixmap.encode_png().map_err(|e| InsetError::Render(e.to_string()))
    }
}

// ============================================================================
// PNG helpers
// ============================================================================

pub fn data_url(data: &[u8], content_type: &str) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(data))
}

/// Pixel width and height of a PNG.
pub fn png_dimensions(png: &[u8]) -> Result<(u32, u32), InsetError> {
    let reader = ImageReader::with_format(Cursor::new(png), image::ImageFormat::Png);
    Ok(reader.into_dimensions()?)
}

// ============================================================================
// Visibility
// ============================================================================

/// Style changes that are undone on drop.
pub struct TemporaryVisibility<'a> {
    doc: &'a mut Document,
    saved: Vec<(NodeId, Option<String>)>,
}

impl<'a> TemporaryVisibility<'a> {
    pub fn new(doc: &'a mut Document) -> Self {
        Self { doc, saved: Vec::new() }
    }

    pub fn set_visibility(&mut self, node: NodeId, visible: bool) {
        let style = self.doc.attr(node, Name::plain("style")).map(str::to_string);
        self.saved.push((node, style));
        self.doc
            .set_style_property(node, "display", if visible { "inline" } else { "none" });
    }

    pub fn doc(&self) -> &Document {
        &*self.doc
    }
}

impl Drop for TemporaryVisibility<'_> {
    fn drop(&mut self) {
        for (node, style) in self.saved.drain(..).rev() {
            match style {
                Some(style) => self.doc.set_attr(node, Name::plain("style"), style),
                None => {
                    self.doc.remove_attr(node, Name::plain("style"));
                }
            }
        }
    }
}

/// Every layer in the drawing, in document order.
pub fn layers(doc: &Document, ns: &Namespaces) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .into_iter()
        .filter(|&n| doc.is_layer(ns, n))
        .collect()
}

/// Layers not hidden by their own or an ancestor's `display:none`.
pub fn visible_layers(doc: &Document, ns: &Namespaces) -> Vec<NodeId> {
    layers(doc, ns)
        .into_iter()
        .filter(|&layer| !doc.is_display_none(layer) && !doc.ancestors(layer).any(|a| doc.is_display_none(a)))
        .collect()
}

// ============================================================================
// The effect
// ============================================================================

/// Create (or refresh) an inset for the single selected element.
///
/// Returns the inset image.
pub fn create_inset(
    doc: &mut Document,
    ns: &Namespaces,
    selection: &[NodeId],
    options: &InsetOptions,
    rasterizer: &dyn Rasterizer,
) -> Result<NodeId, InsetError> {
    let &[selected] = selection else {
        return Err(InsetError::SelectionCount);
    };

    let is_inset = doc.element_kind(ns, selected) == Some(ElementKind::Image)
        && doc.attr(selected, ns.inset_export_id()).is_some_and(|id| !id.is_empty());
    if is_inset {
        recreate_inset(doc, ns, selected, options, rasterizer)?;
        Ok(selected)
    } else {
        let export_id = doc
            .xml_id(selected)
            .map(str::to_string)
            .ok_or(InsetError::MissingId)?;
        new_inset(doc, ns, &export_id, options, rasterizer)
    }
}

fn recreate_inset(
    doc: &mut Document,
    ns: &Namespaces,
    image: NodeId,
    options: &InsetOptions,
    rasterizer: &dyn Rasterizer,
) -> Result<(), InsetError> {
    let export_id = doc.attr(image, ns.inset_export_id()).unwrap_or_default().to_string();
    let visible: Vec<String> = doc
        .attr(image, ns.inset_visible_layers())
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if doc.elements_by_id(&export_id).is_empty() {
        return Err(InsetError::ExportNodeNotFound(export_id));
    }
    info!("Re-creating inset of #{}", export_id);

    let png = {
        let all_layers = layers(doc, ns);
        let mut guard = TemporaryVisibility::new(doc);
        guard.set_visibility(image, false);
        for layer in all_layers {
            let shown = guard
                .doc()
                .xml_id(layer)
                .is_some_and(|id| visible.iter().any(|v| v == id));
            guard.set_visibility(layer, shown);
        }
        rasterizer.render(guard.doc(), &export_id, options)?
    };
    embed_png(doc, ns, image, &png, options)?;
    Ok(())
}

fn new_inset(
    doc: &mut Document,
    ns: &Namespaces,
    export_id: &str,
    options: &InsetOptions,
    rasterizer: &dyn Rasterizer,
) -> Result<NodeId, InsetError> {
    info!("Creating inset of #{}", export_id);
    let png = rasterizer.render(doc, export_id, options)?;

    let image = doc.create_element(ns.svg("image"));
    let (width, height) = embed_png(doc, ns, image, &png, options)?;

    let mut layer_ids = Vec::new();
    for layer in visible_layers(doc, ns) {
        let id = match doc.xml_id(layer) {
            Some(id) => id.to_string(),
            None => {
                let id = doc.unique_id("layer");
                doc.set_attr(layer, Name::plain("id"), id.clone());
                id
            }
        };
        layer_ids.push(id);
    }
    doc.set_attr(image, ns.inset_export_id(), export_id);
    doc.set_attr(image, ns.inset_visible_layers(), layer_ids.join(" "));

    let (cx, cy) = view_center(doc, ns);
    doc.set_attr(image, Name::plain("x"), format!("{:.6}", cx - width / 2.0));
    doc.set_attr(image, Name::plain("y"), format!("{:.6}", cy - height / 2.0));
    doc.set_style_property(image, "image-rendering", "optimizeQuality");
    // SVG's default; inkscape writes "none", which lets the image stretch.
    doc.set_attr(image, Name::plain("preserveAspectRatio"), "xMidYMid");

    let root = doc.root();
    doc.append_child(root, image);
    Ok(image)
}

/// Point the image at the PNG and size it for the export resolution.
fn embed_png(
    doc: &mut Document,
    ns: &Namespaces,
    image: NodeId,
    png: &[u8],
    options: &InsetOptions,
) -> Result<(f64, f64), InsetError> {
    let (px_width, px_height) = png_dimensions(png)?;
    let image_scale = 96.0 / options.dpi;
    let width = f64::from(px_width) * image_scale;
    let height = f64::from(px_height) * image_scale;
    debug!("inset is {}x{} px, {}x{} user units", px_width, px_height, fmt_number(width), fmt_number(height));

    doc.set_attr(image, ns.xlink("href"), data_url(png, "image/png"));
    doc.set_attr(image, Name::plain("width"), format!("{:.6}", width));
    doc.set_attr(image, Name::plain("height"), format!("{:.6}", height));
    Ok((width, height))
}

/// Center of the editor's view, else of the page.
fn view_center(doc: &Document, ns: &Namespaces) -> (f64, f64) {
    let namedview = doc
        .element_children(doc.root())
        .find(|&n| doc.is(n, ns.sodipodi("namedview")));
    let coord = |local: &str| {
        namedview
            .and_then(|view| doc.attr(view, ns.inkscape(local)))
            .and_then(|v| v.trim().parse::<f64>().ok())
    };
    match (coord("cx"), coord("cy")) {
        (Some(cx), Some(cy)) => (cx, cy),
        _ => {
            let page: BoundingBox = page_bounds(doc);
            let center = page.center();
            (center.x, center.y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records the document it was asked to render and returns a blank
    /// PNG of a fixed size.
    struct FakeRasterizer {
        size: (u32, u32),
        seen: RefCell<Vec<(String, String)>>,
    }

    impl FakeRasterizer {
        fn new(width: u32, height: u32) -> Self {
            Self { size: (width, height), seen: RefCell::new(Vec::new()) }
        }
    }

    impl Rasterizer for FakeRasterizer {
        fn render(&self, doc: &Document, export_id: &str, _: &InsetOptions) -> Result<Vec<u8>, InsetError> {
            self.seen.borrow_mut().push((export_id.to_string(), doc.to_xml_string()));
            let img = image::RgbaImage::new(self.size.0, self.size.1);
            let mut png = Vec::new();
            img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
            Ok(png)
        }
    }

    struct FailingRasterizer;

    impl Rasterizer for FailingRasterizer {
        fn render(&self, _: &Document, _: &str, _: &InsetOptions) -> Result<Vec<u8>, InsetError> {
            Err(InsetError::Render("boom".to_string()))
        }
    }

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"
         xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
         xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
         width="200" height="100" viewBox="0 0 200 100">
      <sodipodi:namedview id="view" inkscape:cx="50" inkscape:cy="40"/>
      <g inkscape:groupmode="layer" id="base" inkscape:label="Base">
        <rect id="ring" x="10" y="10" width="48" height="24"/>
      </g>
      <g inkscape:groupmode="layer" id="blind1" inkscape:label="Blind 1"/>
      <g inkscape:groupmode="layer" id="blind2" inkscape:label="Blind 2" style="display:none"/>
    </svg>"#;

    fn setup() -> (Document, Namespaces) {
        (Document::parse(SVG).unwrap(), Namespaces::default())
    }

    #[test]
    fn creates_centered_image() {
        let (mut doc, ns) = setup();
        let ring = doc.elements_by_id("ring")[0];
        let fake = FakeRasterizer::new(36, 18);
        let image = create_inset(&mut doc, &ns, &[ring], &InsetOptions::default(), &fake).unwrap();

        assert_eq!(doc.parent(image), Some(doc.root()));
        assert_eq!(doc.attr(image, Name::plain("width")), Some("24.000000"));
        assert_eq!(doc.attr(image, Name::plain("height")), Some("12.000000"));
        assert_eq!(doc.attr(image, Name::plain("x")), Some("38.000000"));
        assert_eq!(doc.attr(image, Name::plain("y")), Some("34.000000"));
        assert_eq!(doc.attr(image, ns.inset_export_id()), Some("ring"));
        assert_eq!(doc.attr(image, ns.inset_visible_layers()), Some("base blind1"));
        assert_eq!(doc.attr(image, Name::plain("preserveAspectRatio")), Some("xMidYMid"));
        assert_eq!(doc.style_property(image, "image-rendering").as_deref(), Some("optimizeQuality"));
        let href = doc.attr(image, ns.xlink("href")).unwrap();
        assert!(href.starts_with("data:image/png;base64,iVBOR"));
        assert_eq!(fake.seen.borrow()[0].0, "ring");
    }

    #[test]
    fn centers_on_page_without_namedview() {
        let mut doc = Document::parse(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100"><rect id="r" width="1" height="1"/></svg>"#,
        )
        .unwrap();
        let ns = Namespaces::default();
        let r = doc.elements_by_id("r")[0];
        let image = create_inset(&mut doc, &ns, &[r], &InsetOptions::default(), &FakeRasterizer::new(36, 18)).unwrap();
        assert_eq!(doc.attr(image, Name::plain("x")), Some("88.000000"));
        assert_eq!(doc.attr(image, Name::plain("y")), Some("44.000000"));
    }

    #[test]
    fn recreate_uses_recorded_layers_and_restores_styles() {
        let (mut doc, ns) = setup();
        let ring = doc.elements_by_id("ring")[0];
        let image = create_inset(&mut doc, &ns, &[ring], &InsetOptions::default(), &FakeRasterizer::new(36, 18)).unwrap();
        doc.set_attr(image, ns.inset_visible_layers(), "blind2");
        let before = doc.to_xml_string();

        let fake = FakeRasterizer::new(72, 36);
        let again = create_inset(&mut doc, &ns, &[image], &InsetOptions::default(), &fake).unwrap();
        assert_eq!(again, image);

        let (export_id, rendered) = fake.seen.borrow()[0].clone();
        assert_eq!(export_id, "ring");
        let rendered = Document::parse(&rendered).unwrap();
        let hidden = |id: &str| rendered.is_display_none(rendered.elements_by_id(id)[0]);
        assert!(hidden("base"));
        assert!(hidden("blind1"));
        assert!(!hidden("blind2"));

        // Styles are back; only the image itself was updated.
        assert!(!doc.is_display_none(doc.elements_by_id("base")[0]));
        assert!(doc.is_display_none(doc.elements_by_id("blind2")[0]));
        assert_eq!(doc.attr(image, Name::plain("width")), Some("48.000000"));
        assert_ne!(doc.to_xml_string(), before);
    }

    #[test]
    fn styles_restored_when_render_fails() {
        let (mut doc, ns) = setup();
        let ring = doc.elements_by_id("ring")[0];
        let image = create_inset(&mut doc, &ns, &[ring], &InsetOptions::default(), &FakeRasterizer::new(4, 4)).unwrap();
        let before = doc.to_xml_string();

        let err = create_inset(&mut doc, &ns, &[image], &InsetOptions::default(), &FailingRasterizer).unwrap_err();
        assert!(matches!(err, InsetError::Render(_)));
        assert_eq!(doc.to_xml_string(), before);
    }

    #[test]
    fn selection_errors() {
        let (mut doc, ns) = setup();
        let fake = FakeRasterizer::new(4, 4);
        let err = create_inset(&mut doc, &ns, &[], &InsetOptions::default(), &fake).unwrap_err();
        assert_eq!(err.to_string(), "You must select exactly one object.");

        let base = doc.elements_by_id("base")[0];
        let ring = doc.elements_by_id("ring")[0];
        assert!(matches!(
            create_inset(&mut doc, &ns, &[base, ring], &InsetOptions::default(), &fake),
            Err(InsetError::SelectionCount)
        ));

        let image = create_inset(&mut doc, &ns, &[ring], &InsetOptions::default(), &fake).unwrap();
        doc.set_attr(image, ns.inset_export_id(), "gone");
        let err = create_inset(&mut doc, &ns, &[image], &InsetOptions::default(), &fake).unwrap_err();
        assert_eq!(err.to_string(), "Can not find export node #gone");
    }

    #[test]
    fn background_parsing() {
        let options = InsetOptions { background: "rgba(255, 0, 0, 0.5)".to_string(), ..InsetOptions::default() };
        let (hex, opacity) = options.background_color().unwrap();
        assert_eq!(hex, "#ff0000");
        assert!((opacity - 0.5).abs() < 0.01);

        let packed = InsetOptions { background: "4278190335".to_string(), ..InsetOptions::default() };
        assert_eq!(packed.background_rgba().unwrap(), [0xff, 0x00, 0x00, 0xff]);

        let bad = InsetOptions { background: "not a color".to_string(), ..InsetOptions::default() };
        assert!(matches!(bad.background_color(), Err(InsetError::Color(_))));
        assert_eq!("resvg".parse::<Renderer>(), Ok(Renderer::Resvg));
        assert!("gimp".parse::<Renderer>().is_err());
    }

    #[test]
    fn data_url_encoding() {
        assert_eq!(data_url(b"hello", "text/plain"), "data:text/plain;base64,aGVsbG8=");
    }

    #[test]
    fn resvg_renders_cropped_png() {
        let (doc, _) = setup();
        let png = ResvgRasterizer.render(&doc, "ring", &InsetOptions::default()).unwrap();
        assert_eq!(png_dimensions(&png).unwrap(), (36, 18));
    }
}
