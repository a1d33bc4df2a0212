mod anchors;
mod links;

use crate::slug::Slugger;
use crate::source::{MalformedSourceUrlError, SourceLocation};
use pulldown_cmark::{HeadingLevel, Options, Parser, html::push_html};
use std::collections::HashMap;

/// Context handed to a caller's link override hook.
pub struct LinkContext<'a> {
    pub location: &'a SourceLocation,
    /// The default resolution of the link's destination.
    pub url: &'a str,
    /// Flattened text of the link's child content.
    pub children: &'a str,
    pub title: Option<&'a str>,
}

/// Context handed to a caller's image override hook.
pub struct ImageContext<'a> {
    pub location: &'a SourceLocation,
    pub url: &'a str,
}

/// Context handed to a custom heading renderer.
pub struct HeadingContext<'a> {
    pub level: u8,
    /// Flattened text of the heading's child content.
    pub text: &'a str,
    /// The unique anchor id produced for this heading.
    pub slug: &'a str,
    /// The heading's children rendered to HTML.
    pub inner_html: &'a str,
}

/// One heading encountered during a render, in document order.
#[derive(Debug, PartialEq, Eq)]
pub struct HeadingRecord {
    pub level: HeadingLevel,
    pub id: String,
    pub text: String,
}

pub type LinkResolver = Box<dyn Fn(&LinkContext) -> Option<String>>;
pub type ImageResolver = Box<dyn Fn(&ImageContext) -> Option<String>>;
pub type HeadingRenderer = Box<dyn Fn(&HeadingContext) -> String>;

pub(crate) type HeadingRenderers = HashMap<u8, HeadingRenderer>;

/// Renders Markdown documents from a known source location: headings come
/// out wrapped in anchor links with unique ids, and link/image destinations
/// are resolved to absolute URLs (subject to the caller's override hooks).
///
/// Each call to [`Renderer::render`] is one complete document pass: the
/// slug state is reset at the start, and the source location is re-derived
/// only when [`Renderer::set_source_url`] actually changes the URL.
pub struct Renderer {
    source_url: String,
    location: SourceLocation,
    slugger: Slugger,
    headings: Vec<HeadingRecord>,
    heading_renderers: HeadingRenderers,
    on_resolve_link: Option<LinkResolver>,
    on_resolve_image: Option<ImageResolver>,
}

impl Renderer {
    pub fn new(source_url: &str) -> Result<Self, MalformedSourceUrlError> {
        Ok(Self {
            location: SourceLocation::parse(source_url)?,
            source_url: source_url.to_string(),
            slugger: Slugger::new(),
            headings: Vec::new(),
            heading_renderers: HashMap::new(),
            on_resolve_link: None,
            on_resolve_image: None,
        })
    }

    /// Change the document's canonical URL. The decomposed location is
    /// cached, so passing the same string again does no work.
    pub fn set_source_url(&mut self, source_url: &str) -> Result<(), MalformedSourceUrlError> {
        if source_url != self.source_url {
            self.location = SourceLocation::parse(source_url)?;
            self.source_url = source_url.to_string();
        }
        Ok(())
    }

    pub fn source_location(&self) -> &SourceLocation {
        &self.location
    }

    /// Install an override for link resolution. Returning `None` or an
    /// empty string falls back to the default resolution.
    pub fn on_resolve_link(&mut self, hook: impl Fn(&LinkContext) -> Option<String> + 'static) {
        self.on_resolve_link = Some(Box::new(hook));
    }

    /// Install an override for image resolution, with the same fallback
    /// behavior as [`Renderer::on_resolve_link`].
    pub fn on_resolve_image(&mut self, hook: impl Fn(&ImageContext) -> Option<String> + 'static) {
        self.on_resolve_image = Some(Box::new(hook));
    }

    /// Replace the default heading output for one level (1..6). Levels
    /// without a custom renderer keep the default anchor-wrapped form.
    pub fn heading_renderer(
        &mut self,
        level: u8,
        renderer: impl Fn(&HeadingContext) -> String + 'static,
    ) {
        self.heading_renderers.insert(level, Box::new(renderer));
    }

    /// The headings produced by the most recent render.
    pub fn headings(&self) -> &[HeadingRecord] {
        &self.headings
    }

    /// Render one Markdown document to an HTML fragment.
    pub fn render(&mut self, source: &str) -> String {
        let mut out = String::new();
        self.render_to(source, &mut out);
        out
    }

    /// Like [`Renderer::render`], but appending to a caller-owned buffer.
    pub fn render_to(&mut self, source: &str, out: &mut String) {
        self.slugger.reset();
        self.headings.clear();

        let mut options = Options::empty();
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);

        // Links resolve before headings are captured, so link destinations
        // inside heading content are already rewritten when a custom
        // heading renderer sees them.
        let iter = Parser::new_ext(source, options);
        let iter = links::ResolveUrls::new(
            iter,
            &self.location,
            self.on_resolve_link.as_ref(),
            self.on_resolve_image.as_ref(),
        );
        let iter = anchors::AnchorHeadings::new(
            iter,
            &mut self.slugger,
            &self.heading_renderers,
            &mut self.headings,
        );
        push_html(out, iter);
    }
}
