//! Content parsing: raw markup in, renderable HTML out.
//!
//! The parser is an injected capability of the page service, so deployments
//! that store pre-rendered HTML can swap in the identity implementation.

use comrak::{Options, markdown_to_html};

pub trait Parser: Send + Sync {
    fn parse(&self, raw: &str) -> String;
}

/// Comrak-based Markdown renderer with the GFM-ish extension set on.
pub struct MarkdownParser {
    options: Options<'static>,
}

impl MarkdownParser {
    pub fn new() -> Self {
        let mut options = Options::default();
        let ext = &mut options.extension;
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;
        ext.footnotes = true;
        ext.description_lists = true;

        let render = &mut options.render;
        render.github_pre_lang = true;
        // Page authors are trusted operators; raw HTML passes through.
        render.r#unsafe = true;

        Self { options }
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for MarkdownParser {
    fn parse(&self, raw: &str) -> String {
        markdown_to_html(raw, &self.options)
    }
}

/// Passthrough for content that is already HTML.
pub struct IdentityParser;

impl Parser for IdentityParser {
    fn parse(&self, raw: &str) -> String {
        raw.to_string()
    }
}
