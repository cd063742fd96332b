//! Markdown to standalone HTML document, the input of the HTML-to-PDF converter.

use std::{borrow::Cow, collections::HashSet};

use ammonia::{Builder as AmmoniaBuilder, UrlRelative};
use askama::Template;
use comrak::{
    Arena, format_html,
    nodes::{AstNode, NodeHtmlBlock, NodeValue},
    options::{ListStyleType, Options},
    parse_document,
};
use syntect::{
    highlighting::ThemeSet,
    html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

use crate::application::render::RenderError;

const BASE_STYLESHEET: &str = include_str!("../../../templates/document.css");
const HIGHLIGHT_THEME: &str = "InspiredGitHub";
const FALLBACK_TITLE: &str = "Document";

#[derive(Template)]
#[template(path = "document.html")]
struct DocumentTemplate<'a> {
    title: &'a str,
    font_family: &'a str,
    stylesheet: &'a str,
    body: &'a str,
}

/// Builds the HTML handed to the converter: GFM Markdown, highlighted code,
/// sanitized markup, embedded stylesheet and a CJK-capable font stack.
pub struct DocumentBuilder {
    options: Options<'static>,
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
    sanitizer: AmmoniaBuilder<'static>,
    stylesheet: String,
    font_family: String,
}

impl DocumentBuilder {
    pub fn new(
        font_family: impl Into<String>,
        extra_stylesheet: Option<&str>,
    ) -> Result<Self, RenderError> {
        let class_style = ClassStyle::SpacedPrefixed { prefix: "syntax-" };
        let themes = ThemeSet::load_defaults();
        let theme = themes.themes.get(HIGHLIGHT_THEME).ok_or_else(|| {
            RenderError::document(format!("highlight theme `{HIGHLIGHT_THEME}` is missing"))
        })?;
        let highlight_css = css_for_theme_with_class_style(theme, class_style)
            .map_err(|err| RenderError::document(format!("highlight stylesheet: {err}")))?;

        let mut stylesheet = String::with_capacity(
            BASE_STYLESHEET.len() + highlight_css.len() + extra_stylesheet.map_or(0, str::len),
        );
        stylesheet.push_str(BASE_STYLESHEET);
        stylesheet.push('\n');
        stylesheet.push_str(&highlight_css);
        if let Some(extra) = extra_stylesheet {
            stylesheet.push('\n');
            stylesheet.push_str(extra);
        }

        Ok(Self {
            options: markdown_options(),
            syntax_set: SyntaxSet::load_defaults_newlines(),
            class_style,
            sanitizer: build_sanitizer(),
            stylesheet,
            font_family: font_family.into(),
        })
    }

    /// Render `markdown` into a complete HTML document.
    pub fn build(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let title = document_title(root);
        self.highlight_code_blocks(root)?;

        let mut html = String::new();
        format_html(root, &self.options, &mut html)
            .map_err(|err| RenderError::document(format!("markdown: {err}")))?;
        let body = self.sanitizer.clean(&html).to_string();

        DocumentTemplate {
            title: title.as_deref().unwrap_or(FALLBACK_TITLE),
            font_family: &self.font_family,
            stylesheet: &self.stylesheet,
            body: &body,
        }
        .render()
        .map_err(|err| RenderError::document(format!("template: {err}")))
    }

    fn highlight_code_blocks<'a>(&self, root: &'a AstNode<'a>) -> Result<(), RenderError> {
        for node in root.descendants() {
            let Some((info, literal)) = extract_code_block(node) else {
                continue;
            };
            let language = info.split_whitespace().next();
            let html = self.highlight(language, &literal)?;
            let mut data = node.data.borrow_mut();
            data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: html,
            });
        }
        Ok(())
    }

    fn highlight(&self, language: Option<&str>, code: &str) -> Result<String, RenderError> {
        let token = language.unwrap_or("text");
        let syntax = find_syntax(&self.syntax_set, token)
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let mut source = code.to_string();
        if !source.ends_with('\n') {
            source.push('\n');
        }

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, self.class_style);
        for line in LinesWithEndings::from(source.as_str()) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|err| {
                    RenderError::document(format!("highlighting `{token}` failed: {err}"))
                })?;
        }

        let language_class = ammonia::clean_text(&token.to_ascii_lowercase());
        Ok(format!(
            "<pre class=\"syntax-highlight\"><code class=\"language-{language_class}\">{}</code></pre>",
            generator.finalize()
        ))
    }
}

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.tagfilter = false;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = true;
    ext.footnotes = true;
    ext.description_lists = true;
    ext.front_matter_delimiter = Some("---".to_string());
    ext.underline = true;
    ext.subscript = true;
    ext.cjk_friendly_emphasis = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.tasklist_classes = true;
    render.list_style = ListStyleType::Dash;
    render.r#unsafe = true;

    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "abbr",
        "blockquote",
        "br",
        "code",
        "dd",
        "del",
        "div",
        "dl",
        "dt",
        "em",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "i",
        "img",
        "input",
        "ins",
        "kbd",
        "li",
        "mark",
        "ol",
        "p",
        "pre",
        "s",
        "section",
        "span",
        "strong",
        "sub",
        "sup",
        "table",
        "tbody",
        "td",
        "th",
        "thead",
        "tr",
        "u",
        "ul",
    ]);
    builder.tags(tags);

    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "id",
        "title",
        "lang",
        "dir",
        "style",
        "data-footnote-ref",
        "data-footnotes",
        "data-footnote-backref",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes("img", &["title", "width", "height", "alt"]);
    builder.add_tag_attributes("th", &["align", "colspan", "rowspan", "scope"]);
    builder.add_tag_attributes("td", &["align", "colspan", "rowspan"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_url_schemes(["http", "https", "mailto", "tel", "data"].iter().copied());
    // Relative URLs would resolve against the converter's scratch directory.
    builder.url_relative(UrlRelative::Deny);

    builder.attribute_filter(|element, attribute, value| {
        if attribute.eq_ignore_ascii_case("style") {
            sanitize_style_attribute(value).map(Cow::Owned)
        } else if element == "img" && attribute.eq_ignore_ascii_case("src") {
            // The converter fetches image sources; only inline data is allowed.
            is_inline_image(value).then_some(Cow::Borrowed(value))
        } else {
            Some(Cow::Borrowed(value))
        }
    });

    builder
}

/// Text of the first level-1 heading, if the document has one.
fn document_title<'a>(root: &'a AstNode<'a>) -> Option<String> {
    let heading = root.descendants().find(|node| heading_level(node) == Some(1))?;
    let text = collect_inline_text(heading);
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!normalized.is_empty()).then_some(normalized)
}

fn heading_level(node: &AstNode<'_>) -> Option<u8> {
    let data = node.data.borrow();
    if let NodeValue::Heading(heading) = &data.value {
        Some(heading.level)
    } else {
        None
    }
}

fn collect_inline_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for descendant in node.descendants() {
        let data = descendant.data.borrow();
        match &data.value {
            NodeValue::Text(value) => text.push_str(value),
            NodeValue::Code(code) => text.push_str(&code.literal),
            NodeValue::LineBreak | NodeValue::SoftBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        Some((block.info.trim().to_string(), block.literal.clone()))
    } else {
        None
    }
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(&lowercase))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}

fn is_inline_image(src: &str) -> bool {
    src.trim_start()
        .get(..11)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:image/"))
}

fn sanitize_style_attribute(value: &str) -> Option<String> {
    let sanitized: Vec<&str> = value
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty() && is_safe_style_declaration(decl))
        .collect();

    (!sanitized.is_empty()).then(|| sanitized.join("; "))
}

fn is_safe_style_declaration(decl: &str) -> bool {
    const FORBIDDEN_SUBSTRINGS: [&str; 8] = [
        "expression(",
        "javascript:",
        "vbscript:",
        "-moz-binding",
        "behavior:",
        "behaviour:",
        "@import",
        "url(",
    ];

    let lower = decl.to_ascii_lowercase();
    !FORBIDDEN_SUBSTRINGS
        .iter()
        .any(|needle| lower.contains(needle))
}
