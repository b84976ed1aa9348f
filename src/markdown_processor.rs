/*!
 * Markdown document handling and segment extraction.
 *
 * This module wraps the pulldown-cmark event stream in a small document type
 * that supports the three operations the translation pipeline needs:
 * enumerating translatable text leaves in document order, writing translated
 * text back into a specific leaf, and serializing the tree back to markdown.
 *
 * Structural regions are never descended into: fenced and indented code
 * blocks, inline code, raw HTML (block and inline), YAML/TOML frontmatter,
 * and math. Fenced blocks declared as markdown can optionally be re-entered
 * by the engine as independent documents.
 */

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::ops::Range;

use crate::errors::TranslationError;

/// One unit of translatable text with a stable positional id.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Index into the extracted ordered list; stable across batching
    pub id: usize,
    /// The source text of the leaf node
    pub text: String,
    /// Position of the backing event inside the document
    event_index: usize,
}

/// A fenced code block whose content should be translated as markdown.
#[derive(Debug, Clone)]
pub struct CodeBlockSlot {
    /// Events holding the block's text content
    text_range: Range<usize>,
    /// The block content, concatenated
    pub content: String,
}

/// Parser options used for every document and for the markdown heuristic.
fn parse_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_MATH
        | Options::ENABLE_GFM
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
        | Options::ENABLE_PLUSES_DELIMITED_METADATA_BLOCKS
}

/// A parsed markdown document that supports in-place text mutation.
pub struct MarkdownDocument<'a> {
    events: Vec<Event<'a>>,
}

impl<'a> MarkdownDocument<'a> {
    /// Parse a markdown source into an event tree.
    pub fn parse(source: &'a str) -> Self {
        let events = Parser::new_ext(source, parse_options()).collect();
        Self { events }
    }

    /// Collect the ordered list of translatable segments.
    ///
    /// Walks the event stream in document order, skipping the subtrees of
    /// structural regions entirely; every text leaf outside those regions
    /// yields one segment.
    pub fn collect_segments(&self) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut skip_depth = 0usize;

        for (event_index, event) in self.events.iter().enumerate() {
            match event {
                Event::Start(Tag::CodeBlock(_) | Tag::HtmlBlock | Tag::MetadataBlock(_)) => {
                    skip_depth += 1;
                }
                Event::End(TagEnd::CodeBlock | TagEnd::HtmlBlock | TagEnd::MetadataBlock(_)) => {
                    skip_depth = skip_depth.saturating_sub(1);
                }
                Event::Text(text) if skip_depth == 0 => {
                    segments.push(Segment {
                        id: segments.len(),
                        text: text.to_string(),
                        event_index,
                    });
                }
                // Inline code, raw markup and math are leaves; nothing to descend
                Event::Code(_)
                | Event::Html(_)
                | Event::InlineHtml(_)
                | Event::InlineMath(_)
                | Event::DisplayMath(_) => {}
                _ => {}
            }
        }

        segments
    }

    /// Write a translated value back into the leaf a segment was taken from.
    pub fn set_segment_text(&mut self, segment: &Segment, value: String) {
        self.events[segment.event_index] = Event::Text(CowStr::from(value));
    }

    /// Find fenced code blocks whose content should itself be translated as
    /// markdown: blocks tagged `markdown`/`md`, or untagged blocks whose
    /// content heuristically parses as markdown. Blocks with any other
    /// explicit language tag are never returned.
    pub fn markdown_code_blocks(&self) -> Vec<CodeBlockSlot> {
        let mut slots = Vec::new();
        let mut i = 0;

        while i < self.events.len() {
            let Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) = &self.events[i] else {
                i += 1;
                continue;
            };
            let lang = info.split_whitespace().next().unwrap_or("");

            let start = i + 1;
            let mut end = start;
            let mut content = String::new();
            while end < self.events.len() {
                match &self.events[end] {
                    Event::End(TagEnd::CodeBlock) => break,
                    Event::Text(text) => {
                        content.push_str(text);
                        end += 1;
                    }
                    _ => end += 1,
                }
            }

            let translatable = match lang {
                "markdown" | "md" => true,
                "" => looks_like_markdown(&content),
                _ => false,
            };
            if translatable && !content.trim().is_empty() {
                slots.push(CodeBlockSlot {
                    text_range: start..end,
                    content,
                });
            }

            i = end + 1;
        }

        slots
    }

    /// Replace the content of a fenced code block with a translated version.
    ///
    /// Slots must be applied in reverse document order, since replacing a
    /// range shifts the positions of everything after it.
    pub fn replace_code_block_content(&mut self, slot: &CodeBlockSlot, new_content: String) {
        self.events.splice(
            slot.text_range.clone(),
            std::iter::once(Event::Text(CowStr::from(new_content))),
        );
    }

    /// Serialize the (possibly mutated) event tree back to markdown.
    pub fn render(&self) -> Result<String, TranslationError> {
        let mut output = String::new();
        let options = pulldown_cmark_to_cmark::Options {
            code_block_token_count: 3,
            ..Default::default()
        };
        pulldown_cmark_to_cmark::cmark_with_options(self.events.iter(), &mut output, options)
            .map_err(|e| TranslationError::Render(e.to_string()))?;
        if !output.ends_with('\n') {
            output.push('\n');
        }
        Ok(output)
    }
}

/// Heuristic check for whether untagged fence content is markdown prose.
///
/// True when the content contains at least one block construct (heading,
/// list, blockquote, rule, table, nested fence, raw markup) or an inline
/// construct inside a paragraph (link, image, emphasis, strikethrough, hard
/// break). Plain sentences parse as a bare paragraph and do not qualify.
pub fn looks_like_markdown(content: &str) -> bool {
    let parser = Parser::new_ext(content, parse_options());
    let mut paragraph_depth = 0usize;

    for event in parser {
        match event {
            Event::Start(Tag::Paragraph) => paragraph_depth += 1,
            Event::End(TagEnd::Paragraph) => paragraph_depth = paragraph_depth.saturating_sub(1),
            Event::Start(
                Tag::Heading { .. }
                | Tag::List(_)
                | Tag::BlockQuote(_)
                | Tag::Table(_)
                | Tag::CodeBlock(CodeBlockKind::Fenced(_))
                | Tag::HtmlBlock,
            ) => return true,
            Event::Rule => return true,
            Event::Html(_) => return true,
            Event::Start(
                Tag::Link { .. } | Tag::Image { .. } | Tag::Emphasis | Tag::Strong | Tag::Strikethrough,
            ) if paragraph_depth > 0 => return true,
            Event::HardBreak if paragraph_depth > 0 => return true,
            _ => {}
        }
    }

    false
}

/// Match the trailing-newline presence of a re-serialized block to its
/// original content, repairing any newline added or removed on the way.
pub fn normalize_trailing_newline(translated: String, original: &str) -> String {
    let keep_newline = original.ends_with('\n');
    let mut output = translated;
    while output.ends_with('\n') {
        output.pop();
    }
    if keep_newline {
        output.push('\n');
    }
    output
}
