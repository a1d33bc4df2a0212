use crate::render::{HeadingContext, HeadingRecord, HeadingRenderers};
use crate::slug::{Inline, Slugger, flatten};
use pulldown_cmark::{CowStr, Event, HeadingLevel, Tag, TagEnd, html::push_html};
use std::collections::VecDeque;

/// A pulldown-cmark adapter that gives every heading a unique anchor id and
/// wraps its content in a link pointing at that id. A heading that already
/// carries an explicit id keeps it and bypasses the slugger. Levels with a
/// custom renderer installed are emitted as a single raw-HTML event instead.
pub struct AnchorHeadings<'a, 'r, I>
where
    I: Iterator<Item = Event<'a>>,
{
    iter: I,
    buffer: VecDeque<Event<'a>>,
    slugger: &'r mut Slugger,
    renderers: &'r HeadingRenderers,
    headings: &'r mut Vec<HeadingRecord>,
}

impl<'a, 'r, I> AnchorHeadings<'a, 'r, I>
where
    I: Iterator<Item = Event<'a>>,
{
    pub fn new(
        iter: I,
        slugger: &'r mut Slugger,
        renderers: &'r HeadingRenderers,
        headings: &'r mut Vec<HeadingRecord>,
    ) -> Self {
        Self {
            iter,
            buffer: VecDeque::new(),
            slugger,
            renderers,
            headings,
        }
    }

    /// Assuming that `self` is now just after the start of a heading, drain
    /// the heading's inline events and emit the rewritten heading. Returns
    /// the event to yield first; the rest is left in `self.buffer`.
    fn rewrite_heading(
        &mut self,
        level: HeadingLevel,
        id: Option<CowStr<'a>>,
        classes: Vec<CowStr<'a>>,
        attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
    ) -> Event<'a> {
        let mut children = Vec::new();
        for event in self.iter.by_ref() {
            if matches!(event, Event::End(TagEnd::Heading(_))) {
                break;
            }
            children.push(event);
        }

        let text = flatten(&inline_tree(&children));
        let slug = match id {
            Some(explicit) => explicit.to_string(),
            None => self.slugger.slug(&text),
        };
        self.headings.push(HeadingRecord {
            level,
            id: slug.clone(),
            text: text.clone(),
        });

        if let Some(renderer) = self.renderers.get(&(level as u8)) {
            let mut inner_html = String::new();
            push_html(&mut inner_html, children.into_iter());
            let html = renderer(&HeadingContext {
                level: level as u8,
                text: &text,
                slug: &slug,
                inner_html: &inner_html,
            });
            return Event::Html(html.into());
        }

        self.buffer
            .push_back(Event::InlineHtml(format!("<a href=\"#{slug}\">").into()));
        self.buffer.extend(children);
        self.buffer.push_back(Event::InlineHtml("</a>".into()));
        self.buffer.push_back(Event::End(TagEnd::Heading(level)));
        Event::Start(Tag::Heading {
            level,
            id: Some(slug.into()),
            classes,
            attrs,
        })
    }
}

impl<'a, 'r, I> Iterator for AnchorHeadings<'a, 'r, I>
where
    I: Iterator<Item = Event<'a>>,
{
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // Unbuffer the next buffered event, if any.
        if let Some(event) = self.buffer.pop_front() {
            return Some(event);
        }

        match self.iter.next()? {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => Some(self.rewrite_heading(level, id, classes, attrs)),
            event => Some(event),
        }
    }
}

/// Rebuild the nested inline structure of a heading's events: text and code
/// spans are leaves, formatting tags become groups. Events that carry no
/// text (breaks, raw HTML) contribute nothing.
fn inline_tree<'a>(events: &[Event<'a>]) -> Vec<Inline> {
    let mut stack: Vec<Vec<Inline>> = vec![Vec::new()];
    for event in events {
        match event {
            Event::Start(_) => stack.push(Vec::new()),
            Event::End(_) => {
                if stack.len() > 1 {
                    let group = stack.pop().unwrap_or_default();
                    if let Some(parent) = stack.last_mut() {
                        parent.push(Inline::Group(group));
                    }
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(top) = stack.last_mut() {
                    top.push(Inline::Text(text.to_string()));
                }
            }
            _ => (),
        }
    }
    while stack.len() > 1 {
        let group = stack.pop().unwrap_or_default();
        if let Some(parent) = stack.last_mut() {
            parent.push(Inline::Group(group));
        }
    }
    stack.pop().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulldown_cmark::{Options, Parser};
    use std::collections::HashMap;

    fn render_anchored(source: &str) -> String {
        let mut slugger = Slugger::new();
        let renderers = HashMap::new();
        let mut headings = Vec::new();
        let parser = Parser::new_ext(source, Options::ENABLE_HEADING_ATTRIBUTES);

        let mut buf = String::new();
        push_html(
            &mut buf,
            AnchorHeadings::new(parser, &mut slugger, &renderers, &mut headings),
        );
        buf
    }

    #[test]
    fn non_heading() {
        assert_eq!(render_anchored("*hi*"), "<p><em>hi</em></p>\n");
    }

    #[test]
    fn simple_heading() {
        assert_eq!(
            render_anchored("# hi"),
            "<h1 id=\"hi\"><a href=\"#hi\">hi</a></h1>\n"
        );
    }

    #[test]
    fn explicit_id_kept() {
        assert_eq!(
            render_anchored("# hi {#x}"),
            "<h1 id=\"x\"><a href=\"#x\">hi</a></h1>\n"
        );
    }

    #[test]
    fn styled_heading() {
        assert_eq!(
            render_anchored("# *hi*"),
            "<h1 id=\"hi\"><a href=\"#hi\"><em>hi</em></a></h1>\n"
        );
    }

    #[test]
    fn code_span_counts_as_text() {
        assert_eq!(
            render_anchored("# `np` arrays"),
            "<h1 id=\"np-arrays\"><a href=\"#np-arrays\"><code>np</code> arrays</a></h1>\n"
        );
    }

    #[test]
    fn adjacent_inlines_concatenate() {
        assert_eq!(
            render_anchored("# *a*b"),
            "<h1 id=\"ab\"><a href=\"#ab\"><em>a</em>b</a></h1>\n"
        );
    }

    #[test]
    fn duplicates_suffixed() {
        assert_eq!(
            render_anchored("# hi\n# hi"),
            "<h1 id=\"hi\"><a href=\"#hi\">hi</a></h1>\n\
             <h1 id=\"hi-1\"><a href=\"#hi-1\">hi</a></h1>\n"
        );
    }

    #[test]
    fn punctuation_only_heading() {
        assert_eq!(
            render_anchored("# !!!"),
            "<h1 id=\"\"><a href=\"#\">!!!</a></h1>\n"
        );
    }
}
