use crate::render::{ImageContext, ImageResolver, LinkContext, LinkResolver};
use crate::source::SourceLocation;
use pulldown_cmark::{CowStr, Event, LinkType, Tag, TagEnd};
use std::collections::VecDeque;

/// A pulldown-cmark adapter that rewrites link and image destinations
/// through the source URL resolver. When the caller installed an override
/// hook, it sees the normalized URL plus the decomposed source context; a
/// non-empty return value replaces the default resolution.
pub struct ResolveUrls<'a, 'r, I>
where
    I: Iterator<Item = Event<'a>>,
{
    iter: I,
    buffer: VecDeque<Event<'a>>,
    location: &'r SourceLocation,
    on_link: Option<&'r LinkResolver>,
    on_image: Option<&'r ImageResolver>,
}

impl<'a, 'r, I> ResolveUrls<'a, 'r, I>
where
    I: Iterator<Item = Event<'a>>,
{
    pub fn new(
        iter: I,
        location: &'r SourceLocation,
        on_link: Option<&'r LinkResolver>,
        on_image: Option<&'r ImageResolver>,
    ) -> Self {
        Self {
            iter,
            buffer: VecDeque::new(),
            location,
            on_link,
            on_image,
        }
    }

    /// Buffer the link's child events so their flattened text can be handed
    /// to the override hook, then emit the link with its resolved
    /// destination. Images nested inside the label are rewritten on the way.
    fn rewrite_link(
        &mut self,
        link_type: LinkType,
        dest_url: CowStr<'a>,
        title: CowStr<'a>,
        id: CowStr<'a>,
    ) -> Event<'a> {
        let mut children = String::new();
        loop {
            let Some(event) = self.iter.next() else {
                break;
            };
            if let Event::End(TagEnd::Link) = event {
                self.buffer.push_back(event);
                break;
            }
            if let Event::Text(text) | Event::Code(text) = &event {
                children.push_str(text);
            }
            let event = self.rewrite_image(event);
            self.buffer.push_back(event);
        }

        let normalized = self.location.resolve_link(&dest_url);
        let resolved = match self.on_link {
            Some(hook) => {
                let context = LinkContext {
                    location: self.location,
                    url: &normalized,
                    children: &children,
                    title: (!title.is_empty()).then_some(&*title),
                };
                match hook(&context) {
                    Some(replacement) if !replacement.is_empty() => replacement,
                    _ => normalized,
                }
            }
            None => normalized,
        };

        Event::Start(Tag::Link {
            link_type,
            dest_url: resolved.into(),
            title,
            id,
        })
    }

    fn rewrite_image(&self, event: Event<'a>) -> Event<'a> {
        match event {
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let normalized = self.location.resolve_image(&dest_url);
                let resolved = match self.on_image {
                    Some(hook) => {
                        let context = ImageContext {
                            location: self.location,
                            url: &normalized,
                        };
                        match hook(&context) {
                            Some(replacement) if !replacement.is_empty() => replacement,
                            _ => normalized,
                        }
                    }
                    None => normalized,
                };
                Event::Start(Tag::Image {
                    link_type,
                    dest_url: resolved.into(),
                    title,
                    id,
                })
            }
            event => event,
        }
    }
}

impl<'a, 'r, I> Iterator for ResolveUrls<'a, 'r, I>
where
    I: Iterator<Item = Event<'a>>,
{
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.buffer.pop_front() {
            return Some(event);
        }

        match self.iter.next()? {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Some(self.rewrite_link(link_type, dest_url, title, id)),
            event => Some(self.rewrite_image(event)),
        }
    }
}
