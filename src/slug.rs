//! Heading anchors in the style of a code host's rendered Markdown. The
//! normalization is ASCII-oriented: non-ASCII letters and symbols are
//! dropped rather than transliterated, matching the host's own anchors.

use std::collections::HashMap;

/// Normalize heading text into its base anchor form: lower-cased, trimmed,
/// with everything except ASCII letters, digits, and hyphens removed, and
/// each whitespace run collapsed to a single hyphen.
///
/// `This is NEAT` becomes `this-is-neat`. A pure function; duplicate
/// tracking happens in [`Slugger`].
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut slug = String::new();
    let mut gap = false;
    for ch in lowered.trim().chars() {
        if ch.is_whitespace() {
            gap = true;
        } else if ch.is_ascii_alphanumeric() || ch == '-' {
            if gap {
                slug.push('-');
                gap = false;
            }
            slug.push(ch);
        }
        // Everything else (punctuation, symbols, non-ASCII) is dropped.
    }
    slug
}

/// Inline heading content: either literal text or a formatting container
/// (emphasis, code span, link) holding further inline content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Group(Vec<Inline>),
}

impl Inline {
    /// Append all leaf text under this node, depth-first, left to right,
    /// with no separator between adjacent leaves.
    pub fn extract_text(&self, out: &mut String) {
        match self {
            Inline::Text(text) => out.push_str(text),
            Inline::Group(children) => {
                for child in children {
                    child.extract_text(out);
                }
            }
        }
    }
}

/// Flatten a sequence of inline nodes into their concatenated leaf text.
pub fn flatten(nodes: &[Inline]) -> String {
    let mut text = String::new();
    for node in nodes {
        node.extract_text(&mut text);
    }
    text
}

/// Produces unique anchor ids for one document render pass.
///
/// Stateful: repeated occurrences of the same normalized text get an ordinal
/// suffix (`this-is-neat`, then `this-is-neat-1`, and so on). Call
/// [`Slugger::reset`] at the start of each independent render, never
/// mid-render; the counters are not re-entrant.
#[derive(Debug, Default)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a unique slug for the given heading text.
    pub fn slug(&mut self, text: &str) -> String {
        let base = normalize(text);
        let count = self.seen.entry(base.clone()).or_default();
        let unique = if *count > 0 {
            format!("{base}-{count}")
        } else {
            base.clone()
        };
        *count += 1;
        unique
    }

    /// Generate a unique slug from heading content nodes, flattening their
    /// leaf text first.
    pub fn slug_nodes(&mut self, nodes: &[Inline]) -> String {
        self.slug(&flatten(nodes))
    }

    /// Clear all duplicate-tracking state. Omitting this between documents
    /// makes ids from one document suppress or inflate suffixes in the next.
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple() {
        assert_eq!(normalize("This is NEAT"), "this-is-neat");
    }

    #[test]
    fn punctuation_dropped() {
        assert_eq!(normalize("don't panic!"), "dont-panic");
        assert_eq!(normalize("C++ API"), "c-api");
    }

    #[test]
    fn hyphens_kept() {
        assert_eq!(normalize("re-use"), "re-use");
    }

    #[test]
    fn underscores_dropped() {
        assert_eq!(normalize("snake_case"), "snakecase");
    }

    #[test]
    fn non_ascii_dropped() {
        assert_eq!(normalize("café"), "caf");
        assert_eq!(normalize("日本語"), "");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(normalize("a \t  b"), "a-b");
        assert_eq!(normalize("h ' i"), "h-i");
    }

    #[test]
    fn output_alphabet() {
        let slug = normalize("Héllo, Wörld! — 123_45 ~ ok?");
        assert_eq!(slug, "hllo-wrld-12345-ok");
        assert!(
            slug.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        );
    }

    #[test]
    fn duplicates_get_suffixes() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("this is neat"), "this-is-neat");
        assert_eq!(slugger.slug("this is neat"), "this-is-neat-1");
        assert_eq!(slugger.slug("this is neat"), "this-is-neat-2");
    }

    #[test]
    fn reset_restores_bare_form() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("hi"), "hi");
        assert_eq!(slugger.slug("hi"), "hi-1");
        slugger.reset();
        assert_eq!(slugger.slug("hi"), "hi");
    }

    #[test]
    fn distinct_texts_never_suffixed() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("alpha"), "alpha");
        assert_eq!(slugger.slug("beta"), "beta");
        assert_eq!(slugger.slug("gamma"), "gamma");
    }

    #[test]
    fn empty_slugs_are_tracked_too() {
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug("!!!"), "");
        assert_eq!(slugger.slug("???"), "-1");
    }

    #[test]
    fn node_text_has_no_separators() {
        let nodes = [
            Inline::Text("np".into()),
            Inline::Group(vec![
                Inline::Text(" array".into()),
                Inline::Group(vec![Inline::Text("s".into())]),
            ]),
        ];
        assert_eq!(flatten(&nodes), "np arrays");

        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug_nodes(&nodes), "np-arrays");
    }

    #[test]
    fn adjacent_leaves_concatenate() {
        let nodes = [Inline::Text("a".into()), Inline::Text("b".into())];
        let mut slugger = Slugger::new();
        assert_eq!(slugger.slug_nodes(&nodes), "ab");
    }
}
