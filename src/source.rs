//! Decomposition of a document's canonical source URL and resolution of the
//! reference URLs found in its content.

use thiserror::Error;
use url::Url;

/// The source URL could not be parsed as a URL at all. Without a valid base
/// there is nothing to resolve relative links against, so this surfaces to
/// the caller instead of being swallowed.
#[derive(Debug, Error)]
#[error("malformed source url `{url}`: {source}")]
pub struct MalformedSourceUrlError {
    pub url: String,
    #[source]
    pub source: url::ParseError,
}

/// A candidate URL found in document content, classified relative to the
/// document's own location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// A bare `#fragment`. Not a fully-qualified reference; passed through.
    PureHash,
    /// The current file's own name plus a fragment, e.g. `README.md#usage`.
    SameFileHash,
    /// Carries its own scheme and host.
    Absolute,
    /// Anything else; resolved against the source URL.
    Relative,
}

/// Classify a candidate URL against the current file name.
pub fn classify(candidate: &str, file_name: &str) -> UrlKind {
    if candidate.starts_with('#') {
        return UrlKind::PureHash;
    }
    if same_file_fragment(candidate, file_name).is_some() {
        return UrlKind::SameFileHash;
    }
    if Url::parse(candidate).is_ok() {
        return UrlKind::Absolute;
    }
    UrlKind::Relative
}

/// If `candidate` is a reference to `file_name` plus a fragment (with an
/// optional leading `./` or `/`, compared case-insensitively), return the
/// fragment. The file name must sit at the start of the candidate; a path
/// through a subdirectory is an ordinary relative reference.
fn same_file_fragment<'a>(candidate: &'a str, file_name: &str) -> Option<&'a str> {
    if file_name.is_empty() {
        return None;
    }
    // A querystring between the file name and the hash is not recognized
    // here; the host does not serve query strings on document URLs.
    let (path, fragment) = candidate.split_once('#')?;
    let path = path
        .strip_prefix("./")
        .or_else(|| path.strip_prefix('/'))
        .unwrap_or(path);
    path.eq_ignore_ascii_case(file_name).then_some(fragment)
}

/// The decomposed canonical URL of the document being rendered.
///
/// The host's URL shape is `{host}/{organization}/{repository}/blob/{branch}/
/// {file path}`. Segment counts are not validated: a shorter path simply
/// yields empty or absent fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Scheme and authority, with a trailing slash (`https://github.com/`).
    pub host: String,
    pub organization: String,
    pub repository: String,
    pub branch: Option<String>,
    /// Path of the file within the repository, with a leading slash.
    pub file_path: String,
    /// Final path segment.
    pub file_name: String,
    url: Url,
}

impl SourceLocation {
    pub fn parse(source_url: &str) -> Result<Self, MalformedSourceUrlError> {
        let url = Url::parse(source_url).map_err(|source| MalformedSourceUrlError {
            url: source_url.to_string(),
            source,
        })?;

        let segments: Vec<&str> = url.path().split('/').collect();
        let segment = |i: usize| segments.get(i).copied().unwrap_or("");

        let branch = segment(4);
        Ok(Self {
            host: format!("{}/", url.origin().ascii_serialization()),
            organization: segment(1).to_string(),
            repository: segment(2).to_string(),
            branch: (!branch.is_empty()).then(|| branch.to_string()),
            file_path: format!("/{}", segments.get(5..).unwrap_or(&[]).join("/")),
            file_name: segments.last().copied().unwrap_or("").to_string(),
            url,
        })
    }

    /// The full parsed source URL, used as the base for joining.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Resolve a link destination found in document content. Pure hashes
    /// pass through untouched, references to the current file collapse to
    /// their fragment, and everything else is joined against the source URL.
    pub fn resolve_link(&self, candidate: &str) -> String {
        match classify(candidate, &self.file_name) {
            UrlKind::PureHash => candidate.to_string(),
            UrlKind::SameFileHash => {
                let fragment = same_file_fragment(candidate, &self.file_name).unwrap_or("");
                format!("#{fragment}")
            }
            UrlKind::Absolute | UrlKind::Relative => self.join(candidate),
        }
    }

    /// Resolve an image destination. Images carry no same-page hash
    /// semantics, so every candidate gets the fully joined form.
    pub fn resolve_image(&self, candidate: &str) -> String {
        self.join(candidate)
    }

    fn join(&self, candidate: &str) -> String {
        match self.url.join(candidate) {
            Ok(joined) => joined.to_string(),
            // Resolution is total: an unjoinable candidate passes through.
            Err(_) => candidate.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> SourceLocation {
        SourceLocation::parse("https://example.com/org/repo/blob/master/README.md").unwrap()
    }

    #[test]
    fn parse_full_url() {
        let loc = SourceLocation::parse(
            "http://github.com/godaddy/react-markdown-github/blob/master/nested/dir/README.md",
        )
        .unwrap();
        assert_eq!(loc.host, "http://github.com/");
        assert_eq!(loc.organization, "godaddy");
        assert_eq!(loc.repository, "react-markdown-github");
        assert_eq!(loc.branch.as_deref(), Some("master"));
        assert_eq!(loc.file_path, "/nested/dir/README.md");
        assert_eq!(loc.file_name, "README.md");
    }

    #[test]
    fn parse_top_level_file() {
        let loc = location();
        assert_eq!(loc.file_path, "/README.md");
        assert_eq!(loc.file_name, "README.md");
    }

    #[test]
    fn parse_is_permissive_about_short_paths() {
        let loc = SourceLocation::parse("https://example.com/org").unwrap();
        assert_eq!(loc.organization, "org");
        assert_eq!(loc.repository, "");
        assert_eq!(loc.branch, None);
        assert_eq!(loc.file_path, "/");
    }

    #[test]
    fn parse_rejects_non_urls() {
        let err = SourceLocation::parse("not a url").unwrap_err();
        assert!(err.to_string().contains("malformed source url"));
    }

    #[test]
    fn classify_pure_hash() {
        assert_eq!(classify("#foo", "README.md"), UrlKind::PureHash);
    }

    #[test]
    fn classify_same_file() {
        assert_eq!(classify("README.md#foo", "README.md"), UrlKind::SameFileHash);
        assert_eq!(classify("./readme.md#foo", "README.md"), UrlKind::SameFileHash);
        assert_eq!(classify("/README.md#foo", "README.md"), UrlKind::SameFileHash);
    }

    #[test]
    fn classify_other_files_as_relative() {
        assert_eq!(classify("other.md#foo", "README.md"), UrlKind::Relative);
        assert_eq!(classify("docs/README.md#foo", "README.md"), UrlKind::Relative);
        assert_eq!(classify("sub/dir/FILE.md", "README.md"), UrlKind::Relative);
    }

    #[test]
    fn classify_absolute() {
        assert_eq!(
            classify("https://example.com/a.md", "README.md"),
            UrlKind::Absolute
        );
        assert_eq!(classify("mailto:dev@example.com", "README.md"), UrlKind::Absolute);
    }

    #[test]
    fn resolve_pure_hash_verbatim() {
        assert_eq!(location().resolve_link("#section"), "#section");
    }

    #[test]
    fn resolve_same_file_to_fragment() {
        let loc = location();
        assert_eq!(loc.resolve_link("README.md#section"), "#section");
        assert_eq!(loc.resolve_link("./readme.md#section"), "#section");
    }

    #[test]
    fn resolve_relative_against_source() {
        let loc = location();
        assert_eq!(
            loc.resolve_link("sub/dir/FILE.md"),
            "https://example.com/org/repo/blob/master/sub/dir/FILE.md"
        );
        assert_eq!(loc.resolve_link("/top.md"), "https://example.com/top.md");
        assert_eq!(
            loc.resolve_link("../sibling.md"),
            "https://example.com/org/repo/blob/sibling.md"
        );
    }

    #[test]
    fn resolve_absolute_unchanged() {
        assert_eq!(
            location().resolve_link("https://other.io/x.md"),
            "https://other.io/x.md"
        );
    }

    #[test]
    fn resolve_image_always_joins() {
        let loc = location();
        assert_eq!(
            loc.resolve_image("img/shot.png"),
            "https://example.com/org/repo/blob/master/img/shot.png"
        );
        assert_eq!(
            loc.resolve_image("#x"),
            "https://example.com/org/repo/blob/master/README.md#x"
        );
    }

    #[test]
    fn reparse_is_stable() {
        assert_eq!(location(), location());
    }
}
