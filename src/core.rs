use crate::render::Renderer;
use anyhow::Result;
use crossbeam_channel::bounded;
use serde::Deserialize;
use std::ffi::OsStr;
use std::num::NonZero;
use std::path::{Path, PathBuf};
use std::{fs, io, thread};
use walkdir::WalkDir;

pub struct Context {
    pub src_dir: PathBuf,
    pub config: Config,
    tmpls: minijinja::Environment<'static>,
}

impl Context {
    pub fn new(src_dir: PathBuf, config: Config) -> Self {
        let mut tmpls = minijinja::Environment::new();
        tmpls
            .add_template("page.html", include_str!("../templates/page.html"))
            .expect("embedded template must be valid Jinja code");

        Self {
            src_dir,
            config,
            tmpls,
        }
    }

    /// The canonical URL of a document, derived from the configured
    /// repository URL and branch plus the document's path within the tree.
    fn source_url_for(&self, rel_path: &str) -> Result<String> {
        let Some(repo_url) = &self.config.repo_url else {
            anyhow::bail!("no repo_url configured; set it in _config.toml or pass --repo-url");
        };
        let branch = self.config.branch.as_deref().unwrap_or("main");
        Ok(format!(
            "{}/blob/{}/{}",
            repo_url.trim_end_matches('/'),
            branch,
            rel_path
        ))
    }

    fn rel_path(&self, src_path: &Path) -> String {
        src_path
            .strip_prefix(&self.src_dir)
            .expect("document path must be within source directory")
            .to_string_lossy()
            .into_owned()
    }

    /// Render the HTML page for a document whose source URL is derived from
    /// the configured repository.
    pub fn render_doc<W: io::Write>(&self, src_path: &Path, dest: &mut W) -> Result<()> {
        let source_url = self.source_url_for(&self.rel_path(src_path))?;
        self.render_doc_as(src_path, &source_url, dest)
    }

    /// Render the HTML page for a document with an explicit source URL.
    pub fn render_doc_as<W: io::Write>(
        &self,
        src_path: &Path,
        source_url: &str,
        dest: &mut W,
    ) -> Result<()> {
        let source = fs::read_to_string(src_path)?;
        let mut renderer = Renderer::new(source_url)?;
        let body = renderer.render(&source);

        // The page title is the top-level heading, if the document leads
        // with one.
        let title = if let Some(first_head) = renderer.headings().first()
            && first_head.level as u8 == 1
        {
            Some(first_head.text.clone())
        } else {
            None
        };

        let rel_path = self.rel_path(src_path);
        let file_name = src_path.file_name().expect("no filename").to_string_lossy();

        let tmpl = self.tmpls.get_template("page.html")?;
        tmpl.render_to_write(
            minijinja::context! {
                title => title,
                body => body,
                path => rel_path,
                name => file_name,
                source_url => source_url,
            },
            dest,
        )?;

        Ok(())
    }

    /// Render a single document file to an HTML file.
    ///
    /// Both `src_path` and `dest_path` are complete paths to files, not
    /// relative to our source and destination directory.
    fn render_doc_to_file(&self, src_path: &Path, dest_path: &Path) -> Result<()> {
        let mut out_file = fs::File::create(dest_path)?;
        self.render_doc(src_path, &mut out_file)
    }

    /// Given a path that is within `self.src_dir`, produce a mirrored path
    /// that is at the same place within `dest_dir`.
    ///
    /// Panics if `src` is not within `self.src_dir`.
    fn dest_path(&self, src: &Path, dest_dir: &Path) -> PathBuf {
        let rel_path = src
            .strip_prefix(&self.src_dir)
            .expect("path is within root directory");
        dest_dir.join(rel_path)
    }

    /// Assuming `src` is the path to a Markdown document, return its HTML
    /// destination path.
    ///
    /// Panics if `src` is not a document file within `self.src_dir`.
    fn doc_dest_path(&self, src: &Path, dest_dir: &Path) -> PathBuf {
        assert!(is_doc(src), "must be a document path");
        let mut mirrored = self.dest_path(src, dest_dir);
        mirrored.set_extension("html");
        mirrored
    }

    /// Mirror the whole source tree into a destination directory: documents
    /// are rendered on a worker pool, everything else is linked or copied.
    pub fn render_site(&self, threads: Option<NonZero<usize>>, dest_dir: &Path) -> Result<()> {
        let threads = threads
            .or_else(|| thread::available_parallelism().ok())
            .map_or(1, NonZero::get);
        remove_dir_force(dest_dir)?;

        thread::scope(|s| {
            let (tx, rx) = bounded::<PathBuf>(32);
            for _ in 0..threads {
                let rx = rx.clone();
                s.spawn(move || {
                    while let Ok(src_path) = rx.recv() {
                        let dest_path = self.doc_dest_path(&src_path, dest_dir);
                        if let Err(e) = self.render_doc_to_file(&src_path, &dest_path) {
                            eprintln!("error rendering {}: {}", src_path.display(), e);
                        }
                    }
                });
            }

            for entry in WalkDir::new(&self.src_dir)
                .into_iter()
                .filter_entry(|e| !ignore_filename(e.file_name()))
            {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        eprintln!("directory walk error: {}", e);
                        continue;
                    }
                };
                let src_path = entry.path();
                if entry.file_type().is_dir() {
                    fs::create_dir_all(self.dest_path(src_path, dest_dir))?;
                } else if entry.file_type().is_file() {
                    if is_doc(src_path) {
                        // A send only fails if every worker has panicked.
                        tx.send(src_path.into()).expect("worker pool hung up");
                    } else {
                        hard_link_or_copy(src_path, &self.dest_path(src_path, dest_dir))?;
                    }
                }
            }

            drop(tx);
            Ok(())
        })
    }
}

/// Try to hard-link `from` at `to`, falling back to a copy if the link fails
/// (e.g., the two paths are on different filesystems). This always removes
/// the current file at `to`.
fn hard_link_or_copy(from: &Path, to: &Path) -> std::io::Result<Option<u64>> {
    if to.exists() {
        fs::remove_file(to)?;
    }
    match fs::hard_link(from, to) {
        Ok(_) => Ok(None),
        Err(_) => fs::copy(from, to).map(Some),
    }
}

/// Like `std::fs::remove_dir_all`, but silently succeed if the directory already doesn't exist.
fn remove_dir_force(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
        Ok(()) => Ok(()),
    }
}

/// Should we skip a given file from the rendering process? We skip hidden
/// files (prefixed with .) and ones starting with _, which are special.
pub fn ignore_filename(name: &OsStr) -> bool {
    let bytes = name.as_encoded_bytes();
    (bytes != b"." && bytes.starts_with(b".")) || bytes.starts_with(b"_")
}

/// Does this source filename look like a Markdown document?
fn is_doc(path: &Path) -> bool {
    matches!(path.extension(), Some(e) if e == "md")
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Root URL of the repository the source tree was checked out from,
    /// e.g. `https://github.com/acme/widgets`.
    pub repo_url: Option<String>,
    /// Branch encoded into derived source URLs. Defaults to `main`.
    pub branch: Option<String>,
}

impl Config {
    pub fn load(src_dir: &Path) -> Result<Self> {
        match fs::read_to_string(src_dir.join("_config.toml")) {
            // Silently proceed if the file isn't found, but crash on other errors.
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e)?,
            Ok(s) => Ok(toml::from_str(&s)?),
        }
    }
}
