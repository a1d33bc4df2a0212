use anyhow::Result;
use argh::FromArgs;
use hubdown::core::{Config, Context};
use hubdown::render::Renderer;
use std::io::Write;
use std::num::NonZero;
use std::path::{Path, PathBuf};
use std::{fs, io};

#[derive(FromArgs)]
/// Render code-host Markdown to HTML: headings get stable anchor ids and
/// relative links resolve against the document's source URL.
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Render(RenderCmd),
    Site(SiteCmd),
}

#[derive(FromArgs)]
/// render a single Markdown document
#[argh(subcommand, name = "render")]
struct RenderCmd {
    /// path to the Markdown file
    #[argh(positional)]
    file: PathBuf,

    /// canonical URL of the document on its host
    #[argh(option)]
    source_url: String,

    /// write output here instead of stdout
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// emit only the rendered body, without the page template
    #[argh(switch)]
    bare: bool,
}

#[derive(FromArgs)]
/// mirror a directory tree of Markdown documents to HTML
#[argh(subcommand, name = "site")]
struct SiteCmd {
    /// source directory
    #[argh(positional)]
    src: PathBuf,

    /// destination directory (default: _site)
    #[argh(option, short = 'o')]
    out: Option<PathBuf>,

    /// repository URL; overrides _config.toml
    #[argh(option)]
    repo_url: Option<String>,

    /// branch for derived source URLs; overrides _config.toml
    #[argh(option)]
    branch: Option<String>,

    /// worker threads for rendering
    #[argh(option)]
    threads: Option<usize>,
}

fn render_one(cmd: RenderCmd) -> Result<()> {
    let mut out: Box<dyn Write> = match &cmd.output {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };

    if cmd.bare {
        let source = fs::read_to_string(&cmd.file)?;
        let mut renderer = Renderer::new(&cmd.source_url)?;
        out.write_all(renderer.render(&source).as_bytes())?;
    } else {
        let src_dir = cmd.file.parent().unwrap_or(Path::new(".")).to_path_buf();
        let ctx = Context::new(src_dir, Config::default());
        ctx.render_doc_as(&cmd.file, &cmd.source_url, &mut out)?;
    }
    Ok(())
}

fn render_site(cmd: SiteCmd) -> Result<()> {
    let mut config = Config::load(&cmd.src)?;
    if cmd.repo_url.is_some() {
        config.repo_url = cmd.repo_url;
    }
    if cmd.branch.is_some() {
        config.branch = cmd.branch;
    }

    let dest_dir = cmd.out.unwrap_or_else(|| PathBuf::from("_site"));
    let ctx = Context::new(cmd.src, config);
    ctx.render_site(cmd.threads.and_then(NonZero::new), &dest_dir)
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    match args.command {
        Command::Render(cmd) => render_one(cmd),
        Command::Site(cmd) => render_site(cmd),
    }
}
