use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

mod cache;
mod check;
mod editor;
mod entry;
mod fetch;
mod latex;
mod render;
mod settings;
mod ui;

use crate::cache::FixCache;
use crate::check::CheckOptions;
use crate::editor::EditorFixer;

#[derive(Parser)]
#[command(name = "bibcheck", version)]
#[command(about = "Fetch, validate and repair BibTeX bibliographies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the bibliography for a search query
    Fetch {
        /// Search query, already encoded for the literature API
        #[arg(short, long)]
        query: String,
        /// Override the API base url
        #[arg(long)]
        baseurl: Option<String>,
    },
    /// Compile every entry, repairing failures in your editor
    Check {
        /// Bibliography file to check
        bibtex: PathBuf,
        /// Normalize known unicode offenders before compiling
        #[arg(long)]
        fix_unicode: bool,
        /// Cite with plain bibtex instead of biblatex
        #[arg(long)]
        use_bibtex: bool,
        /// Worker threads; 0 means the configured pool size
        #[arg(long, default_value_t = 1)]
        nthreads: usize,
    },
    /// Compile the whole bibliography into publications.pdf
    Render {
        /// Bibliography file to render
        bibtex: PathBuf,
        /// Document template with an ADD_BIBTEX_HERE placeholder
        #[arg(long)]
        template: Option<PathBuf>,
    },
    /// Inspect or empty the cache of accepted repairs
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Write the configuration file with its current values
    Config,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show how many repairs are stored
    Stats,
    /// Forget every stored repair
    Clear,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = settings::read_config_file()?;
    match cli.command {
        Commands::Fetch { query, baseurl } => {
            let baseurl = baseurl.unwrap_or(config.baseurl);
            let path = fetch::fetch(&baseurl, &query, config.page_size)?;
            crate::blog_done!("Done", "bibliography written in {}", path.display());
            Ok(())
        }
        Commands::Check {
            bibtex,
            fix_unicode,
            use_bibtex,
            nthreads,
        } => {
            let nthreads = if nthreads == 0 {
                config.pool_size
            } else {
                nthreads
            };
            let cache = FixCache::new(settings::cache_path()?)?;
            let fixer = EditorFixer::resolve(config.editor.as_deref())?;
            let options = CheckOptions {
                fix_unicode,
                use_bibtex,
                nthreads,
            };
            check::check(&bibtex, &options, cache, &fixer)
        }
        Commands::Render { bibtex, template } => render::render(&bibtex, template.as_deref()),
        Commands::Cache { action } => {
            let mut cache = FixCache::new(settings::cache_path()?)?;
            match action {
                CacheAction::Stats => {
                    crate::blog!(
                        "Cache",
                        "{} repairs stored in {}",
                        cache.count()?,
                        settings::cache_path()?.display()
                    );
                }
                CacheAction::Clear => {
                    cache.clear()?;
                    crate::blog_done!("Cleared", "all stored repairs forgotten");
                }
            }
            Ok(())
        }
        Commands::Config => {
            settings::save_config_file(&config)?;
            crate::blog_done!(
                "Saved",
                "configuration written in {}",
                settings::config_path()?.display()
            );
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        ui::error_message(&format!("{:#}", err));
        process::exit(1);
    }
}
