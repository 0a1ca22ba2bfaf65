use clap::{Parser, Subcommand};
use polysite::render::LAYOUT_FILE;
use polysite::{config, generate, locale, output, plan, render};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Flags for the build command.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Obfuscate scripts and write to the secure output directory
    #[arg(long)]
    secure: bool,

    /// Bypass all change detection and clear the output directory first
    #[arg(long)]
    force: bool,
}

#[derive(Parser)]
#[command(name = "polysite")]
#[command(about = "Incremental multi-locale static site builder")]
#[command(long_about = "\
Incremental multi-locale static site builder

Pages, features, and translations live in one site directory; every page is
rendered once per configured locale, and repeat builds skip everything whose
inputs haven't changed.

Site structure:

  site/
  ├── site.toml                    # Locales, default locale, title, base URL
  ├── pages/                       # Generic page templates
  │   ├── index.tera               # → <locale>/index.html
  │   ├── 404.tera                 # → <locale>/404.html
  │   └── guides/rounding.tera     # → <locale>/guides/rounding/index.html
  ├── features/
  │   └── loan-interest/
  │       ├── feature.toml         # id, link, category + display metadata
  │       ├── index.tera           # → <locale>/loan-interest/index.html
  │       ├── locales/vi.json      # Per-feature translation bundle
  │       └── assets/calc.js       # → assets/loan-interest/calc.js
  ├── includes/                    # Shared partials; layout.tera wraps pages
  ├── locales/                     # base.json + one module per locale
  ├── data/                        # Global template data (*.json)
  ├── assets/                      # Global stylesheets and scripts
  └── robots.txt.tera              # Root artifacts (sw.js.tera, ...)

Change detection is content-hash based: touching one page rebuilds that page
in every locale; touching a shared include, a locale file, or a feature
manifest rebuilds everything that depends on it.")]
#[command(version)]
struct Cli {
    /// Site source directory
    #[arg(long, default_value = "site", global = true)]
    source: PathBuf,

    /// Output directory (defaults to dist, or dist-secure with --secure)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an incremental build
    Build(BuildArgs),
    /// Validate config, manifests, and dictionaries without building
    Check,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => {
            let output_dir = cli.output.clone().unwrap_or_else(|| {
                PathBuf::from(if args.secure { "dist-secure" } else { "dist" })
            });
            let options = generate::BuildOptions {
                source: cli.source.clone(),
                output: output_dir,
                secure: args.secure,
                force: args.force,
            };
            let engine = render::TeraEngine::from_dir(&options.source.join("includes"))?;
            let report = generate::build(&options, &engine)?;
            output::print_build_report(&report);
        }
        Command::Check => {
            let layout = config::SiteLayout::new(&cli.source);
            let site = config::load_site_config(&layout.root)?;
            let features = config::discover_features(&layout.features_dir)?;
            let feature_dirs: Vec<String> =
                features.iter().map(|f| f.dir_name.clone()).collect();

            // Parse every dictionary so broken JSON fails the check.
            for locale_tag in &site.locales {
                let sources = locale::dictionary_sources(
                    &layout.locales_dir,
                    &layout.features_dir,
                    &feature_dirs,
                    locale_tag,
                );
                locale::load_dictionary(&sources)?;
            }

            let pages: usize = plan::source_roots(&layout)
                .iter()
                .map(|root| plan::collect_pages(root).len())
                .sum();

            let summary = output::CheckSummary {
                locales: site.locales.clone(),
                features: features.len(),
                pages,
                has_layout: layout.includes_dir.join(LAYOUT_FILE).is_file(),
            };
            output::print_check_report(&summary);
            println!("Site is valid");
        }
    }

    Ok(())
}
