use asset_resolver::build::{self, BuildContext};
use asset_resolver::config::{self, PipelineConfig};
use asset_resolver::imports::{self, ImportTarget};
use asset_resolver::mode::{MODE_ENV_VAR, ModeContext};
use asset_resolver::resolve::{ResolveError, resolve};
use asset_resolver::rules::RuleTable;
use asset_resolver::source::FsSource;
use asset_resolver::{logging, output, plan};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "asset-resolver")]
#[command(about = "Rule-based transform and output planning for front-end assets")]
#[command(long_about = "\
Rule-based transform and output planning for front-end assets

Every source file is matched against an ordered rule table. The first rule
whose selector accepts the file decides the transform steps; the build mode
decides which conditional steps run and how outputs are named.

Default rules (group \"assets\"):

  template  *.vue                     vue
  script    *.js *.jsx *.ts *.tsx     babel, react-refresh (development)
  style     *.css                     postcss, css, style | extract
  scss      *.scss *.sass             sass, postcss, css, style | extract
  less      *.less                    less, postcss, css, style | extract
  image     *.png *.jpg *.jpeg ...    asset (inlined below 8 KiB)
  font      *.woff *.woff2 *.eot ...  asset-resource

The mode comes from --mode or the ASSET_MODE environment variable and must
be exactly 'development', 'production' or 'none'.

Run 'asset-resolver gen-config' to generate a documented asset-resolver.toml.")]
#[command(version)]
struct Cli {
    /// Build mode (overrides ASSET_MODE)
    #[arg(long, global = true)]
    mode: Option<String>,

    /// Project root; relative paths are resolved against it
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Config file (default: asset-resolver.toml in the project root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the rule and step chain chosen for each path
    Resolve { paths: Vec<String> },
    /// Show where each path's output lands
    Plan { paths: Vec<String> },
    /// Plan the whole project and write the asset manifest
    Build {
        /// Output directory for the manifest
        #[arg(long, default_value = "dist")]
        output: PathBuf,
    },
    /// Resolve an import specifier as seen from a source file
    Import {
        specifier: String,
        /// File containing the import
        #[arg(long)]
        from: PathBuf,
    },
    /// List the rule table for the current mode
    Rules,
    /// Validate mode, config and rule table without planning anything
    Check,
    /// Print a stock asset-resolver.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mode = match &cli.mode {
        Some(signal) => ModeContext::from_signal(Some(signal.as_str()))?,
        None => ModeContext::from_env()?,
    };
    let config = load_config(&cli.source, cli.config.as_deref())?;
    let table = RuleTable::construct(&mode, &config)?;

    match cli.command {
        Command::Resolve { paths } => {
            for path in &paths {
                match resolve(&table, path, &mode) {
                    Ok(pipeline) => output::print_resolved(&pipeline),
                    Err(ResolveError::NoMatch(p)) => println!("{p} (no rule)"),
                }
            }
        }
        Command::Plan { paths } => {
            let source = FsSource::new(&cli.source);
            for path in &paths {
                match resolve(&table, path, &mode) {
                    Ok(pipeline) => {
                        let placement = plan::plan(&pipeline, &mode, &config, &source)?;
                        output::print_placement(path, &placement);
                    }
                    Err(ResolveError::NoMatch(p)) => println!("{p} (no rule)"),
                }
            }
        }
        Command::Build { output: out_dir } => {
            init_thread_pool(&config.processing);
            let ctx = BuildContext {
                mode: &mode,
                config: &config,
                table: &table,
            };
            let out_dir = if out_dir.is_absolute() {
                out_dir
            } else {
                cli.source.join(out_dir)
            };
            let exclude = vec![out_dir.clone(), cli.source.join("node_modules")];

            println!("==> Building {} ({})", cli.source.display(), mode.mode());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_build_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = build::build(&ctx, &cli.source, &exclude, Some(tx));
            printer.join().ok();
            let manifest = result?;
            output::print_build_summary(&manifest);
            let written = build::write_manifest(&manifest, &out_dir, &config)?;
            println!("==> Manifest: {}", written.display());
        }
        Command::Import { specifier, from } => {
            let importer = if from.is_absolute() {
                from
            } else {
                cli.source.join(from)
            };
            match imports::resolve_import(&specifier, &importer, &cli.source, &config.resolve)? {
                ImportTarget::File(path) => println!("{specifier} \u{2192} {}", path.display()),
                ImportTarget::Fallback(pkg) => println!("{specifier} \u{2192} {pkg} (fallback)"),
                ImportTarget::Empty => println!("{specifier} \u{2192} (empty module)"),
                ImportTarget::Package(pkg) => println!("{specifier} \u{2192} {pkg} (package)"),
            }
        }
        Command::Rules => {
            output::print_rules(&table, &mode);
        }
        Command::Check => {
            if cli.mode.is_none() && std::env::var_os(MODE_ENV_VAR).is_none() {
                println!("{MODE_ENV_VAR} not set, using mode 'none'");
            }
            output::print_mode(&mode);
            println!("Rules: {}", table.rules().count());
            println!("==> Configuration is valid");
        }
        Command::GenConfig => unreachable!("handled before mode resolution"),
    }

    Ok(())
}

/// Explicit `--config` must exist; otherwise the project root's file is
/// optional.
fn load_config(root: &Path, explicit: Option<&Path>) -> Result<PipelineConfig, config::ConfigError> {
    match explicit {
        Some(path) => config::load_config_file(path),
        None => config::load_config(root),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
