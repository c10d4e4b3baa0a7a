use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use mc_translator_core::{
    is_archive_file, EndpointConfig, GameOptions, HttpEndpoint, JobKind, JobRequest, JobRunner,
    JobSettings, ModOptions, ModVariant, ProgressEvent,
};

/// Translates Minecraft mod and game language files into Simplified Chinese
/// through a language-model completion endpoint.
#[derive(Parser, Debug)]
#[command(name = "mc-translator", version)]
#[command(about = "Translate Minecraft language files with a language model")]
struct Cli {
    /// Configuration file (default: ~/.minecraft_translator/config.json)
    #[arg(long, global = true, env = "MC_TRANSLATOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    endpoint: EndpointArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the stored endpoint configuration.
#[derive(Args, Debug)]
struct EndpointArgs {
    /// Completion endpoint URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Port used when the URL names none
    #[arg(long, global = true)]
    api_port: Option<String>,

    /// Model identifier sent with every request
    #[arg(long, global = true)]
    model: Option<String>,

    /// Bearer token; enables key use when given
    #[arg(long, global = true, env = "MC_TRANSLATOR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Source lines per request
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

impl EndpointArgs {
    fn apply(&self, config: &mut EndpointConfig) {
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(port) = &self.api_port {
            config.api_port = port.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(key) = &self.api_key {
            config.api_key = key.clone();
            config.use_api_key = true;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = timeout;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a mod archive; writes `<name>_汉化版_<timestamp>.jar` beside it
    Mod(ModArgs),

    /// Build a resource pack from a game-version directory
    Game(GameArgs),

    /// Send a short probe prompt to the configured endpoint
    TestConnection,

    /// Show the effective configuration
    Config {
        /// Write the effective configuration back to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug)]
struct ModArgs {
    /// Mod archive (.jar or .zip)
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Loader layout (fabric, forge, neoforge); detected when omitted
    #[arg(long)]
    variant: Option<ModVariant>,

    /// Leave `.desc` entries untranslated
    #[arg(long)]
    skip_desc: bool,

    /// Leave `.tooltip` entries untranslated
    #[arg(long)]
    skip_tooltip: bool,

    /// Leave `.gui` entries untranslated
    #[arg(long)]
    skip_gui: bool,

    /// Where to create the temporary working directory
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GameArgs {
    /// Version directory containing `assets/` or the version jar
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,

    #[arg(long)]
    skip_items: bool,

    #[arg(long)]
    skip_entities: bool,

    #[arg(long)]
    skip_advancements: bool,

    /// Leave entries outside the item, entity and advancement groups untranslated
    #[arg(long)]
    skip_misc: bool,

    /// Where to create the temporary working directory
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => EndpointConfig::default_path()?,
    };
    let mut config = EndpointConfig::load_or_create(&config_path);
    cli.endpoint.apply(&mut config);

    match cli.command {
        Commands::Mod(args) => {
            if !is_archive_file(&args.archive) {
                warn!(
                    "{} is not a .jar or .zip file; trying to read it as a zip anyway",
                    args.archive.display()
                );
            }
            let kind = JobKind::Mod {
                archive: args.archive,
                variant: args.variant,
                options: ModOptions {
                    translate_desc: !args.skip_desc,
                    translate_tooltip: !args.skip_tooltip,
                    translate_gui: !args.skip_gui,
                },
            };
            run_job(&config, kind, args.work_dir).await
        }
        Commands::Game(args) => {
            let kind = JobKind::GameVersion {
                directory: args.directory,
                options: GameOptions {
                    translate_items: !args.skip_items,
                    translate_entities: !args.skip_entities,
                    translate_advancements: !args.skip_advancements,
                    translate_misc: !args.skip_misc,
                },
            };
            run_job(&config, kind, args.work_dir).await
        }
        Commands::TestConnection => {
            config.validate().context("invalid endpoint configuration")?;
            let endpoint = HttpEndpoint::from_config(&config)?;
            endpoint
                .test_connection()
                .await
                .with_context(|| format!("connection test against {} failed", endpoint.url()))?;
            println!("connected to {} (model {})", endpoint.url(), config.model);
            Ok(())
        }
        Commands::Config { save } => {
            print_config(&config_path, &config);
            if save {
                config.validate().context("refusing to save an invalid configuration")?;
                config
                    .to_json_file(&config_path)
                    .with_context(|| format!("failed to write {}", config_path.display()))?;
                println!("saved to {}", config_path.display());
            }
            Ok(())
        }
    }
}

async fn run_job(config: &EndpointConfig, kind: JobKind, work_dir: Option<PathBuf>) -> Result<()> {
    config.validate().context("invalid endpoint configuration")?;
    let endpoint = HttpEndpoint::from_config(config)?;
    info!("using model {} at {}", config.model, endpoint.url());

    let runner = JobRunner::new(Arc::new(endpoint), Arc::new(print_progress));
    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; stopping before the next batch");
            cancel.cancel();
        }
    });

    let settings = JobSettings {
        batch_size: config.batch_size,
        work_root: work_dir,
        ..JobSettings::default()
    };
    let output = runner.run(JobRequest { kind, settings }).await?;
    println!("{}", output.display());
    Ok(())
}

fn print_progress(event: ProgressEvent) {
    match (event.percent, event.message) {
        (Some(percent), Some(message)) => eprintln!("[{percent:>5.1}%] {message}"),
        (Some(percent), None) => eprintln!("[{percent:>5.1}%]"),
        (None, Some(message)) => eprintln!("         {message}"),
        (None, None) => {}
    }
}

fn print_config(path: &std::path::Path, config: &EndpointConfig) {
    let key = if config.api_key.trim().is_empty() {
        "(none)"
    } else {
        "(set)"
    };
    println!("config file:  {}", path.display());
    println!("api_url:      {}", config.api_url);
    println!("api_port:     {}", config.api_port);
    println!("resolved url: {}", config.resolved_api_url());
    println!("model:        {}", config.model);
    println!("api_key:      {key}");
    println!("use_api_key:  {}", config.use_api_key);
    println!("timeout_secs: {}", config.timeout_secs);
    println!("batch_size:   {}", config.batch_size);
}
