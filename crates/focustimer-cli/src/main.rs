use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use focustimer_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focustimer-cli", version, about = "Focus Timer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Daily focus totals
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let loaded = Config::load();
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };
    init_logging(&config);
    if let Err(err) = &loaded {
        tracing::warn!(error = %err, "using default configuration");
    }

    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action, &config).await,
        Commands::Stats { action } => commands::stats::run(action, &config),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
