use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paper_search::api;
use paper_search::config::{find_config_file, load_config, render_config, save_config, Settings};
use paper_search::search::SearchService;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Paper Search - faceted metadata search over versioned paper records
#[derive(Parser, Debug)]
#[command(name = "paper-search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Faceted metadata search over versioned paper records", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP search API
    Serve {
        /// Host to bind to (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides server.port)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run a search and print the result envelope as JSON
    #[command(alias = "s")]
    Search {
        /// Query parameters as key=value, e.g. title=muon size=5
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Fetch one paper by identifier, e.g. 1811.00536v1
    Get {
        /// Paper identifier, optionally version-suffixed
        id: String,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Write the configuration to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn load_settings(cli: &Cli) -> Result<(Settings, Option<PathBuf>)> {
    let path = cli.config.clone().or_else(find_config_file);
    let settings = load_config(path.as_deref()).with_context(|| match &path {
        Some(p) => format!("Failed to load configuration from {}", p.display()),
        None => "Failed to load configuration".to_string(),
    })?;
    Ok((settings, path))
}

fn init_tracing(cli: &Cli, settings: &Settings) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => settings.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let json = settings.logging.is_json();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_search={}", level)),
        ))
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut settings, config_path) = load_settings(&cli)?;
    init_tracing(&cli, &settings);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", settings.server.host, settings.server.port))?;

            let service = Arc::new(SearchService::from_settings(&settings)?);
            let app = api::router(service, settings.auth.clone());
            api::serve(app, addr).await?;
        }

        Some(Commands::Search { params }) => {
            let service = SearchService::from_settings(&settings)?;
            let envelope = service.search_pairs(params).await?;
            print_json(&envelope)?;
        }

        Some(Commands::Get { id }) => {
            let service = SearchService::from_settings(&settings)?;
            let projection = service.get(&id).await?;
            print_json(&projection)?;
        }

        Some(Commands::Config { output }) => match output {
            Some(path) => {
                save_config(&settings, &path)
                    .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
                tracing::info!("Wrote configuration to {}", path.display());
            }
            None => print!("{}", render_config(&settings)?),
        },

        None => {
            eprintln!("No command given. Run with --help for usage.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["paper-search"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert!(cli.config.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["paper-search", "-v"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["paper-search", "-vv"]);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::parse_from(["paper-search", "--verbose"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_quiet_flag() {
        let cli = Cli::parse_from(["paper-search", "-q"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_config_flag() {
        let cli = Cli::parse_from(["paper-search", "--config", "/path/to/config.toml", "config"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
        assert!(matches!(cli.command, Some(Commands::Config { output: None })));
    }

    #[test]
    fn test_cli_config_output() {
        let cli = Cli::parse_from(["paper-search", "config", "-o", "paper-search.toml"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config { output: Some(p) }) if p == PathBuf::from("paper-search.toml")
        ));
    }

    #[test]
    fn test_cli_serve_overrides() {
        let cli = Cli::parse_from(["paper-search", "serve", "--host", "0.0.0.0", "-p", "9000"]);
        match cli.command {
            Some(Commands::Serve { host, port }) => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_search_params() {
        let cli = Cli::parse_from(["paper-search", "search", "title=muon g-2", "size=5"]);
        match cli.command {
            Some(Commands::Search { params }) => {
                assert_eq!(
                    params,
                    vec![
                        ("title".to_string(), "muon g-2".to_string()),
                        ("size".to_string(), "5".to_string()),
                    ]
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_bare_search_param() {
        assert!(Cli::try_parse_from(["paper-search", "search", "muon"]).is_err());
    }

    #[test]
    fn test_cli_get() {
        let cli = Cli::parse_from(["paper-search", "get", "hep-th/9901001v1"]);
        assert!(matches!(cli.command, Some(Commands::Get { id }) if id == "hep-th/9901001v1"));
    }
}
