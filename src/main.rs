use mongoconnect::config::{load_config, load_default_config};
use mongoconnect::driver::MemoryDriver;
use mongoconnect::{repl, Result, Session, SessionError};
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

const USAGE: &str = "\
Usage: mongoconnect [--config PATH] [--memory] [URI]

  --config PATH  Read settings from PATH instead of the default location
  --memory       Use an in-memory store instead of a MongoDB server
  URI            Connection string (overrides config and MONGODB_URI)";

/// Parsed command line arguments
#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config: Option<PathBuf>,
    memory: bool,
    uri: Option<String>,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| SessionError::Command("--config needs a path".to_string()))?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--memory" => parsed.memory = true,
            "-h" | "--help" => parsed.help = true,
            flag if flag.starts_with("--") => {
                return Err(SessionError::Command(format!("unknown option {flag}")));
            }
            _ if parsed.uri.is_some() => {
                return Err(SessionError::Command("only one URI may be given".to_string()));
            }
            _ => parsed.uri = Some(arg),
        }
    }
    Ok(parsed)
}

fn run() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_default_config()?,
    };
    let mut settings = config.connection_settings();
    if let Ok(uri) = std::env::var("MONGODB_URI") {
        settings.uri = uri;
    }
    if let Some(uri) = args.uri {
        settings.uri = uri;
    }

    let mut session = if args.memory {
        Session::with_driver(settings, MemoryDriver::new())
    } else {
        Session::with_settings(settings)
    };

    if let Err(e) = repl::start_session(&mut session, config.default_database(), config.default_collection()) {
        warn!("Session setup incomplete: {}", e);
        eprintln!("Error: {e}");
        println!("Starting interactive mode anyway; use :connect, :use and :coll.");
    }

    let stdin = io::stdin();
    repl::run_repl(&mut session, stdin.lock(), io::stdout(), io::stderr())?;
    session.close();
    Ok(())
}

fn main() {
    // Logs go to stderr so stdout only carries command output
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    info!("Starting mongoconnect...");

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
