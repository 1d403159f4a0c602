use std::fmt;

use gateway::config::{parse_base_url, parse_timeout_secs};
use gateway::{ConfigError, GatewayConfig, Gateways};
use services::{ExamLoopService, WallClock};
use tracing_subscriber::EnvFilter;

mod runner;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidValue {
        flag: &'static str,
        source: ConfigError,
    },
    InvalidEnv(ConfigError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, source } => write!(f, "invalid {flag} value: {source}"),
            ArgsError::InvalidEnv(source) => write!(f, "invalid environment: {source}"),
        }
    }
}

impl std::error::Error for ArgsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArgsError::InvalidValue { source, .. } | ArgsError::InvalidEnv(source) => Some(source),
            _ => None,
        }
    }
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Health,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "health" => Some(Self::Health),
            _ => None,
        }
    }
}

struct Args {
    gateway: GatewayConfig,
    exam_code: Option<String>,
    student: Option<String>,
    json: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut gateway = GatewayConfig::from_env().map_err(ArgsError::InvalidEnv)?;
        let mut exam_code = std::env::var("EXAM_CODE").ok();
        let mut student = std::env::var("EXAM_STUDENT").ok();
        let mut json = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--base-url" => {
                    let value = require_value(args, "--base-url")?;
                    let url = parse_base_url(&value).map_err(|source| ArgsError::InvalidValue {
                        flag: "--base-url",
                        source,
                    })?;
                    gateway = gateway.with_base_url(url);
                }
                "--timeout-secs" => {
                    let value = require_value(args, "--timeout-secs")?;
                    let timeout =
                        parse_timeout_secs(&value).map_err(|source| ArgsError::InvalidValue {
                            flag: "--timeout-secs",
                            source,
                        })?;
                    gateway = gateway.with_timeout(timeout);
                }
                "--exam-code" => exam_code = Some(require_value(args, "--exam-code")?),
                "--student" => student = Some(require_value(args, "--student")?),
                "--json" => json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            gateway,
            exam_code,
            student,
            json,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  exam take   [--base-url <url>] [--exam-code <code>] [--student <name>] [--json]");
    eprintln!("  exam health [--base-url <url>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --timeout-secs <n>  request timeout for the grading service");
    eprintln!("  --json              print the final result as JSON");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_API_BASE_URL, EXAM_API_TIMEOUT_SECS, EXAM_CODE, EXAM_STUDENT, RUST_LOG");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: take an exam when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Take,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Take,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    tracing::debug!(base_url = %parsed.gateway.base_url, "using grading service");
    let gateways = Gateways::http(parsed.gateway)?;
    let service = ExamLoopService::from_gateways(WallClock::system(), gateways);

    match cmd {
        Command::Health => {
            service.check_backend().await?;
            println!("grading service is up");
            Ok(())
        }
        Command::Take => {
            let options = runner::RunOptions {
                exam_code: parsed.exam_code,
                student: parsed.student,
                json: parsed.json,
            };
            runner::run(&service, options).await
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
