use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use proxy_finder::{Config, Criteria, ErrorClass, ProxyError, ProxyFinder, Scheme};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Find working free HTTP/HTTPS proxies
#[derive(Parser)]
#[command(name = "proxy-finder", version)]
#[command(about = "Find, filter and validate free public HTTP/HTTPS proxies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Number of probes raced at once when looking for one proxy
    #[arg(long, global = true)]
    probe_concurrency: Option<usize>,

    /// MMDB country database used for listings without a country
    #[arg(long, global = true)]
    mmdb: Option<String>,

    /// Seed for reproducible random ordering
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Get one working proxy
    Get(CriteriaArgs),
    /// Get one working proxy formatted for HTTP clients
    Config(CriteriaArgs),
    /// List matching proxies without probing them
    List {
        #[command(flatten)]
        criteria: CriteriaArgs,
        /// Maximum number of proxies to return (1-100)
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the configured proxy sources
    Sources,
    /// Probe every matching proxy and report the live ones
    Check {
        #[command(flatten)]
        criteria: CriteriaArgs,
        /// Also report dead proxies with their failure reason
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args, Clone, Debug)]
struct CriteriaArgs {
    /// Country code filter, can be repeated (e.g. US, GB, BR)
    #[arg(short, long = "country")]
    countries: Vec<String>,

    /// Probe timeout in seconds
    #[arg(short, long, default_value_t = 1.0)]
    timeout: f64,

    /// Probe candidates in random order
    #[arg(short, long)]
    random: bool,

    /// Only anonymous or elite proxies
    #[arg(long)]
    anonymous: bool,

    /// Only elite proxies
    #[arg(long)]
    elite: bool,

    /// Only proxies supporting HTTPS
    #[arg(long)]
    https: bool,

    /// Require (true) or exclude (false) Google support
    #[arg(long)]
    google: Option<bool>,
}

impl CriteriaArgs {
    fn to_criteria(&self) -> proxy_finder::Result<Criteria> {
        Criteria::new()
            .with_countries(&self.countries)
            .with_anonymity_flags(self.anonymous, self.elite)
            .with_https_only(self.https)
            .with_google(self.google)
            .with_random(self.random)
            .with_timeout_secs(self.timeout)
    }

    /// Requested countries as echoed back in responses
    fn country(&self) -> Option<String> {
        if self.countries.is_empty() {
            None
        } else {
            Some(self.countries.join(",").to_uppercase())
        }
    }
}

#[derive(Serialize)]
struct ProxyResponse {
    proxy: String,
    schema: Scheme,
    country: Option<String>,
}

#[derive(Serialize)]
struct ProxyListResponse {
    proxies: Vec<String>,
    count: usize,
    country: Option<String>,
}

#[derive(Serialize)]
struct CheckedProxy {
    proxy: String,
    live: bool,
    elapsed_ms: u128,
    country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

#[derive(Serialize)]
struct CheckResponse {
    checked: usize,
    live: usize,
    proxies: Vec<CheckedProxy>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(concurrency) = cli.probe_concurrency {
        config.probe_concurrency = concurrency;
    }
    if let Some(path) = cli.mmdb {
        config.mmdb_path = Some(path);
    }

    init_tracing(&config);
    info!("Loaded {} proxy sources", config.sources.len());

    if let Commands::Sources = cli.command {
        return print_json(&config.sources);
    }

    let mut finder = ProxyFinder::new(&config)?;
    if let Some(seed) = cli.seed {
        finder = finder.with_seed(seed);
    }

    match cli.command {
        Commands::Get(args) => {
            let criteria = args.to_criteria()?;
            let proxy = finder.get(&criteria).await?;
            print_json(&ProxyResponse {
                proxy,
                schema: criteria.scheme(),
                country: args.country(),
            })?;
        }
        Commands::Config(args) => {
            let criteria = args.to_criteria()?;
            print_json(&finder.get_config(&criteria).await?)?;
        }
        Commands::List { criteria, limit } => {
            let proxies = finder
                .get_list(&criteria.to_criteria()?.with_limit(limit))
                .await?;
            print_json(&ProxyListResponse {
                count: proxies.len(),
                proxies,
                country: criteria.country(),
            })?;
        }
        Commands::Check { criteria: args, all } => {
            let criteria = args.to_criteria()?;
            let outcomes = finder.check_all(&criteria).await?;
            let live = outcomes.iter().filter(|o| o.is_live()).count();
            info!("{} of {} proxies are live", live, outcomes.len());

            let proxies = outcomes
                .iter()
                .filter(|o| all || o.is_live())
                .map(|o| CheckedProxy {
                    proxy: o.candidate.url(criteria.scheme()),
                    live: o.success,
                    elapsed_ms: o.elapsed.as_millis(),
                    country: o.candidate.country_code().map(str::to_string),
                    failure: o.failure_reason.map(|r| r.to_string()),
                })
                .collect();

            print_json(&CheckResponse {
                checked: outcomes.len(),
                live,
                proxies,
            })?;
        }
        Commands::Sources => {}
    }

    Ok(())
}

/// Logs go to stderr so stdout carries only JSON
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("proxy_finder={}", config.log.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.log.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 2 for bad input, 3 when no proxy is available right now, 1 otherwise
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ProxyError>().map(ProxyError::class) {
        Some(ErrorClass::InvalidInput) => 2,
        Some(ErrorClass::Unavailable) => 3,
        Some(ErrorClass::Internal) | None => 1,
    }
}
