#![forbid(unsafe_code)]

mod config;
mod eval;
mod infra;
mod pgp;
mod probe;
mod report;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use config::{Config, DEFAULT_KEY_SERVER};
use eval::IssuerPolicy;
use infra::fs::Limits;
use infra::http::HttpClient;
use infra::Fetcher;
use report::{ExitCode, Status};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "keywatch",
    version,
    about = "Surveille la révocation et l’expiration prochaine de clés OpenPGP."
)]
struct Cli {
    /// Clé à vérifier : 0x<key id> (serveur de clés), http(s)://<url> ou file:<chemin>
    #[arg(short, long = "key", value_name = "KEY", env = "KEYWATCH_KEYS", action = ArgAction::Append)]
    keys: Vec<String>,

    /// Passe en CRITICAL si une clé expire dans cette fenêtre
    #[arg(short, long, value_name = "DURATION", env = "KEYWATCH_CRIT_AT", default_value = "168h", value_parser = humantime::parse_duration)]
    crit_at: Duration,

    /// Passe en WARNING si une clé expire dans cette fenêtre
    #[arg(short, long, value_name = "DURATION", env = "KEYWATCH_WARN_AT", default_value = "336h", value_parser = humantime::parse_duration)]
    warn_at: Duration,

    /// URL de recherche du serveur de clés
    #[arg(long, value_name = "URL", env = "KEYWATCH_KEY_SERVER", default_value = DEFAULT_KEY_SERVER)]
    key_server: String,

    /// Certifications tierces autorisées à fixer une durée de vie
    #[arg(long, value_enum, env = "KEYWATCH_ISSUER_POLICY", default_value_t = IssuerPolicy::Primary)]
    issuer_policy: IssuerPolicy,

    /// Timeout HTTP par clé
    #[arg(long, value_name = "DURATION", env = "KEYWATCH_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Taille max d’un certificat en KiB (défense DoS)
    #[arg(long, env = "KEYWATCH_MAX_KIB", default_value_t = 1024)]
    max_kib: u64,

    /// Export JSON du rapport
    #[arg(long, value_name = "FILE", env = "KEYWATCH_OUT")]
    out: Option<String>,

    /// Niveau de log (ex: info,debug,trace). Par défaut lu via RUST_LOG.
    #[arg(long, value_name = "LEVEL", env = "KEYWATCH_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = Config::new(self.keys.clone(), self.crit_at, self.warn_at)?;
        config.issuer_policy = self.issuer_policy;
        config.key_server = self.key_server.clone();
        config.timeout = self.timeout;
        config.limits = Limits::from_kib(self.max_kib);
        Ok(config)
    }
}

fn init_tracing(level: Option<&str>) {
    let env = match level {
        Some(lvl) => EnvFilter::new(lvl),
        None => EnvFilter::from_default_env(),
    };
    fmt()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<Status> {
    let config = cli.config().context("Configuration invalide")?;
    info!(
        keys = config.keys.len(),
        critical = %humantime::format_duration(config.thresholds.critical()),
        warning = %humantime::format_duration(config.thresholds.warning()),
        "seuils chargés"
    );
    let http = HttpClient::new(&config.key_server, config.timeout, config.limits)
        .context("Serveur de clés invalide (--key-server)")?;
    let fetcher = Fetcher::new(http, config.limits);

    let report = probe::run(&config, &fetcher, SystemTime::now());

    // Rendu terminal
    report::print_table(&report);
    for line in &report.messages {
        println!("{line}");
    }

    // Export JSON
    if let Some(out) = cli.out.as_deref() {
        report::write_json(&report, out).context("Écriture JSON --out a échoué")?;
        info!("Rapport JSON écrit dans {}", out);
    }

    Ok(report.status)
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help et --version restent en 0
            let code = if e.use_stderr() { ExitCode::Unknown as i32 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    init_tracing(cli.log_level.as_deref());

    info!("keywatch démarré");
    debug!(?cli);

    // Codes de sortie : une sonde mal configurée est UNKNOWN, jamais WARNING
    let code = match run(&cli) {
        Ok(status) => status.exit_code(),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:?}");
            ExitCode::Unknown
        }
    };
    std::process::exit(code as i32);
}
