use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use credit_form::config::{AppConfig, TemplateConfig};
use credit_form::error::AppError;
use credit_form::loan::{self, LoanRequest};
use credit_form::routes::{app, AppState};
use credit_form::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "Credit Form",
    about = "Serve the credit form and quote flat monthly loan payments",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Quote a single monthly payment from the command line
    Quote(QuoteArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct QuoteArgs {
    /// Total purchase price
    #[arg(long)]
    full_price: String,
    /// Up-front down payment
    #[arg(long, default_value = "0")]
    down_payment: String,
    /// Repayment term in months (1 to 360)
    #[arg(long)]
    months_to_pay: String,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Quote(args) => run_quote(args),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let template = load_template(&config.template)?;
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        template: Arc::new(template),
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = app(state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "credit form service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn load_template(config: &TemplateConfig) -> Result<String, AppError> {
    std::fs::read_to_string(&config.path).map_err(|source| AppError::Template {
        path: config.path.clone(),
        source,
    })
}

fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let request = LoanRequest::new(args.full_price, args.down_payment, args.months_to_pay);
    let validated = loan::validate(&request)?;

    println!(
        "Monthly payment over {} months: {:.2}",
        validated.months_to_pay(),
        validated.monthly_payment()
    );

    Ok(())
}
