use clap::Parser;
use rescue_dispatch::adapters::{build_courier, build_store, http_client};
use rescue_dispatch::domain::ports::{Job, JobSummary};
use rescue_dispatch::utils::{logger, validation::Validate};
use rescue_dispatch::{
    CliConfig, Command, ConfirmationSweep, DispatchError, JobEngine, OrderCreationJob,
};

#[tokio::main]
async fn main() {
    // .env 不存在時沿用既有環境變數
    let dotenv = dotenvy::dotenv();

    let cli = CliConfig::parse();
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting rescue-dispatch {:?}", cli.command);
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
            job_label(cli.command),
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(1);
    }
}

fn job_label(command: Command) -> &'static str {
    match command {
        Command::CheckOrders => "check-orders",
        Command::SendOrders => "send-orders",
        Command::Validate => "validate",
    }
}

async fn run(cli: &CliConfig) -> Result<(), DispatchError> {
    let config = cli.load_config()?;

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        return Err(e);
    }

    if cli.command == Command::Validate {
        tracing::info!("✅ Configuration is valid");
        println!("✅ Configuration is valid");
        return Ok(());
    }

    let monitor_enabled = cli.monitoring_enabled(&config);
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }
    if cli.dry_run {
        tracing::info!("🧪 Dry run: no order will be changed");
    }

    let store = build_store(&config.store, http_client(config.courier.timeout())?)?;
    let courier = build_courier(&config.courier)?;

    let summary = match cli.command {
        Command::CheckOrders => {
            let job = ConfirmationSweep::new(
                store,
                courier,
                config.sweep_settings(cli.dry_run),
                config.package_plan(),
            );
            run_job(job, monitor_enabled).await?
        }
        Command::SendOrders => {
            let job = OrderCreationJob::new(store, courier, config.creation_settings(cli.dry_run));
            run_job(job, monitor_enabled).await?
        }
        Command::Validate => return Ok(()),
    };

    println!(
        "✅ {} finished: {}/{} item(s) handled",
        job_label(cli.command),
        summary.handled,
        summary.attempted
    );
    Ok(())
}

async fn run_job<J: Job>(job: J, monitor_enabled: bool) -> Result<JobSummary, DispatchError> {
    JobEngine::new_with_monitoring(job, monitor_enabled)
        .run()
        .await
}
