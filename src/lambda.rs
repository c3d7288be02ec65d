use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use rescue_dispatch::adapters::{build_courier, build_store, http_client};
use rescue_dispatch::domain::ports::{Job, JobSummary};
use rescue_dispatch::utils::{logger, validation::Validate};
use rescue_dispatch::{ConfirmationSweep, DispatchConfig, JobEngine, OrderCreationJob};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    CheckOrders,
    SendOrders,
}

#[derive(Deserialize)]
pub struct Request {
    pub job: JobKind,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub attempted: usize,
    pub handled: usize,
}

fn boxed(e: rescue_dispatch::DispatchError) -> Error {
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    Box::new(e)
}

async fn run_job<J: Job>(job: J) -> Result<JobSummary, Error> {
    JobEngine::new(job).run().await.map_err(boxed)
}

async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    let request = event.payload;
    tracing::info!("Starting {:?} Lambda function", request.job);

    // 部署環境只提供環境變數
    let config = DispatchConfig::from_env().map_err(boxed)?;
    config.validate().map_err(boxed)?;

    let store = build_store(
        &config.store,
        http_client(config.courier.timeout()).map_err(boxed)?,
    )
    .map_err(boxed)?;
    let courier = build_courier(&config.courier).map_err(boxed)?;

    let summary = match request.job {
        JobKind::CheckOrders => {
            run_job(ConfirmationSweep::new(
                store,
                courier,
                config.sweep_settings(request.dry_run),
                config.package_plan(),
            ))
            .await?
        }
        JobKind::SendOrders => {
            run_job(OrderCreationJob::new(
                store,
                courier,
                config.creation_settings(request.dry_run),
            ))
            .await?
        }
    };

    Ok(Response {
        message: format!(
            "Script finished, {}/{} item(s) have been handled",
            summary.handled, summary.attempted
        ),
        attempted: summary.attempted,
        handled: summary.handled,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    run(service_fn(function_handler)).await
}
