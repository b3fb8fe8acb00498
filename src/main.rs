// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use migration::{Migrator, MigratorTrait};
use styleforge::application::use_cases::generation_use_case::GenerationUseCase;
use styleforge::config::settings::{EndpointSettings, Settings};
use styleforge::domain::repositories::batch_repository::BatchRepository;
use styleforge::domain::repositories::cost_repository::CostRepository;
use styleforge::domain::repositories::task_repository::TaskRepository;
use styleforge::domain::services::collaborators::Collaborators;
use styleforge::domain::services::cost_ledger::CostLedger;
use styleforge::infrastructure::database::connection;
use styleforge::infrastructure::metrics::init_metrics;
use styleforge::infrastructure::providers::chat_vision::ChatVisionClient;
use styleforge::infrastructure::providers::cost_lookup::HttpCostLookup;
use styleforge::infrastructure::providers::image_generator::HttpImageGenerator;
use styleforge::infrastructure::providers::ApiAuth;
use styleforge::infrastructure::repositories::batch_repo_impl::BatchRepositoryImpl;
use styleforge::infrastructure::repositories::cost_repo_impl::CostRepositoryImpl;
use styleforge::infrastructure::repositories::memory::{
    InMemoryBatchRepository, InMemoryCostRepository, InMemoryTaskRepository,
};
use styleforge::infrastructure::repositories::task_repo_impl::TaskRepositoryImpl;
use styleforge::infrastructure::storage::create_image_store;
use styleforge::presentation::routes;
use styleforge::queue::job_queue::{InMemoryJobQueue, JobQueue};
use styleforge::utils::retry_policy::RetryPolicy;
use styleforge::utils::telemetry;
use styleforge::workers::batch_orchestrator::BatchOrchestrator;
use styleforge::workers::manager::WorkerManager;
use styleforge::workers::step_executor::StepExecutor;
use styleforge::workers::task_runner::TaskRunner;

/// 数据库地址为该值时使用进程内仓库，不连接数据库
const MEMORY_DATABASE_URL: &str = "memory";

struct Repositories {
    tasks: Arc<dyn TaskRepository>,
    batches: Arc<dyn BatchRepository>,
    costs: Arc<dyn CostRepository>,
}

async fn create_repositories(settings: &Settings) -> anyhow::Result<Repositories> {
    if settings.database.url == MEMORY_DATABASE_URL {
        info!("Using in-memory repositories");
        return Ok(Repositories {
            tasks: Arc::new(InMemoryTaskRepository::new()),
            batches: Arc::new(InMemoryBatchRepository::new()),
            costs: Arc::new(InMemoryCostRepository::new()),
        });
    }

    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    Ok(Repositories {
        tasks: Arc::new(TaskRepositoryImpl::new(db.clone())),
        batches: Arc::new(BatchRepositoryImpl::new(db.clone())),
        costs: Arc::new(CostRepositoryImpl::new(db)),
    })
}

fn endpoint_auth(client: &reqwest::Client, endpoint: &EndpointSettings) -> ApiAuth {
    ApiAuth::from_config(
        client.clone(),
        endpoint.api_key.clone(),
        endpoint.token_url.clone(),
    )
}

/// 主函数
///
/// 加载配置，装配仓库、模型供应商与工作器，然后启动 HTTP 服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;
    telemetry::init_telemetry(settings.logging.json);
    info!("Starting styleforge...");

    init_metrics(&settings.metrics);

    let repos = create_repositories(&settings).await?;
    let images = create_image_store(&settings.storage)?;
    info!(storage = %settings.storage.storage_type, "Image store initialized");

    let client = reqwest::Client::builder()
        .timeout(settings.pipeline.call_timeout() + Duration::from_secs(5))
        .build()?;
    let providers = &settings.providers;

    let vision = Arc::new(ChatVisionClient::new(
        client.clone(),
        providers.vision.base_url.clone(),
        providers.vision.model.clone(),
        endpoint_auth(&client, &providers.vision),
    ));
    let image_generator = Arc::new(HttpImageGenerator::new(
        client.clone(),
        providers.image.base_url.clone(),
        providers.image.model.clone(),
        endpoint_auth(&client, &providers.image),
        providers.image_fixed_price,
    ));
    let cost_lookup = Arc::new(HttpCostLookup::new(
        client.clone(),
        providers.cost_lookup_url.clone(),
        ApiAuth::from_config(client.clone(), providers.cost_lookup_api_key.clone(), None),
    ));

    let collaborators = Collaborators {
        style_analyzer: vision.clone(),
        content_analyzer: vision.clone(),
        prompt_synthesizer: vision,
        image_generator,
        cost_lookup,
        images,
    };

    let ledger = Arc::new(CostLedger::new(
        repos.costs.clone(),
        repos.tasks.clone(),
        settings.pipeline.usd_to_cny_rate,
    ));
    let retry = RetryPolicy::new(
        settings.pipeline.call_retries,
        settings.pipeline.call_timeout(),
    );
    let executor = Arc::new(StepExecutor::new(collaborators, ledger.clone(), retry));
    let runner = Arc::new(TaskRunner::new(
        repos.tasks.clone(),
        repos.batches.clone(),
        executor.clone(),
    ));
    let orchestrator = Arc::new(BatchOrchestrator::new(
        repos.batches.clone(),
        repos.tasks.clone(),
        runner.clone(),
        executor,
        settings.pipeline.batch_concurrency,
    ));

    let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
    let mut worker_manager = WorkerManager::new(queue.clone(), runner, orchestrator);
    worker_manager.start_workers(settings.pipeline.worker_count);

    let use_case = Arc::new(GenerationUseCase::new(
        repos.tasks,
        repos.batches,
        ledger,
        queue,
        settings.pipeline.max_batch_size,
    ));
    let app = routes::routes(use_case);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { worker_manager.wait_for_shutdown().await })
        .await?;

    info!("styleforge stopped");
    Ok(())
}
