//! Process entrypoint: loads configuration, wires the Runtime Gateway,
//! Prompt Store, and Deployment Controller, and serves their RPC routers
//! each on its documented default port (spec §6).

use std::process::ExitCode;
use std::sync::Arc;

use dotenv::dotenv;
use tracing::{error, info};

use llmops_core::config::{Settings, StorageBackend};
use llmops_core::deploy::{AlwaysPassCustomGateChecker, DeploymentController, InMemoryDeploymentStore, InMemoryMetricsSampler, PostgresDeploymentStore};
use llmops_core::llm::providers::anthropic::{AnthropicAdapter, AnthropicConfig};
use llmops_core::llm::providers::bedrock::{BedrockAdapter, BedrockConfig};
use llmops_core::llm::providers::gemini::{GeminiAdapter, GeminiConfig};
use llmops_core::llm::providers::ollama::{OllamaAdapter, OllamaConfig};
use llmops_core::llm::providers::openai::{OpenAICompatAdapter, OpenAICompatConfig};
use llmops_core::llm::registry::ProviderRegistry;
use llmops_core::llm::router::Router;
use llmops_core::llm::service::RuntimeService;
use llmops_core::prompt::{InMemoryPromptStore, PostgresPromptStore, PromptService};
use llmops_core::rpc::{self, DeployState, PromptState, RuntimeState};

struct RunningControllers {
    deployment_controller: Arc<DeploymentController>,
    deployment_store: Arc<dyn llmops_core::deploy::DeploymentStore>,
    prompt_service: Arc<PromptService>,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = dotenv() {
        eprintln!("no .env file loaded: {err}");
    }
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env();
    if let Err(err) = settings.validate() {
        error!(error = %err, "invalid configuration");
        return ExitCode::FAILURE;
    }

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server exited with an unrecoverable error");
            ExitCode::FAILURE
        }
    }
}

fn build_registry(settings: &Settings) -> ProviderRegistry {
    let mut builder = ProviderRegistry::builder();
    let providers = &settings.providers;

    if let Some(key) = providers.openai_api_key.clone() {
        builder = builder.register(Arc::new(OpenAICompatAdapter::new(OpenAICompatConfig::openai(key))));
    }
    if let Some(key) = providers.together_api_key.clone() {
        builder = builder.register(Arc::new(OpenAICompatAdapter::new(OpenAICompatConfig::together(key))));
    }
    if let Some(key) = providers.openrouter_api_key.clone() {
        builder = builder.register(Arc::new(OpenAICompatAdapter::new(OpenAICompatConfig::openrouter(key))));
    }
    if let Some(key) = providers.anthropic_api_key.clone() {
        builder = builder.register(Arc::new(AnthropicAdapter::new(AnthropicConfig::anthropic(key))));
    }
    if let Some(key) = providers.google_api_key.clone() {
        builder = builder.register(Arc::new(GeminiAdapter::new(GeminiConfig::gemini(key))));
    }
    if let (Some(access_key), Some(secret_key)) = (providers.aws_access_key_id.clone(), providers.aws_secret_access_key.clone()) {
        let region = providers.aws_region.clone().unwrap_or_else(|| "us-east-1".to_string());
        builder = builder.register(Arc::new(BedrockAdapter::new(BedrockConfig::new(access_key, secret_key, providers.aws_session_token.clone(), region))));
    }
    if let Some(base_url) = providers.ollama_base_url.clone() {
        builder = builder.register(Arc::new(OllamaAdapter::new(OllamaConfig::new(base_url, vec![]))));
    }

    builder.build()
}

async fn build_controllers(settings: &Settings) -> llmops_core::Result<RunningControllers> {
    let (prompt_store, deployment_store): (Arc<dyn llmops_core::prompt::PromptStore>, Arc<dyn llmops_core::deploy::DeploymentStore>) = match settings.storage_backend {
        StorageBackend::Memory => (Arc::new(InMemoryPromptStore::new()), Arc::new(InMemoryDeploymentStore::new())),
        StorageBackend::Postgres => {
            let url = settings
                .database
                .connection_url()
                .ok_or_else(|| llmops_core::PlatformError::failed_precondition("postgres backend selected but no connection url could be built"))?;
            let pool = sqlx::postgres::PgPoolOptions::new().max_connections(10).connect(&url).await?;

            let prompts = PostgresPromptStore::new(pool.clone());
            prompts.ensure_schema().await?;

            let deployments = PostgresDeploymentStore::new(pool);
            deployments.ensure_schema().await?;

            (Arc::new(prompts), Arc::new(deployments))
        }
    };

    let prompt_service = Arc::new(PromptService::new(prompt_store));

    let deployment_controller = Arc::new(DeploymentController::new(
        deployment_store.clone(),
        Arc::new(llmops_core::deploy::FixedEvalScorer { score: 1.0 }),
        Arc::new(InMemoryMetricsSampler::new()),
        Arc::new(AlwaysPassCustomGateChecker),
    ));

    Ok(RunningControllers {
        deployment_controller,
        deployment_store,
        prompt_service,
    })
}

async fn run(settings: Settings) -> llmops_core::Result<()> {
    info!(environment = ?settings.environment, version = %settings.version, "starting llmops-core");

    let registry = Arc::new(build_registry(&settings));
    let router = Arc::new(Router::new(registry));

    let controllers = build_controllers(&settings).await?;

    let runtime_service = Arc::new(RuntimeService::new(router).with_prompt_resolver(controllers.prompt_service.clone()));

    let runtime_router = rpc::runtime_router(RuntimeState { service: runtime_service });
    let prompt_router = rpc::prompt_router(PromptState { service: controllers.prompt_service });
    let deploy_router = rpc::deploy_router(DeployState {
        controller: controllers.deployment_controller,
        store: controllers.deployment_store,
    });

    let runtime_addr: std::net::SocketAddr = format!("0.0.0.0:{}", settings.http_port).parse().map_err(|e: std::net::AddrParseError| llmops_core::PlatformError::internal(e.to_string()))?;
    let prompt_addr: std::net::SocketAddr = format!("0.0.0.0:{}", settings.prompt_port).parse().map_err(|e: std::net::AddrParseError| llmops_core::PlatformError::internal(e.to_string()))?;
    let deploy_addr: std::net::SocketAddr = format!("0.0.0.0:{}", settings.deploy_port).parse().map_err(|e: std::net::AddrParseError| llmops_core::PlatformError::internal(e.to_string()))?;

    info!(%runtime_addr, %prompt_addr, %deploy_addr, "binding rpc surfaces");

    let runtime_server = axum::Server::bind(&runtime_addr).serve(runtime_router.into_make_service());
    let prompt_server = axum::Server::bind(&prompt_addr).serve(prompt_router.into_make_service());
    let deploy_server = axum::Server::bind(&deploy_addr).serve(deploy_router.into_make_service());

    tokio::try_join!(
        async { runtime_server.await.map_err(|e| llmops_core::PlatformError::internal(e.to_string())) },
        async { prompt_server.await.map_err(|e| llmops_core::PlatformError::internal(e.to_string())) },
        async { deploy_server.await.map_err(|e| llmops_core::PlatformError::internal(e.to_string())) },
    )?;

    Ok(())
}
