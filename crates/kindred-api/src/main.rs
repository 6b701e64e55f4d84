use kindred_core::Config;

// Use mimalloc as the global allocator.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (storage, services, routes)
    let (state, router) = kindred_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    kindred_api::setup::server::start_server(&config, router).await?;

    if let Some(sweeper) = state.rate_limit_sweeper() {
        sweeper.abort();
    }

    Ok(())
}
