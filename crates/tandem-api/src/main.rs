use tandem_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = tandem_api::setup::initialize_app(config.clone()).await?;

    tandem_api::setup::server::start_server(&config, router, state.connections.clone()).await?;

    Ok(())
}
