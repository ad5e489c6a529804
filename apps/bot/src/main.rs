use std::sync::Arc;

use anyhow::{Context, Result};
use assistant::{ChatClient, SessionStore};
use bot::{Data, command::stock::stock_command, config::Config};
use poise::{Framework, FrameworkOptions};
use serenity::all::{ActivityData, ClientBuilder, GatewayIntents};
use stock::{PriceCache, PriceClient, SymbolResolver};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let price_client = Arc::new(PriceCache::new(
        PriceClient::new(config.market_data_base_url.clone()).context("init price client failed")?,
        config.price_cache_ttl,
    ));

    let chat_client = match config.openai_api_key.as_deref() {
        Some(key) => Some(Arc::new(
            ChatClient::new(
                config.openai_base_url.clone(),
                key,
                config.openai_model.clone(),
                config.openai_temperature,
            )
            .context("init chat client failed")?,
        )),
        None => {
            warn!("OPENAI_API_KEY not set, /stock ask will reply with a setup notice");
            None
        }
    };
    let sessions = Arc::new(SessionStore::new(config.session_idle));

    info!(
        model = %config.openai_model,
        cache_ttl_secs = config.price_cache_ttl.as_secs(),
        session_idle_secs = config.session_idle.as_secs(),
        "starting"
    );

    let intents = GatewayIntents::non_privileged();
    let commands = vec![stock_command()];

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands,
            ..Default::default()
        })
        .setup({
            let version = config.version.clone();

            move |ctx, ready, framework| {
                Box::pin(async move {
                    info!(
                        "{} [{}] connected successfully!",
                        ready.user.name, ready.user.id
                    );

                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                    let text = if version.starts_with('v') {
                        version
                    } else {
                        format!("Version - {}", version)
                    };
                    ctx.set_activity(Some(ActivityData::custom(text)));

                    Ok(Data {
                        price_client,
                        resolver: SymbolResolver::default(),
                        chat_client,
                        sessions,
                    })
                })
            }
        })
        .build();

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("failed to create client")?;

    tokio::spawn(async move {
        if let Err(why) = client.start().await {
            error!("Client error: {why:?}");
        }
    });

    shutdown_signal().await?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("install SIGINT handler")?;
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
