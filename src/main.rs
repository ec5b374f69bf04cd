use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use codearena::config::{CliArgs, Config};
use codearena::cooldown::{Cooldown, CooldownStore, MemoryCooldown, RedisCooldown};
use codearena::database as db;
use codearena::judge::{Evaluator, Judge0Client};
use codearena::web_server::build_server;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();

    let Config {
        server: server_config,
        database: database_config,
        judge: judge_config,
        cooldown: cooldown_config,
        admin: admin_config,
    } = cli.to_config().context("Failed to load configuration")?;

    let db_path = database_config.path.unwrap_or_else(db::get_db_path);

    if cli.flush_data {
        db::remove_db(&db_path);
    }

    let db_pool = db::init_db(&db_path)
        .await
        .context("Failed to initialize database")?;
    db::ensure_admin(&db_pool, &admin_config)
        .await
        .context("Failed to install administrator")?;

    let judge0 = Judge0Client::new(&judge_config).context("Failed to build Judge0 client")?;
    if judge_config.api_key.is_none() {
        log::warn!("No Judge0 API key configured, requests are sent unauthenticated");
    }

    let cooldown_store: Arc<dyn CooldownStore> = match &cooldown_config.redis_url {
        Some(url) => {
            let store = RedisCooldown::connect(url)
                .await
                .context("Failed to connect to Redis")?;
            log::info!("Connected to Redis cooldown store");
            Arc::new(store)
        }
        None => {
            log::info!("No Redis configured, using in-process cooldown store");
            Arc::new(MemoryCooldown::new())
        }
    };

    let shutdown_token = CancellationToken::new();
    let evaluator = web::Data::new(Evaluator::new(
        Arc::new(judge0),
        judge_config.poll_policy(),
        shutdown_token.clone(),
    ));
    let cooldown = web::Data::new(Cooldown::new(
        cooldown_store,
        Duration::from_secs(cooldown_config.window_secs),
    ));

    // ======= PREPARATION END, EXECUTION START =======

    let server = build_server(server_config, db_pool.clone(), evaluator, cooldown)
        .context("Failed to build server")?;

    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    // ===== EXECUTION END, WAITING FOR SHUTDOWN ======

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
    }

    // 1. Stop polling the execution service so in-flight requests can finish
    shutdown_token.cancel();

    // 2. Shutdown actix-web server gracefully
    server_handle.stop(true).await;

    // 3. Release database connections
    db_pool.close().await;

    log::info!("Shutdown complete");
    Ok(())
}
