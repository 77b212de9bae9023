use chore_sync_lib::shared::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chore_sync_lib::init_logging();
    chore_sync_lib::run(AppConfig::from_env()).await
}
