#[tokio::main]
async fn main() -> anyhow::Result<()> {
    btmgr_cli::run().await
}
