#[tokio::main]
async fn main() -> anyhow::Result<()> {
    presetfarm_lib::run().await
}
