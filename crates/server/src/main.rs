#[tokio::main]
async fn main() -> anyhow::Result<()> {
    qachat_server::start().await
}
