#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gptbot::run().await
}
