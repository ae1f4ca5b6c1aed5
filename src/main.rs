#[tokio::main]
async fn main() -> anyhow::Result<()> {
    careflow::run().await
}
