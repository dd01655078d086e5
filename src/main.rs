#[tokio::main]
async fn main() -> anyhow::Result<()> {
    crowd_index::run().await
}
