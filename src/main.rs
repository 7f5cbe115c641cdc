#[tokio::main]
async fn main() -> anyhow::Result<()> {
    interview_monitor_lib::run(std::env::args().skip(1)).await
}
