use anyhow::Result;
use solution_marking::utils::logging;
use solution_marking::{App, Config};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // Ctrl-C 取消正在进行的请求
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⛔ 收到 Ctrl-C，正在取消...");
                cancel.cancel();
            }
        });
    }

    // 初始化并运行应用
    App::initialize(config, cancel).await?.run().await?;

    Ok(())
}
