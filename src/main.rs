use anyhow::Result;
use course_gen_worker::utils::logging;
use course_gen_worker::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置：有 config.toml 就读文件，否则只用环境变量
    let config_path = std::path::Path::new("config.toml");
    let config = if config_path.exists() {
        Config::from_toml_file(config_path)?
    } else {
        Config::from_env()
    };

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
