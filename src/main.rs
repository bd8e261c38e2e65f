use squeeze_shell::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    squeeze_shell::init_tracing();
    let config = Config::from_env()?;
    squeeze_shell::run(config).await?;
    Ok(())
}
