//! render-pdf: 单独的渲染步骤
//!
//! 用法: render-pdf <input.html> <output.pdf>
//!
//! 成功退出码 0；参数个数错误、输入文件不存在、引擎启动或渲染失败时退出码 1。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use qbank_pdf::dispatcher::{ChromeEngine, Dispatcher, RenderJob};
use qbank_pdf::orchestrator::StagedArtifact;
use qbank_pdf::utils::logging;
use qbank_pdf::Config;

#[derive(Parser)]
#[command(
    name = "render-pdf",
    about = "Render one HTML document to PDF with headless Chrome"
)]
struct Cli {
    /// HTML document to render
    input: PathBuf,

    /// Output PDF path
    output: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            e.print().ok();
            return ExitCode::FAILURE;
        }
    };

    let config = Config::from_env();
    logging::init(config.verbose_logging);

    match render(config, cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn render(config: Config, cli: Cli) -> Result<()> {
    config.validate()?;

    if !cli.input.is_file() {
        bail!("input document not found: {}", cli.input.display());
    }

    let staged = StagedArtifact::new_for(&cli.output)
        .with_context(|| format!("cannot create output next to {}", cli.output.display()))?;

    let engine = Arc::new(ChromeEngine::from_config(&config));
    let dispatcher = Dispatcher::new(engine, config.dispatcher_config());
    let job = RenderJob {
        input: cli.input.clone(),
        output: staged.path().to_path_buf(),
        resources: Vec::new(),
    };

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到 Ctrl-C，正在取消渲染...");
            token.cancel();
        }
    });

    let report = dispatcher.dispatch(&job, &cancel).await?;
    staged
        .commit(&cli.output)
        .with_context(|| format!("cannot move PDF to {}", cli.output.display()))?;

    info!(
        "✅ PDF 已生成: {} ({} 字节)",
        cli.output.display(),
        report.bytes
    );
    Ok(())
}
