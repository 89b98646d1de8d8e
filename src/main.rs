//! qbank-pdf 命令行
//!
//! 用法:
//!   qbank-pdf build -o OUT.pdf FOLDER...     生成 PDF（文件夹顺序即分区顺序）
//!   qbank-pdf list ROOT                      按自然序列出可选的题库文件夹
//!   qbank-pdf compose -o OUT.html FOLDER...  只排版，输出 HTML

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use qbank_pdf::utils::logging;
use qbank_pdf::{list_bank_folders, BuildRequest, Config, Pipeline};

#[derive(Parser)]
#[command(
    name = "qbank-pdf",
    about = "Lay out question-bank folders into a printable PDF",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a PDF from the given folders, in the given order
    Build {
        /// Output PDF path
        #[arg(short, long)]
        output: PathBuf,

        /// Chrome/Chromium executable
        #[arg(long)]
        chrome: Option<PathBuf>,

        /// Launch the browser without its sandbox (containers running as root)
        #[arg(long)]
        no_sandbox: bool,

        /// Embed images as data URIs instead of file:// references
        #[arg(long)]
        embed_resources: bool,

        /// Question-bank folders
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },

    /// List the sub-folders of ROOT in natural order
    List {
        /// Directory containing question-bank folders
        root: PathBuf,
    },

    /// Load and compose only, writing the HTML document
    Compose {
        /// Output HTML path
        #[arg(short, long)]
        output: PathBuf,

        /// Question-bank folders
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);

    match cli.command {
        Commands::Build {
            output,
            chrome,
            no_sandbox,
            embed_resources,
            folders,
        } => {
            let config = Config {
                chrome_executable: chrome.or(config.chrome_executable),
                no_sandbox: no_sandbox || config.no_sandbox,
                embed_resources: embed_resources || config.embed_resources,
                ..config
            };
            build(config, folders, output).await
        }
        Commands::List { root } => {
            for folder in list_bank_folders(&root).await? {
                println!("{}", folder.display());
            }
            Ok(())
        }
        Commands::Compose { output, folders } => {
            let document = Pipeline::with_chrome(config).compose_only(&folders).await?;
            tokio::fs::write(&output, &document.html)
                .await
                .with_context(|| format!("写入 {} 失败", output.display()))?;
            info!(
                "✅ 已写出 {} ({} 个分区, {} 道题目)",
                output.display(),
                document.section_count,
                document.question_count
            );
            Ok(())
        }
    }
}

async fn build(config: Config, folders: Vec<PathBuf>, output: PathBuf) -> Result<()> {
    let pipeline = Pipeline::with_chrome(config);
    let mut handle = pipeline.spawn(BuildRequest::new(folders, output));

    // Ctrl-C 只请求取消，由流水线负责终止浏览器会话
    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到 Ctrl-C，正在取消...");
            token.cancel();
        }
    });

    while let Some(progress) = handle.progress.recv().await {
        info!("📍 [{}] {}", progress.stage, progress.message);
    }

    match handle.wait().await {
        Ok(outcome) => {
            info!(
                "🎉 {} 个分区, {} 道题目 → {}",
                outcome.sections,
                outcome.questions,
                outcome.output.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ 生成失败 [{}]: {}", e.kind(), e);
            Err(e.into())
        }
    }
}
