//! 流水线 - 编排层
//!
//! 一次运行 = 一组有序文件夹 + 一个输出路径。
//! 阶段严格线性：加载的输出喂给排版，排版的输出喂给渲染，渲染结果即运行结果。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::staging::StagedArtifact;
use super::{Progress, ProgressReceiver, ProgressSender, Stage};
use crate::composer::{ComposedDocument, Composer};
use crate::config::Config;
use crate::dispatcher::{ChromeEngine, Dispatcher, RenderEngine, RenderJob};
use crate::error::{AppError, AppResult, ContentError};
use crate::models::{load_question_bank, QuestionBank};
use crate::utils::logging::{log_bank_loaded, log_startup, print_final_stats};

/// 构建请求
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    /// 题库文件夹，顺序即输出顺序，不会被重新排序
    pub folders: Vec<PathBuf>,
    /// 最终 PDF 路径
    pub output: PathBuf,
}

impl BuildRequest {
    pub fn new(folders: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            folders,
            output: output.into(),
        }
    }
}

/// 成功运行的结果
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub output: PathBuf,
    pub sections: usize,
    pub questions: usize,
    pub bytes: u64,
}

/// 流水线
///
/// 不持有任何跨运行的状态；渲染会话由每次运行自己的 [`Dispatcher`] 独占。
#[derive(Clone)]
pub struct Pipeline {
    config: Config,
    engine: Arc<dyn RenderEngine>,
}

impl Pipeline {
    pub fn new(config: Config, engine: Arc<dyn RenderEngine>) -> Self {
        Self { config, engine }
    }

    /// 使用 Chrome 作为渲染引擎
    pub fn with_chrome(config: Config) -> Self {
        let engine = Arc::new(ChromeEngine::from_config(&config));
        Self::new(config, engine)
    }

    /// 在后台任务中运行，立即返回句柄
    pub fn spawn(&self, request: BuildRequest) -> PipelineHandle {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let pipeline = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { pipeline.run(&request, &progress_tx, &token).await });

        PipelineHandle {
            progress: progress_rx,
            cancel,
            task,
        }
    }

    /// 执行一次完整运行
    ///
    /// # 参数
    /// - `request`: 文件夹与输出路径
    /// - `progress`: 进度发送端，接收端已关闭时静默忽略
    /// - `cancel`: 在每个阶段边界检查；渲染中取消会强制终止会话
    ///
    /// # 返回
    /// 成功时产物已位于 `request.output`；失败时该路径不会出现新文件
    pub async fn run(
        &self,
        request: &BuildRequest,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> AppResult<BuildOutcome> {
        self.config.validate()?;
        log_startup(&request.folders, &request.output);

        // ========== 加载 ==========
        checkpoint(Stage::Loading, cancel)?;
        report(
            progress,
            Stage::Loading,
            format!("加载 {} 个文件夹", request.folders.len()),
        );
        let bank = load_bank(&request.folders).await?;
        for section in &bank.sections {
            report(
                progress,
                Stage::Loading,
                format!("已读取 {} ({} 道题)", section.name, section.questions.len()),
            );
        }

        // ========== 排版 ==========
        checkpoint(Stage::Composing, cancel)?;
        report(
            progress,
            Stage::Composing,
            format!("排版 {} 道题目", bank.question_count()),
        );
        let document = self.compose(bank).await?;

        // ========== 渲染 ==========
        checkpoint(Stage::Rendering, cancel)?;
        report(progress, Stage::Rendering, "渲染 PDF");

        let created = create_missing_parents(&request.output).await?;
        let bytes = match self.render(&document, &request.output, cancel).await {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_created_dirs(&created).await;
                return Err(e);
            }
        };

        report(
            progress,
            Stage::Done,
            format!("已生成 {}", request.output.display()),
        );
        print_final_stats(document.question_count, bytes, &request.output);

        Ok(BuildOutcome {
            output: request.output.clone(),
            sections: document.section_count,
            questions: document.question_count,
            bytes,
        })
    }

    /// 渲染到暂存文件，成功后提交到 `output`，返回产物字节数
    async fn render(
        &self,
        document: &ComposedDocument,
        output: &Path,
        cancel: &CancellationToken,
    ) -> AppResult<u64> {
        let workspace = tempfile::Builder::new()
            .prefix("qbank-doc-")
            .tempdir()
            .map_err(|e| AppError::io(std::env::temp_dir(), e))?;
        let input = workspace.path().join("document.html");
        tokio::fs::write(&input, &document.html)
            .await
            .map_err(|e| AppError::io(&input, e))?;
        debug!("文档已写入: {} ({} 字节)", input.display(), document.html.len());

        let staged = StagedArtifact::new_for(output).map_err(|e| AppError::io(output, e))?;

        let job = RenderJob {
            input,
            output: staged.path().to_path_buf(),
            resources: document.resources.clone(),
        };
        let dispatcher = Dispatcher::new(self.engine.clone(), self.config.dispatcher_config());
        let rendered = dispatcher.dispatch(&job, cancel).await?;

        // ========== 提交 ==========
        checkpoint(Stage::Done, cancel)?;
        staged.commit(output).map_err(|e| AppError::io(output, e))?;
        Ok(rendered.bytes)
    }

    /// 只加载与排版，不启动渲染引擎
    pub async fn compose_only(&self, folders: &[PathBuf]) -> AppResult<ComposedDocument> {
        self.config.validate()?;
        let bank = load_bank(folders).await?;
        self.compose(bank).await
    }

    /// 排版是纯 CPU 工作（内嵌模式下还有同步读文件），放到阻塞线程池
    async fn compose(&self, bank: QuestionBank) -> AppResult<ComposedDocument> {
        let composer = Composer::new(self.config.composer_config());
        let document = tokio::task::spawn_blocking(move || composer.compose(&bank))
            .await
            .map_err(|e| AppError::TaskFailed(e.to_string()))??;
        info!(
            "✓ 排版完成: {} 个分区, {} 个外部资源",
            document.section_count,
            document.resources.len()
        );
        Ok(document)
    }
}

/// 后台运行的句柄
pub struct PipelineHandle {
    /// 进度接收端，运行结束后关闭
    pub progress: ProgressReceiver,
    cancel: CancellationToken,
    task: JoinHandle<AppResult<BuildOutcome>>,
}

impl PipelineHandle {
    /// 请求取消，运行会在下一个阶段边界或渲染等待中停止
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 取消令牌的副本，例如交给 Ctrl-C 处理
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 等待运行结束
    pub async fn wait(self) -> AppResult<BuildOutcome> {
        self.task
            .await
            .map_err(|e| AppError::TaskFailed(e.to_string()))?
    }
}

async fn load_bank(folders: &[PathBuf]) -> AppResult<QuestionBank> {
    let bank = load_question_bank(folders).await?;
    if bank.is_empty() {
        return Err(ContentError::EmptyBank {
            folders: folders.len(),
        }
        .into());
    }
    log_bank_loaded(bank.sections.len(), bank.question_count());
    Ok(bank)
}

fn checkpoint(stage: Stage, cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        warn!("⚠️ 运行在 {} 阶段前被取消", stage);
        return Err(AppError::Cancelled { stage });
    }
    Ok(())
}

fn report(progress: &ProgressSender, stage: Stage, message: impl Into<String>) {
    let progress_message = Progress::new(stage, message);
    debug!("▶ [{}] {}", stage, progress_message.message);
    progress.send(progress_message).ok();
}

/// 创建输出缺失的父目录，返回本次新建的目录（由浅到深）
async fn create_missing_parents(output: &Path) -> AppResult<Vec<PathBuf>> {
    let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(Vec::new());
    };

    let mut missing = Vec::new();
    let mut current = Some(parent);
    while let Some(dir) = current.filter(|d| !d.as_os_str().is_empty()) {
        if tokio::fs::try_exists(dir).await.unwrap_or(false) {
            break;
        }
        missing.push(dir.to_path_buf());
        current = dir.parent();
    }

    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| AppError::io(parent, e))?;
    missing.reverse();
    Ok(missing)
}

/// 运行失败时删除本次新建的目录，非空目录保留
async fn remove_created_dirs(created: &[PathBuf]) {
    for dir in created.iter().rev() {
        if let Err(e) = tokio::fs::remove_dir(dir).await {
            debug!("保留目录 {}: {}", dir.display(), e);
            break;
        }
    }
}
