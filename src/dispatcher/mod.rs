//! 渲染分发层（Dispatcher）
//!
//! ## 职责
//!
//! 持有一次运行的渲染会话，驱动状态机：
//!
//! ```text
//! Idle → Launching → AwaitingContentLoad → Rendering → Finalizing → Done
//!                                                                  ↘ Failed
//! ```
//!
//! - 每个阶段都有超时上限，超时或取消会立即进入 `Failed`
//! - 资源全部加载完成之前绝不进入 `Rendering`
//! - 无论从哪条路径退出，会话都会被终止
//! - 不做重试

mod chrome;
mod engine;
mod state;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::PageGeometry;
use crate::error::{RenderError, RenderResult};

pub use chrome::{print_params, ChromeEngine, ChromeOptions};
pub use engine::{RenderEngine, RenderSession};
pub use state::DispatchState;

/// 分发器配置
#[derive(Clone, Debug, PartialEq)]
pub struct DispatcherConfig {
    pub launch_timeout: Duration,
    pub content_load_timeout: Duration,
    pub render_timeout: Duration,
    pub finalize_timeout: Duration,
    /// 终止会话的上限
    pub shutdown_timeout: Duration,
    pub geometry: PageGeometry,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            launch_timeout: Duration::from_secs(30),
            content_load_timeout: Duration::from_secs(60),
            render_timeout: Duration::from_secs(120),
            finalize_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            geometry: PageGeometry::default(),
        }
    }
}

/// 一次渲染任务
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// HTML 文档路径
    pub input: PathBuf,
    /// 产物路径（通常是暂存文件）
    pub output: PathBuf,
    /// 文档引用的外部资源，启动引擎前先确认都存在
    pub resources: Vec<PathBuf>,
}

/// 渲染结果
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub output: PathBuf,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// 渲染分发器
///
/// 一个实例对应一次运行，会话不与其他运行共享。
pub struct Dispatcher {
    engine: Arc<dyn RenderEngine>,
    config: DispatcherConfig,
    state: watch::Sender<DispatchState>,
    history: Mutex<Vec<DispatchState>>,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn RenderEngine>, config: DispatcherConfig) -> Self {
        let (state, _) = watch::channel(DispatchState::Idle);
        Self {
            engine,
            config,
            state,
            history: Mutex::new(vec![DispatchState::Idle]),
        }
    }

    /// 当前状态
    pub fn state(&self) -> DispatchState {
        *self.state.borrow()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<DispatchState> {
        self.state.subscribe()
    }

    /// 本次运行经历过的全部状态
    pub fn history(&self) -> Vec<DispatchState> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 执行一次渲染
    pub async fn dispatch(
        &self,
        job: &RenderJob,
        cancel: &CancellationToken,
    ) -> RenderResult<DispatchReport> {
        let started = Instant::now();
        self.reset();
        info!("[渲染] 🖨️ 使用引擎: {}", self.engine.name());

        match self.run(job, cancel, started).await {
            Ok(report) => {
                self.transition(DispatchState::Done);
                info!(
                    "[渲染] ✅ 完成: {} ({} 字节, 用时 {:.1}s)",
                    report.output.display(),
                    report.bytes,
                    report.elapsed.as_secs_f64()
                );
                Ok(report)
            }
            Err(e) => {
                discard_partial(&job.output).await;
                self.transition(DispatchState::Failed);
                error!("[渲染] ❌ 失败: {}", e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        job: &RenderJob,
        cancel: &CancellationToken,
        started: Instant,
    ) -> RenderResult<DispatchReport> {
        let url = preflight(job).await?;

        self.transition(DispatchState::Launching);
        let mut session = self
            .bounded(
                DispatchState::Launching,
                self.config.launch_timeout,
                cancel,
                self.engine.launch(),
            )
            .await?;

        // 会话一旦建立，不论 drive 结果如何都要终止
        let outcome = self.drive(session.as_mut(), &url, job, cancel).await;
        let shutdown = self.shutdown(session.as_mut()).await;

        let bytes = outcome?;
        shutdown?;

        Ok(DispatchReport {
            output: job.output.clone(),
            bytes,
            elapsed: started.elapsed(),
        })
    }

    async fn drive(
        &self,
        session: &mut dyn RenderSession,
        url: &Url,
        job: &RenderJob,
        cancel: &CancellationToken,
    ) -> RenderResult<u64> {
        self.transition(DispatchState::AwaitingContentLoad);
        self.bounded(
            DispatchState::AwaitingContentLoad,
            self.config.content_load_timeout,
            cancel,
            async {
                session.load_document(url).await?;
                debug!("[渲染] 文档已载入，等待资源加载...");
                session.wait_for_resources().await
            },
        )
        .await?;

        self.transition(DispatchState::Rendering);
        self.bounded(
            DispatchState::Rendering,
            self.config.render_timeout,
            cancel,
            session.print_to_file(&self.config.geometry, &job.output),
        )
        .await?;

        self.transition(DispatchState::Finalizing);
        self.bounded(
            DispatchState::Finalizing,
            self.config.finalize_timeout,
            cancel,
            async {
                session.release_document().await?;
                verify_artifact(&job.output).await
            },
        )
        .await
    }

    /// 终止会话，不受取消影响
    ///
    /// 会话自身的关闭、等待与强制结束合计不超过两份 `shutdown_timeout`，
    /// 这里再多留一份。仍未结束时再调用一次 `terminate`，让会话跳过正常关闭直接强制结束。
    async fn shutdown(&self, session: &mut dyn RenderSession) -> RenderResult<()> {
        let limit = self.config.shutdown_timeout * 3;
        let result = match tokio::time::timeout(limit, session.terminate()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "[渲染] ⚠️ 会话在 {}ms 内未能终止，再次强制结束",
                    limit.as_millis()
                );
                let retry = self.config.shutdown_timeout;
                tokio::time::timeout(retry, session.terminate())
                    .await
                    .unwrap_or_else(|_| {
                        Err(RenderError::TerminateFailed {
                            message: format!(
                                "{}ms 内未能终止",
                                (limit + retry).as_millis()
                            ),
                        })
                    })
            }
        };

        match &result {
            Ok(()) => debug!("[渲染] 会话已终止"),
            Err(e) => error!("[渲染] ❌ 会话终止失败: {}", e),
        }
        result
    }

    /// 为某个阶段加上超时与取消
    async fn bounded<T, F>(
        &self,
        stage: DispatchState,
        limit: Duration,
        cancel: &CancellationToken,
        fut: F,
    ) -> RenderResult<T>
    where
        F: Future<Output = RenderResult<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("[渲染] ⚠️ {} 阶段被取消", stage);
                Err(RenderError::Cancelled { stage })
            }
            outcome = tokio::time::timeout(limit, fut) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    error!("[渲染] ⏱️ {} 阶段超时 ({}ms)", stage, limit.as_millis());
                    Err(RenderError::Timeout { stage, limit })
                }
            },
        }
    }

    fn reset(&self) {
        self.state.send_replace(DispatchState::Idle);
        let mut history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        history.clear();
        history.push(DispatchState::Idle);
    }

    fn transition(&self, next: DispatchState) {
        let previous = self.state.send_replace(next);
        debug!("[渲染] 状态: {} → {}", previous, next);
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(next);
    }
}

/// 启动引擎前的检查：输入文档与资源都存在
async fn preflight(job: &RenderJob) -> RenderResult<Url> {
    let is_file = tokio::fs::metadata(&job.input)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(RenderError::InputNotFound {
            path: job.input.clone(),
        });
    }

    for resource in &job.resources {
        if tokio::fs::metadata(resource).await.is_err() {
            return Err(RenderError::MissingResource {
                path: resource.clone(),
            });
        }
    }

    let absolute = tokio::fs::canonicalize(&job.input)
        .await
        .map_err(|source| RenderError::Io {
            path: job.input.clone(),
            source,
        })?;
    Url::from_file_path(&absolute).map_err(|_| RenderError::LoadFailed {
        message: format!("无法转换为 file:// URL: {}", absolute.display()),
    })
}

/// 产物必须存在且非空
async fn verify_artifact(path: &Path) -> RenderResult<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        _ => Err(RenderError::EmptyArtifact {
            path: path.to_path_buf(),
        }),
    }
}

/// 失败时丢弃不完整的产物
async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("[渲染] 已删除不完整的产物: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("[渲染] ⚠️ 删除不完整的产物失败 {}: {}", path.display(), e),
    }
}
