//! 集成测试共用的夹具与假渲染引擎
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;
use url::Url;

use qbank_pdf::config::{Config, PageGeometry};
use qbank_pdf::dispatcher::{RenderEngine, RenderSession};
use qbank_pdf::error::{RenderError, RenderResult};

// ========== 题库夹具 ==========

/// 临时目录下的题库
pub struct BankFixture {
    dir: TempDir,
}

impl BankFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("创建临时目录失败"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// 创建（或返回已有的）题库文件夹
    pub fn folder(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path).expect("创建文件夹失败");
        path
    }

    /// 写入一个 JSON 记录文件
    pub fn write_record(&self, folder: &str, file: &str, record: JsonValue) -> PathBuf {
        let path = self.folder(folder).join(file);
        let content = serde_json::to_string_pretty(&record).expect("序列化记录失败");
        std::fs::write(&path, content).expect("写入记录失败");
        path
    }

    /// 写入任意文本文件
    pub fn write_raw(&self, folder: &str, file: &str, content: &str) -> PathBuf {
        let path = self.folder(folder).join(file);
        std::fs::write(&path, content).expect("写入文件失败");
        path
    }

    /// 写入一张 4x4 的 PNG
    pub fn write_png(&self, folder: &str, file: &str) -> PathBuf {
        let path = self.folder(folder).join(file);
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
        image.save(&path).expect("写入图片失败");
        path
    }

    /// 写入一个 HTML 文档（用于直接测试分发器）
    pub fn write_document(&self, name: &str, html: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, html).expect("写入文档失败");
        path
    }

    /// 输出路径（不创建文件）
    pub fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join("out").join(name)
    }
}

/// 三个选项、第二个正确的题目
pub fn simple_question(prompt: &str) -> JsonValue {
    json!({
        "prompt": prompt,
        "options": ["3", "4", "5"],
        "correct": [1]
    })
}

/// 超时都很短的配置
pub fn fast_config() -> Config {
    Config {
        launch_timeout_ms: 2_000,
        content_load_timeout_ms: 2_000,
        render_timeout_ms: 2_000,
        finalize_timeout_ms: 1_000,
        shutdown_timeout_ms: 500,
        page: PageGeometry::default(),
        ..Config::default()
    }
}

// ========== 假渲染引擎 ==========

/// 假引擎在各阶段的行为
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    /// 一切正常
    Succeed,
    /// 资源加载很慢，但最终完成
    SlowResources(Duration),
    /// 资源永远加载不完
    HangOnResources,
    /// 打印时崩溃，留下半个文件
    CrashDuringRender,
    /// 打印成功但产物为空
    EmptyOutput,
    /// 无法启动
    FailLaunch,
    /// 启动永远不返回
    HangOnLaunch,
    /// 打印写出一半后卡住
    HangOnPrint,
    /// 打印完成，关闭页面时卡住
    HangOnFinalize,
    /// 浏览器卡死：正常关闭与等待退出各耗时给定时长，之后强制结束
    FrozenBrowser(Duration),
    /// 第一次终止永远卡住，第二次直接强制结束
    StuckTerminate,
}

/// 记录引擎被如何使用
#[derive(Debug, Default)]
pub struct Probe {
    launched: AtomicUsize,
    terminated: AtomicUsize,
    events: Mutex<Vec<&'static str>>,
}

impl Probe {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().expect("事件锁中毒").clone()
    }

    fn record(&self, event: &'static str) {
        self.events.lock().expect("事件锁中毒").push(event);
    }
}

/// 可编排行为的假引擎
///
/// 成功时写出 `%PDF-fake` 加上原始 HTML，方便断言内容顺序。
pub struct FakeEngine {
    behavior: Behavior,
    probe: Arc<Probe>,
}

impl FakeEngine {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn probe(&self) -> Arc<Probe> {
        self.probe.clone()
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn launch(&self) -> RenderResult<Box<dyn RenderSession>> {
        match self.behavior {
            Behavior::FailLaunch => {
                return Err(RenderError::LaunchFailed {
                    message: "fake engine refused to start".to_string(),
                })
            }
            Behavior::HangOnLaunch => std::future::pending::<()>().await,
            _ => {}
        }
        self.probe.launched.fetch_add(1, Ordering::SeqCst);
        self.probe.record("launch");
        Ok(Box::new(FakeSession {
            behavior: self.behavior,
            probe: self.probe.clone(),
            document: None,
            close_requested: false,
            terminated: false,
        }))
    }
}

struct FakeSession {
    behavior: Behavior,
    probe: Arc<Probe>,
    document: Option<String>,
    close_requested: bool,
    terminated: bool,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn load_document(&mut self, url: &Url) -> RenderResult<()> {
        let path = url.to_file_path().map_err(|_| RenderError::LoadFailed {
            message: format!("not a file url: {}", url),
        })?;
        let html = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RenderError::LoadFailed {
                message: e.to_string(),
            })?;
        self.document = Some(html);
        self.probe.record("load");
        Ok(())
    }

    async fn wait_for_resources(&mut self) -> RenderResult<()> {
        match self.behavior {
            Behavior::SlowResources(delay) => tokio::time::sleep(delay).await,
            Behavior::HangOnResources => std::future::pending::<()>().await,
            _ => {}
        }
        self.probe.record("resources-idle");
        Ok(())
    }

    async fn print_to_file(&mut self, _geometry: &PageGeometry, output: &Path) -> RenderResult<()> {
        self.probe.record("print");
        let io_err = |source| RenderError::Io {
            path: output.to_path_buf(),
            source,
        };
        match self.behavior {
            Behavior::CrashDuringRender => {
                tokio::fs::write(output, b"%PDF-1.7 truncated")
                    .await
                    .map_err(io_err)?;
                Err(RenderError::RenderFailed {
                    message: "fake engine crashed".to_string(),
                })
            }
            Behavior::EmptyOutput => tokio::fs::write(output, b"").await.map_err(io_err),
            Behavior::HangOnPrint => {
                tokio::fs::write(output, b"%PDF-1.7 partial")
                    .await
                    .map_err(io_err)?;
                std::future::pending().await
            }
            _ => {
                let body = format!("%PDF-fake\n{}", self.document.as_deref().unwrap_or_default());
                tokio::fs::write(output, body).await.map_err(io_err)
            }
        }
    }

    async fn release_document(&mut self) -> RenderResult<()> {
        if self.behavior == Behavior::HangOnFinalize {
            std::future::pending::<()>().await;
        }
        self.document = None;
        Ok(())
    }

    async fn terminate(&mut self) -> RenderResult<()> {
        if self.terminated {
            return Ok(());
        }
        let first_attempt = !self.close_requested;
        self.close_requested = true;
        match self.behavior {
            Behavior::FrozenBrowser(stall) if first_attempt => {
                tokio::time::sleep(stall).await;
                tokio::time::sleep(stall).await;
                self.probe.record("kill");
            }
            Behavior::StuckTerminate if first_attempt => std::future::pending::<()>().await,
            Behavior::StuckTerminate => self.probe.record("kill"),
            _ => {}
        }
        self.terminated = true;
        self.probe.terminated.fetch_add(1, Ordering::SeqCst);
        self.probe.record("terminate");
        Ok(())
    }
}
