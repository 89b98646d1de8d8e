//! 基于 chromiumoxide 的渲染引擎

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Browser;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::engine::{RenderEngine, RenderSession};
use crate::browser::{launch_headless_browser, LaunchOptions};
use crate::config::{Config, PageGeometry};
use crate::error::{RenderError, RenderResult};
use crate::infrastructure::PageDriver;

/// 等待文档完全就绪：load 事件、字体、所有图片
///
/// 返回解码失败的图片 src（截断到 120 字符）
const RESOURCE_IDLE_SCRIPT: &str = r#"
(async () => {
    if (document.readyState !== 'complete') {
        await new Promise(resolve => window.addEventListener('load', resolve, { once: true }));
    }
    if (document.fonts && document.fonts.ready) {
        await document.fonts.ready;
    }
    const images = Array.from(document.images);
    await Promise.all(images.map(img => img.complete ? Promise.resolve() : new Promise(resolve => {
        img.addEventListener('load', resolve, { once: true });
        img.addEventListener('error', resolve, { once: true });
    })));
    return images
        .filter(img => img.naturalWidth === 0)
        .map(img => (img.getAttribute('src') || '').slice(0, 120));
})()
"#;

/// Chrome 启动选项
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub executable: Option<PathBuf>,
    pub no_sandbox: bool,
    /// 单个 CDP 请求的超时
    pub request_timeout: Duration,
    /// 正常关闭的等待时间，超过即强制结束进程
    pub shutdown_grace: Duration,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            executable: None,
            no_sandbox: false,
            request_timeout: Duration::from_secs(120),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Chrome 渲染引擎
pub struct ChromeEngine {
    options: ChromeOptions,
}

impl ChromeEngine {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &Config) -> Self {
        // 单个请求不应比最长的阶段还长
        let longest_stage = config
            .content_load_timeout_ms
            .max(config.render_timeout_ms);
        Self::new(ChromeOptions {
            executable: config.chrome_executable.clone(),
            no_sandbox: config.no_sandbox,
            request_timeout: Duration::from_millis(longest_stage),
            shutdown_grace: Duration::from_millis(config.shutdown_timeout_ms),
        })
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn launch(&self) -> RenderResult<Box<dyn RenderSession>> {
        let profile = tempfile::Builder::new()
            .prefix("qbank-chrome-")
            .tempdir()
            .map_err(|e| RenderError::LaunchFailed {
                message: format!("无法创建浏览器用户目录: {}", e),
            })?;

        let options = LaunchOptions {
            executable: self.options.executable.as_deref(),
            no_sandbox: self.options.no_sandbox,
            profile_dir: profile.path(),
            request_timeout: self.options.request_timeout,
        };
        let (browser, handler) = launch_headless_browser(&options)
            .await
            .map_err(|e| RenderError::LaunchFailed {
                message: e.to_string(),
            })?;

        Ok(Box::new(ChromeSession {
            browser,
            handler,
            driver: None,
            profile: Some(profile),
            shutdown_grace: self.options.shutdown_grace,
            close_requested: false,
            terminated: false,
        }))
    }
}

/// 一个 Chrome 进程及其页面
struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    driver: Option<PageDriver>,
    profile: Option<TempDir>,
    shutdown_grace: Duration,
    /// 已经请求过正常关闭，再次终止时直接强制结束
    close_requested: bool,
    terminated: bool,
}

impl ChromeSession {
    fn driver(&self) -> RenderResult<&PageDriver> {
        self.driver.as_ref().ok_or_else(|| RenderError::LoadFailed {
            message: "文档尚未载入".to_string(),
        })
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn load_document(&mut self, url: &Url) -> RenderResult<()> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::LoadFailed {
                message: format!("创建页面失败: {}", e),
            })?;
        let driver = PageDriver::new(page);
        driver
            .navigate(url.as_str())
            .await
            .map_err(|e| RenderError::LoadFailed {
                message: format!("导航到 {} 失败: {}", url, e),
            })?;
        debug!("已导航到: {}", url);
        self.driver = Some(driver);
        Ok(())
    }

    async fn wait_for_resources(&mut self) -> RenderResult<()> {
        let failed: Vec<String> = self
            .driver()?
            .eval_as(RESOURCE_IDLE_SCRIPT)
            .await
            .map_err(|e| RenderError::LoadFailed {
                message: format!("等待资源加载失败: {}", e),
            })?;

        if failed.is_empty() {
            debug!("全部资源已加载");
            Ok(())
        } else {
            Err(RenderError::ResourceLoadFailed { failed })
        }
    }

    async fn print_to_file(&mut self, geometry: &PageGeometry, output: &Path) -> RenderResult<()> {
        let bytes = self
            .driver()?
            .save_pdf(print_params(geometry), output)
            .await
            .map_err(|e| RenderError::RenderFailed {
                message: e.to_string(),
            })?;
        debug!("PDF 已写出: {} 字节", bytes);
        Ok(())
    }

    async fn release_document(&mut self) -> RenderResult<()> {
        if let Some(driver) = self.driver.take() {
            driver.close().await.map_err(|e| RenderError::RenderFailed {
                message: format!("关闭页面失败: {}", e),
            })?;
            debug!("页面已关闭");
        }
        Ok(())
    }

    async fn terminate(&mut self) -> RenderResult<()> {
        if self.terminated {
            return Ok(());
        }
        self.driver = None;

        // 关闭与等待退出合计占一份 grace，强制结束再占一份
        let half = self.shutdown_grace / 2;
        let exited = if self.close_requested {
            warn!("⚠️ 上次终止未完成，直接强制结束");
            false
        } else {
            self.close_requested = true;
            match tokio::time::timeout(half, self.browser.close()).await {
                Ok(Ok(_)) => debug!("浏览器已请求关闭"),
                Ok(Err(e)) => warn!("⚠️ 关闭浏览器失败，将强制结束: {}", e),
                Err(_) => warn!("⚠️ 关闭浏览器超时，将强制结束"),
            }
            matches!(
                tokio::time::timeout(half, self.browser.wait()).await,
                Ok(Ok(_))
            )
        };

        if !exited {
            let killed = tokio::time::timeout(self.shutdown_grace, self.browser.kill()).await;
            self.handler.abort();
            match killed {
                Ok(Some(Err(e))) => {
                    return Err(RenderError::TerminateFailed {
                        message: format!("无法结束浏览器进程: {}", e),
                    })
                }
                Err(_) => {
                    return Err(RenderError::TerminateFailed {
                        message: format!(
                            "{}ms 内未能结束浏览器进程",
                            self.shutdown_grace.as_millis()
                        ),
                    })
                }
                Ok(_) => info!("🛑 浏览器进程已被强制结束"),
            }
        }

        self.handler.abort();
        self.terminated = true;
        if let Some(profile) = self.profile.take() {
            if let Err(e) = profile.close() {
                warn!("⚠️ 清理浏览器用户目录失败: {}", e);
            }
        }
        Ok(())
    }
}

/// 打印参数：纸张与页边距换算为英寸，保留背景色
pub fn print_params(geometry: &PageGeometry) -> PrintToPdfParams {
    let margin = geometry.margin_in();
    PrintToPdfParams {
        print_background: Some(true),
        paper_width: Some(geometry.width_in()),
        paper_height: Some(geometry.height_in()),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        prefer_css_page_size: Some(false),
        display_header_footer: Some(false),
        ..Default::default()
    }
}
