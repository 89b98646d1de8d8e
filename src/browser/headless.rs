use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// 启动参数
#[derive(Debug, Clone)]
pub struct LaunchOptions<'a> {
    /// 浏览器可执行文件，`None` 时自动查找
    pub executable: Option<&'a Path>,
    /// 仅在宿主环境要求时开启
    pub no_sandbox: bool,
    /// 每个会话独立的用户数据目录
    pub profile_dir: &'a Path,
    /// 单个 CDP 请求的超时
    pub request_timeout: Duration,
}

/// 启动无头浏览器
///
/// 返回浏览器与后台事件处理任务，调用方负责关闭两者。
pub async fn launch_headless_browser(options: &LaunchOptions<'_>) -> Result<(Browser, JoinHandle<()>)> {
    info!("🚀 启动无头浏览器...");
    debug!(
        "可执行文件: {:?}, no_sandbox: {}, 用户目录: {}",
        options.executable,
        options.no_sandbox,
        options.profile_dir.display()
    );

    let mut builder = BrowserConfig::builder()
        .new_headless_mode()
        .user_data_dir(options.profile_dir)
        .request_timeout(options.request_timeout)
        .args(vec![
            "--disable-gpu",                  // 无头打印不需要 GPU
            "--disable-dev-shm-usage",        // 防止共享内存不足
            "--allow-file-access-from-files", // 文档与图片都是本地文件
            "--hide-scrollbars",
        ]);
    if let Some(executable) = options.executable {
        builder = builder.chrome_executable(executable);
    }
    if options.no_sandbox {
        builder = builder.no_sandbox();
    }

    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        anyhow::anyhow!("配置无头浏览器失败: {}", e)
    })?;

    // 启动浏览器
    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        anyhow::anyhow!("启动无头浏览器失败: {}", e)
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok((browser, handler_task))
}
