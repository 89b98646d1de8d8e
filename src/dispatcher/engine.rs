//! 渲染引擎接口
//!
//! 分发器只通过这两个 trait 与外部引擎交互，方便替换实现（如测试用的假引擎）。

use std::path::Path;

use async_trait::async_trait;
use url::Url;

use crate::config::PageGeometry;
use crate::error::RenderResult;

/// 渲染引擎：每次 `launch` 启动一个独立会话
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// 引擎名称（用于日志）
    fn name(&self) -> &str;

    /// 启动一个新会话，会话由调用方独占
    async fn launch(&self) -> RenderResult<Box<dyn RenderSession>>;
}

/// 一个渲染会话
///
/// 调用方保证无论成功失败都会调用 [`RenderSession::terminate`]。
#[async_trait]
pub trait RenderSession: Send {
    /// 载入文档
    async fn load_document(&mut self, url: &Url) -> RenderResult<()>;

    /// 等待文档中的全部资源（图片、字体）加载完成
    async fn wait_for_resources(&mut self) -> RenderResult<()>;

    /// 按页面几何分页并写出产物
    async fn print_to_file(&mut self, geometry: &PageGeometry, output: &Path) -> RenderResult<()>;

    /// 打印完成后关闭文档页面，产物在此之后才被校验
    async fn release_document(&mut self) -> RenderResult<()>;

    /// 结束会话并释放所有资源，必须可重复调用
    ///
    /// 上一次调用被超时打断后，再次调用应当跳过正常关闭直接强制结束。
    async fn terminate(&mut self) -> RenderResult<()>;
}
