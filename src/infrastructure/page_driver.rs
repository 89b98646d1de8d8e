//! 页面驱动 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"导航 / 执行 JS / 打印 / 关闭"几种能力

use std::path::Path;

use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// 页面驱动
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 不认识题目 / 题库
/// - 不处理超时，超时由分发器统一控制
pub struct PageDriver {
    page: Page,
}

impl PageDriver {
    /// 创建新的页面驱动
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 导航到指定 URL 并等待页面加载事件
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// 表达式返回 Promise 时等待其完成
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 打印为 PDF 并写入文件，返回字节数
    pub async fn save_pdf(&self, params: PrintToPdfParams, output: &Path) -> Result<usize> {
        let bytes = self.page.save_pdf(params, output).await?;
        Ok(bytes.len())
    }

    /// 关闭页面，释放渲染进程中的文档
    pub async fn close(self) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}
