//! # qbank-pdf
//!
//! 把题库文件夹排版成可打印 PDF 的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的线性流水线，每层只消费上一层的输出：
//!
//! ### ① 模型层（Models）
//! - `models/` - 题库内存模型与加载器
//! - `load_question_bank` - 按用户给定顺序加载文件夹，一次性完成全部校验
//!
//! ### ② 排版层（Composer）
//! - `composer/` - 把 QuestionBank 转换为确定性的 HTML 文档
//! - `Composer` - 分区分页、题目不拆分、图片表格原位输出
//!
//! ### ③ 基础设施层（Infrastructure）
//! - `browser/` - 启动无头浏览器
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `PageDriver` - 唯一的 page owner，提供导航 / eval / 打印
//!
//! ### ④ 渲染分发层（Dispatcher）
//! - `dispatcher/` - 状态机驱动一次渲染，每个阶段有超时，会话必定被终止
//! - `RenderEngine` - 引擎接口，`ChromeEngine` 为默认实现
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/pipeline` - 加载 → 排版 → 渲染，汇报进度，响应取消
//! - `orchestrator/staging` - 产物先暂存，成功后再移动到目标路径
//!
//! ## 模块结构

pub mod browser;
pub mod composer;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod utils;

// 重新导出常用类型
pub use composer::{ComposedDocument, Composer, ComposerConfig};
pub use config::{Config, PageGeometry};
pub use dispatcher::{
    ChromeEngine, DispatchReport, DispatchState, Dispatcher, DispatcherConfig, RenderEngine,
    RenderJob, RenderSession,
};
pub use error::{AppError, AppResult, ContentError, ErrorKind, LayoutError, RenderError};
pub use infrastructure::PageDriver;
pub use models::{list_bank_folders, load_question_bank, QuestionBank};
pub use orchestrator::{BuildOutcome, BuildRequest, Pipeline, PipelineHandle, Progress, Stage};
