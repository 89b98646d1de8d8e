//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 对一组用户选定且已排好序的文件夹，按顺序驱动 加载 → 排版 → 渲染，
//! 通过通道汇报阶段进度，最终给出产物路径或结构化错误。
//!
//! ## 模块划分
//!
//! ### `pipeline` - 单次运行
//! - 在阶段边界检查取消
//! - 任一阶段失败立即终止后续阶段
//! - `spawn` 把整次运行放到后台任务，调用方不被阻塞
//!
//! ### `staging` - 原子输出
//! - 产物先写到输出目录下的隐藏临时文件
//! - 仅在渲染完全成功后改名到目标路径
//!
//! ## 层次关系
//!
//! ```text
//! pipeline (处理 Vec<文件夹>)
//!     ↓
//! models::loaders (文件夹 → QuestionBank)
//!     ↓
//! composer (QuestionBank → HTML)
//!     ↓
//! dispatcher (HTML → PDF，独占一个浏览器会话)
//! ```

pub mod pipeline;
pub mod staging;

use std::fmt;

use tokio::sync::mpsc;

pub use pipeline::{BuildOutcome, BuildRequest, Pipeline, PipelineHandle};
pub use staging::StagedArtifact;

/// 运行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Loading,
    Composing,
    Rendering,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Composing => "composing",
            Stage::Rendering => "rendering",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// 进度消息
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub stage: Stage,
    pub message: String,
}

impl Progress {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// 进度发送端
pub type ProgressSender = mpsc::UnboundedSender<Progress>;

/// 进度接收端
pub type ProgressReceiver = mpsc::UnboundedReceiver<Progress>;
