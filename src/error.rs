//! 错误类型
//!
//! 每个组件只产出自己的错误类型，顶层 [`AppError`] 负责汇总：
//!
//! - [`ContentError`] - 题库数据非法（加载器）
//! - [`LayoutError`] - 排版时发现内部不一致（排版器）
//! - [`RenderError`] - 渲染引擎启动/崩溃/超时（分发器）
//! - [`ConfigError`] - 配置非法
//!
//! 任何错误都不会被降级为警告，出错即终止本次运行。

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::dispatcher::DispatchState;
use crate::orchestrator::Stage;

/// 题库内容错误
///
/// 所有变体都携带出错的文件夹与题目标识，方便直接定位源文件。
#[derive(Debug, Error)]
pub enum ContentError {
    /// 文件夹不存在或不是目录
    #[error("[{folder}] 题库文件夹不存在")]
    FolderNotFound { folder: String },

    /// 读取记录文件失败
    #[error("[{folder}/{question}] 读取文件失败: {source}")]
    ReadFailed {
        folder: String,
        question: String,
        #[source]
        source: std::io::Error,
    },

    /// 记录文件无法解析
    #[error("[{folder}/{question}] 解析失败: {message}")]
    ParseFailed {
        folder: String,
        question: String,
        message: String,
    },

    /// 选项数量不足
    #[error("[{folder}/{question}] 选项数量不足: {count} (至少需要 2 个)")]
    TooFewOptions {
        folder: String,
        question: String,
        count: usize,
    },

    /// 没有标记任何正确答案
    #[error("[{folder}/{question}] 未标记正确答案")]
    NoCorrectAnswer { folder: String, question: String },

    /// 正确答案索引越界
    #[error("[{folder}/{question}] 正确答案索引 {index} 超出范围 (共 {options} 个选项)")]
    CorrectIndexOutOfRange {
        folder: String,
        question: String,
        index: usize,
        options: usize,
    },

    /// 表格声明的行列数与实际内容不符
    #[error("[{folder}/{question}] 表格尺寸不匹配: {detail}")]
    TableShapeMismatch {
        folder: String,
        question: String,
        detail: String,
    },

    /// 引用的图片不存在
    #[error("[{folder}/{question}] 图片不存在: {}", path.display())]
    MissingImage {
        folder: String,
        question: String,
        path: PathBuf,
    },

    /// 图片无法读取或不是可识别的图片格式
    #[error("[{folder}/{question}] 图片无法识别 ({}): {reason}", path.display())]
    UnreadableImage {
        folder: String,
        question: String,
        path: PathBuf,
        reason: String,
    },

    /// 选中的文件夹里一道题都没有
    #[error("选中的 {folders} 个文件夹中没有任何题目")]
    EmptyBank { folders: usize },
}

impl ContentError {
    /// 出错的文件夹（整个题库级别的错误时为 `None`）
    pub fn folder(&self) -> Option<&str> {
        let folder = match self {
            ContentError::EmptyBank { .. } => return None,
            ContentError::FolderNotFound { folder }
            | ContentError::ReadFailed { folder, .. }
            | ContentError::ParseFailed { folder, .. }
            | ContentError::TooFewOptions { folder, .. }
            | ContentError::NoCorrectAnswer { folder, .. }
            | ContentError::CorrectIndexOutOfRange { folder, .. }
            | ContentError::TableShapeMismatch { folder, .. }
            | ContentError::MissingImage { folder, .. }
            | ContentError::UnreadableImage { folder, .. } => folder,
        };
        Some(folder)
    }

    /// 出错的题目（文件夹级错误时为 `None`）
    pub fn question(&self) -> Option<&str> {
        match self {
            ContentError::FolderNotFound { .. } | ContentError::EmptyBank { .. } => None,
            ContentError::ReadFailed { question, .. }
            | ContentError::ParseFailed { question, .. }
            | ContentError::TooFewOptions { question, .. }
            | ContentError::NoCorrectAnswer { question, .. }
            | ContentError::CorrectIndexOutOfRange { question, .. }
            | ContentError::TableShapeMismatch { question, .. }
            | ContentError::MissingImage { question, .. }
            | ContentError::UnreadableImage { question, .. } => Some(question),
        }
    }
}

/// 排版错误
///
/// 加载器校验通过后不应出现，出现即视为缺陷。
#[derive(Debug, Error)]
pub enum LayoutError {
    /// 资源在排版时已无法找到
    #[error("[{question}] 资源无法解析: {}", path.display())]
    UnresolvedResource { question: String, path: PathBuf },

    /// 内嵌资源时读取失败
    #[error("[{question}] 读取资源失败 ({}): {source}", path.display())]
    ResourceRead {
        question: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 路径无法转换为 file:// URI
    #[error("[{question}] 资源路径无法转换为 URI: {}", path.display())]
    InvalidResourcePath { question: String, path: PathBuf },
}

/// 渲染错误
#[derive(Debug, Error)]
pub enum RenderError {
    /// 输入文档不存在
    #[error("输入文档不存在: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// 资源清单中的文件缺失
    #[error("资源文件缺失: {}", path.display())]
    MissingResource { path: PathBuf },

    /// 渲染引擎启动失败
    #[error("渲染引擎启动失败: {message}")]
    LaunchFailed { message: String },

    /// 文档载入失败
    #[error("文档载入失败: {message}")]
    LoadFailed { message: String },

    /// 有资源未能成功加载
    #[error("有 {} 个资源加载失败: {}", failed.len(), failed.join(", "))]
    ResourceLoadFailed { failed: Vec<String> },

    /// 渲染过程中引擎崩溃或返回错误
    #[error("渲染失败: {message}")]
    RenderFailed { message: String },

    /// 产物不存在或为空
    #[error("渲染产物为空或不存在: {}", path.display())]
    EmptyArtifact { path: PathBuf },

    /// 某个等待阶段超时
    #[error("{stage} 阶段超时 (上限 {}ms)", limit.as_millis())]
    Timeout {
        stage: DispatchState,
        limit: Duration,
    },

    /// 调用方取消
    #[error("{stage} 阶段被取消")]
    Cancelled { stage: DispatchState },

    /// 渲染会话终止失败
    #[error("渲染会话终止失败: {message}")]
    TerminateFailed { message: String },

    /// 文件读写失败
    #[error("文件错误 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    /// 是否为超时错误
    pub fn is_timeout(&self) -> bool {
        matches!(self, RenderError::Timeout { .. })
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("配置文件解析失败 ({}): {source}", path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// 配置值非法
    #[error("配置项 {key} 非法: {message}")]
    Invalid { key: String, message: String },
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("题库内容错误: {0}")]
    Content(#[from] ContentError),

    #[error("排版错误: {0}")]
    Layout(#[from] LayoutError),

    #[error("渲染错误: {0}")]
    Render(#[from] RenderError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 调用方在阶段边界取消
    #[error("任务已取消 (阶段: {stage})")]
    Cancelled { stage: Stage },

    #[error("文件错误 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 后台任务异常退出（panic 或被中止）
    #[error("后台任务异常退出: {0}")]
    TaskFailed(String),
}

/// 错误类别，供调用方做结构化处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Content,
    Layout,
    Render,
    Timeout,
    Cancelled,
    Config,
    Io,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Content => "content",
            ErrorKind::Layout => "layout",
            ErrorKind::Render => "render",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl AppError {
    /// 返回错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Content(_) => ErrorKind::Content,
            AppError::Layout(_) => ErrorKind::Layout,
            AppError::Render(RenderError::Timeout { .. }) => ErrorKind::Timeout,
            AppError::Render(RenderError::Cancelled { .. }) | AppError::Cancelled { .. } => {
                ErrorKind::Cancelled
            }
            AppError::Render(_) => ErrorKind::Render,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Io { .. } => ErrorKind::Io,
            AppError::TaskFailed(_) => ErrorKind::Internal,
        }
    }

    /// 创建文件错误
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 渲染结果类型
pub type RenderResult<T> = Result<T, RenderError>;
