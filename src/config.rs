use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::composer::ComposerConfig;
use crate::dispatcher::DispatcherConfig;
use crate::error::ConfigError;

/// 毫米到英寸
const MM_PER_INCH: f64 = 25.4;

/// 页面几何：纸张尺寸与四边统一页边距（单位：毫米）
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_mm: f64,
}

impl Default for PageGeometry {
    /// A4，1cm 页边距
    fn default() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_mm: 10.0,
        }
    }
}

impl PageGeometry {
    pub fn width_in(&self) -> f64 {
        self.width_mm / MM_PER_INCH
    }

    pub fn height_in(&self) -> f64 {
        self.height_mm / MM_PER_INCH
    }

    pub fn margin_in(&self) -> f64 {
        self.margin_mm / MM_PER_INCH
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 浏览器可执行文件，为空时由 chromiumoxide 自动查找
    pub chrome_executable: Option<PathBuf>,
    /// 是否以 --no-sandbox 启动（仅在宿主环境要求时开启，如容器内 root）
    pub no_sandbox: bool,
    /// 启动浏览器的超时
    pub launch_timeout_ms: u64,
    /// 等待文档及其资源加载完成的超时
    pub content_load_timeout_ms: u64,
    /// 分页与打印的超时
    pub render_timeout_ms: u64,
    /// 校验产物的超时
    pub finalize_timeout_ms: u64,
    /// 关闭浏览器时等待其正常退出的时间，超过则强制结束
    pub shutdown_timeout_ms: u64,
    /// 页面几何
    pub page: PageGeometry,
    /// 是否把图片以 base64 内嵌进文档
    pub embed_resources: bool,
    /// 文档标题
    pub document_title: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            no_sandbox: false,
            launch_timeout_ms: 30_000,
            content_load_timeout_ms: 60_000,
            render_timeout_ms: 120_000,
            finalize_timeout_ms: 10_000,
            shutdown_timeout_ms: 5_000,
            page: PageGeometry::default(),
            embed_resources: false,
            document_title: "Question Bank".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认配置叠加环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，再叠加环境变量
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.with_env_overrides())
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> Self {
        let current = self;
        Self {
            chrome_executable: std::env::var("QBANK_CHROME_PATH").ok().map(PathBuf::from).or(current.chrome_executable),
            no_sandbox: std::env::var("QBANK_NO_SANDBOX").ok().and_then(|v| v.parse().ok()).unwrap_or(current.no_sandbox),
            launch_timeout_ms: std::env::var("QBANK_LAUNCH_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(current.launch_timeout_ms),
            content_load_timeout_ms: std::env::var("QBANK_CONTENT_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(current.content_load_timeout_ms),
            render_timeout_ms: std::env::var("QBANK_RENDER_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(current.render_timeout_ms),
            finalize_timeout_ms: std::env::var("QBANK_FINALIZE_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(current.finalize_timeout_ms),
            shutdown_timeout_ms: std::env::var("QBANK_SHUTDOWN_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(current.shutdown_timeout_ms),
            page: PageGeometry {
                margin_mm: std::env::var("QBANK_PAGE_MARGIN_MM").ok().and_then(|v| v.parse().ok()).unwrap_or(current.page.margin_mm),
                ..current.page
            },
            embed_resources: std::env::var("QBANK_EMBED_RESOURCES").ok().and_then(|v| v.parse().ok()).unwrap_or(current.embed_resources),
            document_title: std::env::var("QBANK_DOCUMENT_TITLE").unwrap_or(current.document_title),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(current.verbose_logging),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("launch_timeout_ms", self.launch_timeout_ms),
            ("content_load_timeout_ms", self.content_load_timeout_ms),
            ("render_timeout_ms", self.render_timeout_ms),
            ("finalize_timeout_ms", self.finalize_timeout_ms),
            ("shutdown_timeout_ms", self.shutdown_timeout_ms),
        ];
        for (key, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    message: "超时必须大于 0".to_string(),
                });
            }
        }

        let page = &self.page;
        if page.width_mm <= 0.0 || page.height_mm <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "page".to_string(),
                message: format!("纸张尺寸非法: {}x{}mm", page.width_mm, page.height_mm),
            });
        }
        if page.margin_mm < 0.0
            || page.margin_mm * 2.0 >= page.width_mm
            || page.margin_mm * 2.0 >= page.height_mm
        {
            return Err(ConfigError::Invalid {
                key: "page.margin_mm".to_string(),
                message: format!("页边距 {}mm 没有留下可打印区域", page.margin_mm),
            });
        }

        Ok(())
    }

    /// 排版器使用的配置
    pub fn composer_config(&self) -> ComposerConfig {
        ComposerConfig {
            geometry: self.page,
            embed_resources: self.embed_resources,
            title: self.document_title.clone(),
        }
    }

    /// 分发器使用的配置
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            launch_timeout: Duration::from_millis(self.launch_timeout_ms),
            content_load_timeout: Duration::from_millis(self.content_load_timeout_ms),
            render_timeout: Duration::from_millis(self.render_timeout_ms),
            finalize_timeout: Duration::from_millis(self.finalize_timeout_ms),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
            geometry: self.page,
        }
    }
}
