//! 排版层（Composer）
//!
//! ## 职责
//!
//! 把已校验的 [`QuestionBank`] 转换成一份 HTML 文档，交给渲染引擎分页打印。
//!
//! ## 规则
//!
//! - 分区按题库顺序输出，题目按加载顺序输出
//! - 每题依次为：题干 → 选项（正确选项只加样式标记）→ 答案 → 解析
//! - 除第一个分区外，每个分区前插入分页标记；题目整体不可拆分
//! - 图片、表格严格出现在富文本中的原位置
//! - 同一份题库多次排版，输出逐字节一致
//!
//! 排版器不测量文字高度，溢出交给渲染引擎处理。

mod html;
mod resources;
mod styles;

use std::path::PathBuf;

use tracing::debug;

use crate::config::PageGeometry;
use crate::error::LayoutError;
use crate::models::QuestionBank;

pub use html::{escape_html, option_letter};
pub use styles::stylesheet;

/// 排版配置
#[derive(Clone, Debug, PartialEq)]
pub struct ComposerConfig {
    pub geometry: PageGeometry,
    /// 图片以 data URI 内嵌，而不是 file:// 引用
    pub embed_resources: bool,
    pub title: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            embed_resources: false,
            title: "Question Bank".to_string(),
        }
    }
}

/// 排版结果
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedDocument {
    /// 完整的 HTML 文档
    pub html: String,
    /// 文档引用的外部资源（按首次出现顺序，不重复；内嵌模式下为空）
    pub resources: Vec<PathBuf>,
    /// 实际输出的分区数（空分区不计）
    pub section_count: usize,
    pub question_count: usize,
}

/// 排版器
pub struct Composer {
    config: ComposerConfig,
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// 排版整个题库
    pub fn compose(&self, bank: &QuestionBank) -> Result<ComposedDocument, LayoutError> {
        let mut resources = resources::ResourceTable::new(self.config.embed_resources);
        let mut writer = html::MarkupWriter::new(&mut resources);

        writer.begin_document(&self.config.title, &stylesheet(&self.config.geometry));

        let mut section_count = 0;
        let mut question_count = 0;
        for section in bank.sections.iter().filter(|s| !s.is_empty()) {
            if section_count > 0 {
                writer.page_break();
            }
            writer.section(section)?;
            section_count += 1;
            question_count += section.questions.len();
        }

        writer.end_document();
        let html = writer.finish();

        debug!(
            "排版完成: {} 个分区, {} 道题目, {} 字节",
            section_count,
            question_count,
            html.len()
        );

        Ok(ComposedDocument {
            html,
            resources: resources.into_manifest(),
            section_count,
            question_count,
        })
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(ComposerConfig::default())
    }
}
