//! 题库内存模型
//!
//! 由加载器一次性构建并校验，排版器只读使用。

use std::collections::BTreeSet;
use std::path::PathBuf;

/// 一次运行的完整题库，分区顺序即用户选择的顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionBank {
    pub sections: Vec<Section>,
}

impl QuestionBank {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// 题目总数
    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.question_count() == 0
    }
}

/// 一个文件夹对应一个分区
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// 文件夹名
    pub name: String,
    /// 文件夹路径
    pub path: PathBuf,
    pub questions: Vec<Question>,
}

impl Section {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    /// 由源路径派生的稳定标识，如 `chapter-1/q01.json`
    pub id: String,
    /// 记录里的题号（`question_number`），没有时按分区内序号显示
    pub label: Option<String>,
    pub prompt: RichText,
    pub options: Vec<AnswerOption>,
    /// 正确选项的下标，至少一个且全部在范围内
    pub correct: BTreeSet<usize>,
    pub explanation: Option<RichText>,
}

impl Question {
    pub fn is_correct(&self, index: usize) -> bool {
        self.correct.contains(&index)
    }
}

/// 选项
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOption {
    pub content: RichText,
}

/// 富文本：按源顺序排列的片段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RichText {
    pub spans: Vec<Span>,
}

impl RichText {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            spans: vec![Span::Text(text.into())],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// 纯文本内容，用于日志预览
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            if let Span::Text(text) = span {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(text);
            }
        }
        out
    }

    /// 按出现顺序遍历所有图片（含表格单元格内的）
    pub fn images(&self) -> Vec<&ImageRef> {
        let mut found = Vec::new();
        collect_images(self, &mut found);
        found
    }
}

fn collect_images<'a>(text: &'a RichText, found: &mut Vec<&'a ImageRef>) {
    for span in &text.spans {
        match span {
            Span::Text(_) => {}
            Span::Image(image) => found.push(image),
            Span::Table(table) => {
                for cell in table.header.iter().flatten() {
                    collect_images(cell, found);
                }
                for cell in table.cells.iter().flatten() {
                    collect_images(cell, found);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Span {
    Text(String),
    Image(ImageRef),
    Table(Table),
}

/// 已校验的图片引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// 绝对路径
    pub path: PathBuf,
    /// 根据文件内容识别出的 MIME 类型
    pub mime_type: &'static str,
}

/// 表格，`cells` 的形状与声明的行列数一致
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub rows: usize,
    pub columns: usize,
    /// 可选表头，长度等于 `columns`
    pub header: Option<Vec<RichText>>,
    pub cells: Vec<Vec<RichText>>,
}
