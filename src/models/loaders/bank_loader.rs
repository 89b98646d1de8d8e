//! 题库加载器
//!
//! 按用户给定的文件夹顺序加载分区，文件夹内按记录文件名字节序加载题目。
//! 所有约束在这里一次性校验完，任一失败则整个题库加载失败。

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use serde_json::Value as JsonValue;
use tokio::fs;
use tracing::{debug, info};

use super::record::{
    parse_records, QuestionRecord, RawOption, RawRichText, RawSpan, RecordFormat, VlmTableData,
};
use crate::error::ContentError;
use crate::models::question::{
    AnswerOption, ImageRef, Question, QuestionBank, RichText, Section, Span, Table,
};
use crate::utils::{natural_cmp, truncate_text};

/// 加载整个题库
///
/// 文件夹之间并发读取，结果严格按 `folders` 的顺序排列。
/// 多个文件夹出错时返回顺序最靠前的那个错误。
pub async fn load_question_bank(folders: &[PathBuf]) -> Result<QuestionBank, ContentError> {
    let results = join_all(folders.iter().map(|folder| load_section(folder))).await;

    let mut sections = Vec::with_capacity(results.len());
    for result in results {
        sections.push(result?);
    }

    Ok(QuestionBank::new(sections))
}

/// 加载单个文件夹为一个分区
pub async fn load_section(folder: &Path) -> Result<Section, ContentError> {
    let name = folder_name(folder);

    let is_dir = fs::metadata(folder)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(ContentError::FolderNotFound { folder: name });
    }

    let record_files = list_record_files(folder, &name).await?;
    debug!("[分区 {}] 找到 {} 个记录文件", name, record_files.len());

    let mut questions = Vec::new();
    for (file_name, path, format) in record_files {
        let content = fs::read_to_string(&path)
            .await
            .map_err(|source| ContentError::ReadFailed {
                folder: name.clone(),
                question: file_name.clone(),
                source,
            })?;

        let ctx = RecordContext {
            folder: name.clone(),
            folder_path: folder.to_path_buf(),
            file_name,
        };

        // 解析与图片探测是同步 IO，放到阻塞线程池
        let loaded = tokio::task::spawn_blocking(move || ctx.build_all(&content, format))
            .await
            .map_err(|e| ContentError::ParseFailed {
                folder: name.clone(),
                question: path.display().to_string(),
                message: format!("加载任务异常退出: {}", e),
            })??;
        for question in &loaded {
            debug!(
                "[分区 {}] {} → {}",
                name,
                question.id,
                truncate_text(&question.prompt.plain_text(), 40)
            );
        }
        questions.extend(loaded);
    }

    info!("[分区 {}] ✓ 加载 {} 道题目", name, questions.len());

    Ok(Section {
        name,
        path: folder.to_path_buf(),
        questions,
    })
}

/// 列出根目录下的所有子文件夹（自然序）
pub async fn list_bank_folders(root: &Path) -> Result<Vec<PathBuf>, ContentError> {
    let root_name = folder_name(root);
    let mut entries = fs::read_dir(root)
        .await
        .map_err(|_| ContentError::FolderNotFound {
            folder: root_name.clone(),
        })?;

    let mut folders = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| ContentError::ReadFailed {
            folder: root_name.clone(),
            question: String::new(),
            source,
        })?
    {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            folders.push(entry.path());
        }
    }

    folders.sort_by(|a, b| natural_cmp(&folder_name(a), &folder_name(b)));
    Ok(folders)
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| folder.display().to_string())
}

/// 收集记录文件并按文件名排序
async fn list_record_files(
    folder: &Path,
    name: &str,
) -> Result<Vec<(String, PathBuf, RecordFormat)>, ContentError> {
    let read_err = |source| ContentError::ReadFailed {
        folder: name.to_string(),
        question: String::new(),
        source,
    };

    let mut entries = fs::read_dir(folder).await.map_err(read_err)?;
    let mut files: Vec<(OsString, PathBuf, RecordFormat)> = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RecordFormat::from_extension);
        let Some(format) = format else {
            continue;
        };
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file {
            files.push((entry.file_name(), path, format));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(files
        .into_iter()
        .map(|(file_name, path, format)| (file_name.to_string_lossy().to_string(), path, format))
        .collect())
}

/// 正在构建的记录文件的上下文
struct RecordContext {
    folder: String,
    folder_path: PathBuf,
    file_name: String,
}

impl RecordContext {
    fn build_all(&self, content: &str, format: RecordFormat) -> Result<Vec<Question>, ContentError> {
        let records = parse_records(content, format).map_err(|message| ContentError::ParseFailed {
            folder: self.folder.clone(),
            question: self.file_name.clone(),
            message,
        })?;

        records
            .into_iter()
            .map(|(index, record)| {
                let question = match index {
                    Some(i) => format!("{}#{}", self.file_name, i),
                    None => self.file_name.clone(),
                };
                QuestionBuilder { ctx: self, question }.build(record)
            })
            .collect()
    }
}

/// 单道题的构建与校验
struct QuestionBuilder<'a> {
    ctx: &'a RecordContext,
    question: String,
}

impl QuestionBuilder<'_> {
    fn build(&self, record: QuestionRecord) -> Result<Question, ContentError> {
        let option_count = record.options.len();
        if option_count < 2 {
            return Err(ContentError::TooFewOptions {
                folder: self.ctx.folder.clone(),
                question: self.question.clone(),
                count: option_count,
            });
        }

        let mut correct = BTreeSet::new();
        for &index in &record.correct {
            if index >= option_count {
                return Err(ContentError::CorrectIndexOutOfRange {
                    folder: self.ctx.folder.clone(),
                    question: self.question.clone(),
                    index,
                    options: option_count,
                });
            }
            correct.insert(index);
        }

        let mut options = Vec::with_capacity(option_count);
        for (index, raw) in record.options.into_iter().enumerate() {
            let (content, flagged) = self.option(raw)?;
            if flagged {
                correct.insert(index);
            }
            options.push(AnswerOption { content });
        }

        if correct.is_empty() {
            return Err(ContentError::NoCorrectAnswer {
                folder: self.ctx.folder.clone(),
                question: self.question.clone(),
            });
        }

        let mut prompt = self.rich_text(record.prompt)?;
        if let Some(media) = record.question_media_path.filter(|p| !p.trim().is_empty()) {
            prompt.spans.push(Span::Image(self.image(&media)?));
        }

        let explanation = match record.explanation {
            Some(raw) => Some(self.rich_text(raw)?).filter(|text| !text.is_empty()),
            None => None,
        };

        Ok(Question {
            id: format!("{}/{}", self.ctx.folder, self.question),
            label: record.question_number,
            prompt,
            options,
            correct,
            explanation,
        })
    }

    fn option(&self, raw: RawOption) -> Result<(RichText, bool), ContentError> {
        match raw {
            RawOption::Plain(text) => Ok((RichText::plain(text), false)),
            RawOption::Detailed(detail) => {
                let mut content = match detail.text {
                    Some(text) => self.rich_text(text)?,
                    None => RichText::default(),
                };
                if let Some(image) = detail.image.filter(|p| !p.trim().is_empty()) {
                    content.spans.push(Span::Image(self.image(&image)?));
                }
                Ok((content, detail.is_correct_answer))
            }
        }
    }

    fn rich_text(&self, raw: RawRichText) -> Result<RichText, ContentError> {
        let raw_spans = match raw {
            RawRichText::Plain(text) => return Ok(RichText::plain(text)),
            RawRichText::Spans(spans) => spans,
        };

        let mut spans = Vec::with_capacity(raw_spans.len());
        for raw_span in raw_spans {
            match raw_span {
                RawSpan::Text { content } => spans.push(Span::Text(content)),
                RawSpan::Image { path } => spans.push(Span::Image(self.image(&path)?)),
                RawSpan::Table {
                    rows,
                    columns,
                    header,
                    cells,
                } => spans.push(Span::Table(self.table(rows, columns, header, cells)?)),
                RawSpan::TableProcessedVlm { data } => {
                    // 空表格不输出
                    if let Some(table) = vlm_table(data) {
                        spans.push(Span::Table(table));
                    }
                }
            }
        }
        Ok(RichText::new(spans))
    }

    fn table(
        &self,
        rows: usize,
        columns: usize,
        header: Option<Vec<RawRichText>>,
        cells: Vec<Vec<RawRichText>>,
    ) -> Result<Table, ContentError> {
        let mismatch = |detail: String| ContentError::TableShapeMismatch {
            folder: self.ctx.folder.clone(),
            question: self.question.clone(),
            detail,
        };

        if let Some(header) = &header {
            if header.len() != columns {
                return Err(mismatch(format!(
                    "表头有 {} 列，声明为 {} 列",
                    header.len(),
                    columns
                )));
            }
        }
        if cells.len() != rows {
            return Err(mismatch(format!(
                "实际 {} 行，声明为 {} 行",
                cells.len(),
                rows
            )));
        }
        for (i, row) in cells.iter().enumerate() {
            if row.len() != columns {
                return Err(mismatch(format!(
                    "第 {} 行有 {} 列，声明为 {} 列",
                    i + 1,
                    row.len(),
                    columns
                )));
            }
        }

        let header = match header {
            Some(cells) => Some(
                cells
                    .into_iter()
                    .map(|cell| self.rich_text(cell))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };
        let cells = cells
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| self.rich_text(cell))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Table {
            rows,
            columns,
            header,
            cells,
        })
    }

    /// 解析并校验图片：存在、可读、可识别的格式
    fn image(&self, raw: &str) -> Result<ImageRef, ContentError> {
        let candidate = Path::new(raw.trim());
        let resolved = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.ctx.folder_path.join(candidate)
        };

        let missing = || ContentError::MissingImage {
            folder: self.ctx.folder.clone(),
            question: self.question.clone(),
            path: resolved.clone(),
        };
        if !resolved.is_file() {
            return Err(missing());
        }
        let path = std::fs::canonicalize(&resolved).map_err(|_| missing())?;

        let unreadable = |reason: String| ContentError::UnreadableImage {
            folder: self.ctx.folder.clone(),
            question: self.question.clone(),
            path: path.clone(),
            reason,
        };

        let reader = image::ImageReader::open(&path)
            .map_err(|e| unreadable(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| unreadable(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| unreadable("无法识别的图片格式".to_string()))?;
        reader
            .into_dimensions()
            .map_err(|e| unreadable(e.to_string()))?;

        Ok(ImageRef {
            path,
            mime_type: format.to_mime_type(),
        })
    }
}

/// 把 `表头 -> 值` 形式的行转换为表格，表头取第一行的键
fn vlm_table(data: VlmTableData) -> Option<Table> {
    let first = data.table.first()?;
    let headers: Vec<String> = first.keys().cloned().collect();
    if headers.is_empty() {
        return None;
    }

    let cells: Vec<Vec<RichText>> = data
        .table
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|key| RichText::plain(cell_text(row.get(key))))
                .collect()
        })
        .collect();

    Some(Table {
        rows: cells.len(),
        columns: headers.len(),
        header: Some(headers.into_iter().map(RichText::plain).collect()),
        cells,
    })
}

fn cell_text(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
