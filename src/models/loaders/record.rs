//! 磁盘上的题目记录格式
//!
//! 兼容两种写法：
//! - 每题一个文件，`prompt` / `options` / `correct` / `explanation`
//! - 旧版导出的 `questions.json`：顶层数组，字段为 `text`、
//!   `question_media_path`、`options[].is_correct_answer`、`explanation_elements`

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRecord {
    /// 显示用题号
    #[serde(default, deserialize_with = "deserialize_label")]
    pub question_number: Option<String>,

    #[serde(alias = "text")]
    pub prompt: RawRichText,

    /// 附在题干末尾的图片
    #[serde(default)]
    pub question_media_path: Option<String>,

    #[serde(default)]
    pub options: Vec<RawOption>,

    /// 正确选项下标（从 0 开始）
    #[serde(default)]
    pub correct: Vec<usize>,

    #[serde(default, alias = "explanation_elements")]
    pub explanation: Option<RawRichText>,
}

/// 富文本：纯字符串或片段列表
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRichText {
    Plain(String),
    Spans(Vec<RawSpan>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawSpan {
    Text {
        #[serde(default)]
        content: String,
    },
    Image {
        path: String,
    },
    Table {
        rows: usize,
        columns: usize,
        #[serde(default)]
        header: Option<Vec<RawRichText>>,
        #[serde(default)]
        cells: Vec<Vec<RawRichText>>,
    },
    /// 识别服务输出的表格：每行是 `表头 -> 值` 的映射
    TableProcessedVlm {
        #[serde(default)]
        data: VlmTableData,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VlmTableData {
    #[serde(default)]
    pub table: Vec<Map<String, JsonValue>>,
}

/// 选项：纯字符串或带图片/正确标记的对象
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawOption {
    Plain(String),
    Detailed(RawOptionDetail),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOptionDetail {
    #[serde(default, alias = "content")]
    pub text: Option<RawRichText>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub is_correct_answer: bool,
}

// 题号既可能是字符串也可能是整数
fn deserialize_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct LabelVisitor;

    impl<'de> Visitor<'de> for LabelVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer question number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(LabelVisitor)
}

/// 按文件类型解析记录文件
///
/// JSON 顶层为数组时视为多题合集，返回的每一项带上其在数组中的序号。
pub fn parse_records(
    content: &str,
    kind: RecordFormat,
) -> Result<Vec<(Option<usize>, QuestionRecord)>, String> {
    match kind {
        RecordFormat::Toml => {
            let record: QuestionRecord = toml::from_str(content).map_err(|e| e.to_string())?;
            Ok(vec![(None, record)])
        }
        RecordFormat::Json => {
            let value: JsonValue = serde_json::from_str(content).map_err(|e| e.to_string())?;
            match value {
                JsonValue::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        serde_json::from_value(item)
                            .map(|record| (Some(index), record))
                            .map_err(|e| format!("第 {} 项: {}", index, e))
                    })
                    .collect(),
                other => {
                    let record: QuestionRecord =
                        serde_json::from_value(other).map_err(|e| e.to_string())?;
                    Ok(vec![(None, record)])
                }
            }
        }
    }
}

/// 记录文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Toml,
}

impl RecordFormat {
    /// 根据扩展名判断，不是记录文件时返回 `None`
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(RecordFormat::Json),
            "toml" => Some(RecordFormat::Toml),
            _ => None,
        }
    }
}
