use crate::config::PageGeometry;

/// 文档样式表
///
/// 页面尺寸与页边距来自配置，与打印参数保持一致。
/// 不引用任何网络字体。
pub fn stylesheet(geometry: &PageGeometry) -> String {
    format!(
        "@page {{ size: {}mm {}mm; margin: {}mm; }}\n{}",
        geometry.width_mm, geometry.height_mm, geometry.margin_mm, BASE_STYLES
    )
}

const BASE_STYLES: &str = r#"html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }
body { font-family: 'Roboto', 'Noto Sans', 'Noto Color Emoji', 'Helvetica Neue', Arial, sans-serif; font-size: 13pt; font-weight: 400; line-height: 1.5; color: #1a1a1a; margin: 0; }
.page-break { break-after: page; page-break-after: always; height: 0; margin: 0; border: 0; }
.bank-section { margin: 0; }
.section-title { font-size: 16pt; font-weight: bold; color: #000; margin: 0 0 12px 0; padding-bottom: 6px; border-bottom: 2px solid #333; break-after: avoid; page-break-after: avoid; }
.question { break-inside: avoid; page-break-inside: avoid; padding-bottom: 1em; margin-bottom: 1.5em; border-bottom: 1px solid #eaeaea; }
.question-title { font-size: 12pt; font-weight: bold; color: #000; margin: 0 0 8px 0; padding-bottom: 4px; border-bottom: 1px solid #eaeaea; }
.prompt p, .explanation p { margin-top: 0; margin-bottom: 1em; }
.options { list-style: none; padding: 0; margin: 0 0 1em 0; }
.option { display: flex; gap: 0.5em; padding: 4px 8px; margin-bottom: 4px; border-left: 3px solid transparent; }
.option-marker { font-weight: bold; min-width: 1.5em; }
.option.correct { background: #e8f5e9; border-left-color: #2e7d32; font-weight: bold; }
.answer-key { margin: 0 0 1em 0; }
.explanation h3 { font-size: 11pt; font-weight: bold; color: #333; margin-top: 1em; margin-bottom: 0.5em; }
img.inline-image { max-width: 100%; height: auto; display: block; margin: 0.5em 0; }
.option img.inline-image { display: inline-block; vertical-align: middle; margin: 0.25em 0; }
table.rich-table { width: 100%; border-collapse: collapse; margin-bottom: 1em; font-size: 11pt; background: #fff; }
table.rich-table th { background: #f7f7f7; color: #333; font-weight: bold; padding: 10px 8px; border: 1px solid #e0e0e0; text-align: left; }
table.rich-table td { padding: 10px 8px; border: 1px solid #e0e0e0; color: #222; }
table.rich-table tr:nth-child(even) { background: #fafafa; }
"#;
