use super::resources::ResourceTable;
use crate::error::LayoutError;
use crate::models::{Question, RichText, Section, Span, Table};

/// 富文本的排版方式
#[derive(Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// 题干、解析：文本段各自成段落
    Block,
    /// 选项、单元格：文本直接内联
    Inline,
}

/// 逐段拼接 HTML
pub(crate) struct MarkupWriter<'a> {
    out: String,
    resources: &'a mut ResourceTable,
}

impl<'a> MarkupWriter<'a> {
    pub(crate) fn new(resources: &'a mut ResourceTable) -> Self {
        Self {
            out: String::new(),
            resources,
        }
    }

    pub(crate) fn begin_document(&mut self, title: &str, css: &str) {
        self.out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        self.out.push_str("<meta charset=\"UTF-8\">\n");
        self.out
            .push_str(&format!("<title>{}</title>\n", escape_html(title)));
        self.out.push_str("<style>\n");
        self.out.push_str(css);
        self.out.push_str("</style>\n</head>\n<body>\n");
    }

    pub(crate) fn end_document(&mut self) {
        self.out.push_str("</body>\n</html>\n");
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }

    /// 分页标记
    pub(crate) fn page_break(&mut self) {
        self.out
            .push_str("<div class=\"page-break\" aria-hidden=\"true\"></div>\n");
    }

    pub(crate) fn section(&mut self, section: &Section) -> Result<(), LayoutError> {
        let name = escape_html(&section.name);
        self.out.push_str(&format!(
            "<section class=\"bank-section\" data-section=\"{}\">\n<h1 class=\"section-title\">{}</h1>\n",
            name, name
        ));
        for (index, question) in section.questions.iter().enumerate() {
            self.question(question, index + 1)?;
        }
        self.out.push_str("</section>\n");
        Ok(())
    }

    /// 一道题是一个整体 `article`，渲染时不跨页拆分
    fn question(&mut self, question: &Question, position: usize) -> Result<(), LayoutError> {
        let label = question
            .label
            .clone()
            .unwrap_or_else(|| position.to_string());

        self.out.push_str(&format!(
            "<article class=\"question\" data-question-id=\"{}\">\n",
            escape_html(&question.id)
        ));
        self.out.push_str(&format!(
            "<h2 class=\"question-title\">Question {}</h2>\n",
            escape_html(&label)
        ));

        self.out.push_str("<div class=\"prompt\">\n");
        self.rich_text(&question.id, &question.prompt, Flow::Block)?;
        self.out.push_str("</div>\n");

        self.out.push_str("<ol class=\"options\">\n");
        for (index, option) in question.options.iter().enumerate() {
            if question.is_correct(index) {
                self.out
                    .push_str("<li class=\"option correct\" data-correct=\"true\">");
            } else {
                self.out.push_str("<li class=\"option\">");
            }
            self.out.push_str(&format!(
                "<span class=\"option-marker\">{}.</span><div class=\"option-body\">",
                option_letter(index)
            ));
            self.rich_text(&question.id, &option.content, Flow::Inline)?;
            self.out.push_str("</div></li>\n");
        }
        self.out.push_str("</ol>\n");

        let answers: Vec<String> = question.correct.iter().map(|&i| option_letter(i)).collect();
        self.out.push_str(&format!(
            "<p class=\"answer-key\"><b>Correct Answer: {}</b></p>\n",
            answers.join(", ")
        ));

        if let Some(explanation) = &question.explanation {
            self.out
                .push_str("<div class=\"explanation\">\n<h3>Explanation</h3>\n");
            self.rich_text(&question.id, explanation, Flow::Block)?;
            self.out.push_str("</div>\n");
        }

        self.out.push_str("</article>\n");
        Ok(())
    }

    fn rich_text(&mut self, question_id: &str, text: &RichText, flow: Flow) -> Result<(), LayoutError> {
        for span in &text.spans {
            match span {
                Span::Text(content) => match flow {
                    Flow::Block => self
                        .out
                        .push_str(&format!("<p>{}</p>\n", text_with_breaks(content))),
                    Flow::Inline => self.out.push_str(&text_with_breaks(content)),
                },
                Span::Image(image) => {
                    let src = self.resources.source_for(question_id, image)?;
                    self.out.push_str(&format!(
                        "<img class=\"inline-image\" src=\"{}\" alt=\"\">",
                        escape_html(&src)
                    ));
                    if flow == Flow::Block {
                        self.out.push('\n');
                    }
                }
                Span::Table(table) => self.table(question_id, table)?,
            }
        }
        Ok(())
    }

    fn table(&mut self, question_id: &str, table: &Table) -> Result<(), LayoutError> {
        self.out.push_str("<table class=\"rich-table\">\n");
        if let Some(header) = &table.header {
            self.out.push_str("<thead><tr>");
            for cell in header {
                self.out.push_str("<th>");
                self.rich_text(question_id, cell, Flow::Inline)?;
                self.out.push_str("</th>");
            }
            self.out.push_str("</tr></thead>\n");
        }
        self.out.push_str("<tbody>\n");
        for row in &table.cells {
            self.out.push_str("<tr>");
            for cell in row {
                self.out.push_str("<td>");
                self.rich_text(question_id, cell, Flow::Inline)?;
                self.out.push_str("</td>");
            }
            self.out.push_str("</tr>\n");
        }
        self.out.push_str("</tbody>\n</table>\n");
        Ok(())
    }
}

fn text_with_breaks(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

/// HTML 转义
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 选项字母：0 → A，25 → Z，26 → AA
pub fn option_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
