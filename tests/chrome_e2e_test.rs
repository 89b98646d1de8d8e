//! 使用真实 Chrome 的端到端测试
//!
//! 默认忽略，需要手动运行：cargo test -- --ignored

mod common;

use regex::bytes::Regex;

use common::{simple_question, BankFixture};
use qbank_pdf::orchestrator::{BuildRequest, Pipeline};
use qbank_pdf::utils::logging;
use qbank_pdf::Config;

#[tokio::test]
#[ignore]
async fn single_question_renders_to_one_page() {
    logging::init(true);

    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let output = fixture.output("arith.pdf");

    let outcome = Pipeline::with_chrome(Config::from_env())
        .spawn(BuildRequest::new(vec![fixture.folder("arith")], &output))
        .wait()
        .await
        .expect("生成 PDF 失败");

    assert_eq!(outcome.questions, 1);
    let bytes = std::fs::read(&output).expect("读取 PDF 失败");
    assert!(bytes.starts_with(b"%PDF"));
    assert!(outcome.bytes > 0);

    let pages = Regex::new(r"/Type\s*/Page\b").expect("正则无效");
    assert_eq!(pages.find_iter(&bytes).count(), 1);
}

#[tokio::test]
#[ignore]
async fn images_are_loaded_before_printing() {
    logging::init(true);

    let fixture = BankFixture::new();
    fixture.write_png("pics", "dot.png");
    fixture.write_record(
        "pics",
        "q.json",
        serde_json::json!({
            "prompt": [{"type": "text", "content": "Which colour?"}, {"type": "image", "path": "dot.png"}],
            "options": ["red", "blue"],
            "correct": [0]
        }),
    );
    let output = fixture.output("pics.pdf");

    Pipeline::with_chrome(Config::from_env())
        .spawn(BuildRequest::new(vec![fixture.folder("pics")], &output))
        .wait()
        .await
        .expect("生成 PDF 失败");

    let bytes = std::fs::read(&output).expect("读取 PDF 失败");
    assert!(bytes.starts_with(b"%PDF"));
    // 图片被嵌入为 XObject
    assert!(bytes.windows(b"/Subtype /Image".len()).any(|w| w == b"/Subtype /Image"));
}
