mod common;

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use common::{fast_config, simple_question, BankFixture, Behavior, FakeEngine};
use qbank_pdf::config::Config;
use qbank_pdf::error::{AppError, ErrorKind};
use qbank_pdf::orchestrator::{BuildRequest, Pipeline, Stage};

fn pipeline(engine: FakeEngine) -> Pipeline {
    Pipeline::new(fast_config(), Arc::new(engine))
}

/// 输出目录下除目标文件外不应有残留
fn leftovers(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".part"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn single_question_bank_produces_artifact() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let output = fixture.output("bank.pdf");
    let engine = FakeEngine::new(Behavior::Succeed);
    let probe = engine.probe();

    let (progress, _rx) = mpsc::unbounded_channel();
    let outcome = assert_ok!(
        pipeline(engine)
            .run(
                &BuildRequest::new(vec![fixture.folder("arith")], &output),
                &progress,
                &CancellationToken::new(),
            )
            .await
    );

    assert_eq!(outcome.output, output);
    assert_eq!((outcome.sections, outcome.questions), (1, 1));
    let written = std::fs::read_to_string(&output).expect("读取产物失败");
    assert!(written.starts_with("%PDF-fake"));
    assert!(written.contains("2+2=?"));
    for option in [">3</div>", ">4</div>", ">5</div>"] {
        assert!(written.contains(option));
    }
    assert_eq!(outcome.bytes, written.len() as u64);
    assert_eq!(probe.terminated(), 1);
    assert!(leftovers(output.parent().expect("缺少父目录")).is_empty());
}

#[tokio::test]
async fn artifact_sections_follow_selection_order() {
    let fixture = BankFixture::new();
    for folder in ["F1", "F2", "F3"] {
        fixture.write_record(folder, "q.json", simple_question(&format!("from {}", folder)));
    }
    let output = fixture.output("ordered.pdf");
    let request = BuildRequest::new(
        vec![
            fixture.folder("F2"),
            fixture.folder("F1"),
            fixture.folder("F3"),
        ],
        &output,
    );

    let handle = pipeline(FakeEngine::new(Behavior::Succeed)).spawn(request);
    assert_ok!(handle.wait().await);

    let written = std::fs::read_to_string(&output).expect("读取产物失败");
    let at = |needle: &str| written.find(needle).expect("产物中缺少分区");
    assert!(at("from F2") < at("from F1"));
    assert!(at("from F1") < at("from F3"));
}

#[tokio::test]
async fn progress_reports_every_stage_in_order() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let request = BuildRequest::new(vec![fixture.folder("arith")], fixture.output("p.pdf"));

    let mut handle = pipeline(FakeEngine::new(Behavior::Succeed)).spawn(request);
    let mut stages = Vec::new();
    while let Some(progress) = handle.progress.recv().await {
        stages.push(progress.stage);
    }
    assert_ok!(handle.wait().await);
    stages.dedup();

    assert_eq!(
        stages,
        vec![Stage::Loading, Stage::Composing, Stage::Rendering, Stage::Done]
    );
}

#[tokio::test]
async fn loading_reports_each_folder_as_it_is_read() {
    let fixture = BankFixture::new();
    fixture.write_record("algebra", "q1.json", simple_question("x+1=2"));
    fixture.write_record("algebra", "q2.json", simple_question("x+2=4"));
    fixture.write_record("geometry", "q1.json", simple_question("angles?"));
    let request = BuildRequest::new(
        vec![fixture.folder("geometry"), fixture.folder("algebra")],
        fixture.output("p.pdf"),
    );

    let mut handle = pipeline(FakeEngine::new(Behavior::Succeed)).spawn(request);
    let mut loading = Vec::new();
    while let Some(progress) = handle.progress.recv().await {
        if progress.stage == Stage::Loading {
            loading.push(progress.message);
        }
    }
    assert_ok!(handle.wait().await);

    assert_eq!(loading.len(), 3);
    assert!(loading[1].contains("geometry") && loading[1].contains('1'));
    assert!(loading[2].contains("algebra") && loading[2].contains('2'));
}

#[tokio::test]
async fn render_crash_leaves_no_file_at_output() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let output = fixture.output("crash.pdf");
    let engine = FakeEngine::new(Behavior::CrashDuringRender);
    let probe = engine.probe();

    let handle = pipeline(engine).spawn(BuildRequest::new(vec![fixture.folder("arith")], &output));
    let err = assert_err!(handle.wait().await);

    assert_eq!(err.kind(), ErrorKind::Render);
    assert!(!output.exists());
    assert!(leftovers(output.parent().expect("缺少父目录")).is_empty());
    assert_eq!(probe.terminated(), 1);
}

#[tokio::test]
async fn failed_run_removes_the_directories_it_created() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let output = fixture.root().join("reports").join("2024").join("bank.pdf");

    let handle = pipeline(FakeEngine::new(Behavior::CrashDuringRender))
        .spawn(BuildRequest::new(vec![fixture.folder("arith")], &output));
    assert_err!(handle.wait().await);

    assert!(!fixture.root().join("reports").exists());
    assert!(fixture.root().exists());
}

#[tokio::test]
async fn failed_run_keeps_existing_output_directory() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let existing = fixture.folder("published");
    let output = existing.join("fresh").join("bank.pdf");

    let handle = pipeline(FakeEngine::new(Behavior::EmptyOutput))
        .spawn(BuildRequest::new(vec![fixture.folder("arith")], &output));
    assert_err!(handle.wait().await);

    assert!(existing.is_dir());
    assert!(!existing.join("fresh").exists());
}

#[tokio::test]
async fn failed_run_keeps_previous_artifact_untouched() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let output = fixture.output("existing.pdf");
    std::fs::create_dir_all(output.parent().expect("缺少父目录")).expect("创建目录失败");
    std::fs::write(&output, b"%PDF-previous").expect("写入旧产物失败");

    let handle = pipeline(FakeEngine::new(Behavior::EmptyOutput))
        .spawn(BuildRequest::new(vec![fixture.folder("arith")], &output));
    assert_err!(handle.wait().await);

    assert_eq!(std::fs::read(&output).expect("读取旧产物失败"), b"%PDF-previous");
}

#[tokio::test]
async fn content_error_stops_before_rendering() {
    let fixture = BankFixture::new();
    fixture.write_record(
        "broken",
        "q.json",
        json!({"prompt": "?", "options": ["only"], "correct": [0]}),
    );
    let output = fixture.output("never.pdf");
    let engine = FakeEngine::new(Behavior::Succeed);
    let probe = engine.probe();

    let mut handle =
        pipeline(engine).spawn(BuildRequest::new(vec![fixture.folder("broken")], &output));
    let mut stages = Vec::new();
    while let Some(progress) = handle.progress.recv().await {
        stages.push(progress.stage);
    }
    let err = assert_err!(handle.wait().await);

    assert_eq!(err.kind(), ErrorKind::Content);
    assert_eq!(stages, vec![Stage::Loading]);
    assert_eq!(probe.launched(), 0);
    assert!(!output.exists());
}

#[tokio::test]
async fn bank_without_questions_is_rejected() {
    let fixture = BankFixture::new();
    fixture.folder("empty-a");
    fixture.folder("empty-b");

    let handle = pipeline(FakeEngine::new(Behavior::Succeed)).spawn(BuildRequest::new(
        vec![fixture.folder("empty-a"), fixture.folder("empty-b")],
        fixture.output("empty.pdf"),
    ));
    let err = assert_err!(handle.wait().await);

    assert!(matches!(
        err,
        AppError::Content(qbank_pdf::error::ContentError::EmptyBank { folders: 2 })
    ));
}

#[tokio::test]
async fn cancelled_before_start_does_nothing() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let engine = FakeEngine::new(Behavior::Succeed);
    let probe = engine.probe();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let (progress, _rx) = mpsc::unbounded_channel();
    let err = assert_err!(
        pipeline(engine)
            .run(
                &BuildRequest::new(vec![fixture.folder("arith")], fixture.output("c.pdf")),
                &progress,
                &cancel,
            )
            .await
    );

    assert!(matches!(
        err,
        AppError::Cancelled {
            stage: Stage::Loading
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(probe.launched(), 0);
}

#[tokio::test]
async fn cancelling_during_render_terminates_engine() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let output = fixture.output("hang.pdf");
    let engine = FakeEngine::new(Behavior::HangOnResources);
    let probe = engine.probe();
    let config = Config {
        content_load_timeout_ms: 60_000,
        ..fast_config()
    };

    let mut handle = Pipeline::new(config, Arc::new(engine))
        .spawn(BuildRequest::new(vec![fixture.folder("arith")], &output));
    while let Some(progress) = handle.progress.recv().await {
        if progress.stage == Stage::Rendering {
            break;
        }
    }
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    handle.cancel();
    let err = assert_err!(handle.wait().await);

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(probe.terminated(), probe.launched());
    assert!(!output.exists());
}

#[tokio::test]
async fn concurrent_runs_own_separate_sessions() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let engine = FakeEngine::new(Behavior::Succeed);
    let probe = engine.probe();
    let pipeline = pipeline(engine);

    let first = pipeline.spawn(BuildRequest::new(
        vec![fixture.folder("arith")],
        fixture.output("one.pdf"),
    ));
    let second = pipeline.spawn(BuildRequest::new(
        vec![fixture.folder("arith")],
        fixture.output("two.pdf"),
    ));
    let (a, b) = tokio::join!(first.wait(), second.wait());
    assert_ok!(a);
    assert_ok!(b);

    assert_eq!(probe.launched(), 2);
    assert_eq!(probe.terminated(), 2);
}

#[tokio::test]
async fn invalid_config_fails_fast() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let config = Config {
        render_timeout_ms: 0,
        ..fast_config()
    };

    let handle = Pipeline::new(config, Arc::new(FakeEngine::new(Behavior::Succeed)))
        .spawn(BuildRequest::new(vec![fixture.folder("arith")], fixture.output("x.pdf")));
    let err = assert_err!(handle.wait().await);

    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn compose_only_skips_rendering() {
    let fixture = BankFixture::new();
    fixture.write_record("arith", "q1.json", simple_question("2+2=?"));
    let engine = FakeEngine::new(Behavior::Succeed);
    let probe = engine.probe();

    let document = assert_ok!(
        pipeline(engine)
            .compose_only(&[fixture.folder("arith")])
            .await
    );

    assert!(document.html.contains("2+2=?"));
    assert_eq!(probe.launched(), 0);
}
