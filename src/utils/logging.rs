/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// `RUST_LOG` 优先；否则按 `verbose` 选择 `debug` 或 `info`。
/// 重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// 记录程序启动信息
///
/// # 参数
/// - `folders`: 已按用户顺序排列的题库文件夹
/// - `output`: 输出 PDF 路径
pub fn log_startup(folders: &[PathBuf], output: &Path) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始生成题库 PDF");
    info!("📂 文件夹数量: {}", folders.len());
    info!("📄 输出文件: {}", output.display());
    info!("{}", "=".repeat(60));
}

/// 记录题库加载信息
///
/// # 参数
/// - `sections`: 分区数量
/// - `questions`: 题目总数
pub fn log_bank_loaded(sections: usize, questions: usize) {
    info!("✓ 已加载 {} 个分区，共 {} 道题目", sections, questions);
}

/// 打印最终统计信息
///
/// # 参数
/// - `questions`: 题目总数
/// - `bytes`: 产物大小
/// - `output`: 输出路径
pub fn print_final_stats(questions: usize, bytes: u64, output: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 生成完成");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 题目数量: {}", questions);
    info!("📦 文件大小: {} 字节", bytes);
    info!("{}", "=".repeat(60));
    info!("\nPDF 已保存至: {}", output.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_text("二加二等于几", 3), "二加二...");
        assert_eq!(truncate_text("2+2=?", 10), "2+2=?");
    }
}
