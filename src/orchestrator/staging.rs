//! 暂存产物
//!
//! 渲染产物先写到与目标同目录的 `.qbank-*.pdf.part`，成功后 rename 到位。
//! 同目录保证 rename 不跨文件系统；未提交就被丢弃时临时文件自动删除。

use std::io;
use std::path::Path;

use tempfile::TempPath;
use tracing::debug;

/// 尚未提交的产物
#[derive(Debug)]
pub struct StagedArtifact {
    path: TempPath,
}

impl StagedArtifact {
    /// 在 `output` 所在目录创建暂存文件
    ///
    /// 目录必须已存在。
    pub fn new_for(output: &Path) -> io::Result<Self> {
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = tempfile::Builder::new()
            .prefix(".qbank-")
            .suffix(".pdf.part")
            .tempfile_in(dir)?;
        let path = file.into_temp_path();
        debug!("暂存文件: {}", path.display());
        Ok(Self { path })
    }

    /// 暂存文件路径，交给渲染引擎写入
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 把暂存文件移动到目标路径，已存在的目标会被替换
    pub fn commit(self, output: &Path) -> io::Result<()> {
        self.path.persist(output).map_err(|e| e.error)?;
        debug!("产物已就位: {}", output.display());
        Ok(())
    }
}
