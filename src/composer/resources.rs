//! 资源表：把图片引用转换为 `src` 属性值，并记录资源清单

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::error;
use url::Url;

use crate::error::LayoutError;
use crate::models::ImageRef;

pub(crate) struct ResourceTable {
    embed: bool,
    /// 路径 → 已生成的 src，同一图片只读取一次
    sources: BTreeMap<PathBuf, String>,
    manifest: Vec<PathBuf>,
}

impl ResourceTable {
    pub(crate) fn new(embed: bool) -> Self {
        Self {
            embed,
            sources: BTreeMap::new(),
            manifest: Vec::new(),
        }
    }

    /// 返回图片的 `src`
    ///
    /// 加载器已校验过所有图片，这里失败说明文件在两步之间被改动，按缺陷处理。
    pub(crate) fn source_for(
        &mut self,
        question_id: &str,
        image: &ImageRef,
    ) -> Result<String, LayoutError> {
        if let Some(src) = self.sources.get(&image.path) {
            return Ok(src.clone());
        }

        if !image.path.is_file() {
            error!(
                "[{}] ❌ 排版时资源已不存在: {} (加载时校验通过)",
                question_id,
                image.path.display()
            );
            return Err(LayoutError::UnresolvedResource {
                question: question_id.to_string(),
                path: image.path.clone(),
            });
        }

        let src = if self.embed {
            let bytes = std::fs::read(&image.path).map_err(|source| {
                error!(
                    "[{}] ❌ 读取资源失败: {}: {}",
                    question_id,
                    image.path.display(),
                    source
                );
                LayoutError::ResourceRead {
                    question: question_id.to_string(),
                    path: image.path.clone(),
                    source,
                }
            })?;
            format!("data:{};base64,{}", image.mime_type, STANDARD.encode(bytes))
        } else {
            let url = Url::from_file_path(&image.path).map_err(|_| {
                error!(
                    "[{}] ❌ 资源路径无法转换为 URI: {}",
                    question_id,
                    image.path.display()
                );
                LayoutError::InvalidResourcePath {
                    question: question_id.to_string(),
                    path: image.path.clone(),
                }
            })?;
            self.manifest.push(image.path.clone());
            url.to_string()
        };

        self.sources.insert(image.path.clone(), src.clone());
        Ok(src)
    }

    pub(crate) fn into_manifest(self) -> Vec<PathBuf> {
        self.manifest
    }
}
