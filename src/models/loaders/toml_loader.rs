use crate::models::job::GenerationJob;
use crate::models::material::MaterialDescriptor;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 任务清单：一个 TOML 文件描述一次生成任务
///
/// ```toml
/// package_id = "pkg-1"
/// package_title = "Grade 7 Unit 3"
/// unit_id = "unit-3"          # 可选，只替换该单元
///
/// [[materials]]
/// id = "m1"
/// storageLocator = "uploads/pkg-1/page-12.png"
/// originalName = "page-12.png"
/// mimeType = "image/png"
/// sizeBytes = 48213
/// pageHints = [12]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct JobManifest {
    pub package_id: String,
    pub package_title: String,
    #[serde(default)]
    pub package_description: Option<String>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub triggered_by: Option<String>,
    #[serde(default)]
    pub materials: Vec<MaterialDescriptor>,

    /// 清单文件路径
    #[serde(skip)]
    pub file_path: Option<String>,
}

impl JobManifest {
    /// 转成排队中的生成任务
    pub fn to_job(&self) -> GenerationJob {
        let mut job = GenerationJob::queued(
            self.package_id.clone(),
            self.unit_id.clone(),
            self.materials.clone(),
        );
        job.triggered_by = self.triggered_by.clone();
        job
    }
}

/// 从 TOML 文件加载任务清单
pub async fn load_manifest(toml_file_path: &Path) -> Result<JobManifest> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut manifest: JobManifest = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    manifest.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(manifest)
}

/// 从文件夹中加载所有任务清单（按文件名排序）
pub async fn load_all_manifests(folder_path: &str) -> Result<Vec<JobManifest>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut manifests = Vec::new();
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_manifest(&path).await {
            Ok(manifest) => {
                tracing::info!("成功加载 {} 个素材", manifest.materials.len());
                manifests.push(manifest);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(manifests)
}
