use crate::models::GradingJob;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载一个批改任务
///
/// 相对的 `file` 路径以 TOML 文件所在目录为基准。
pub async fn load_toml_to_grading_job(toml_file_path: &Path) -> Result<GradingJob> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut job: GradingJob = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    if job.file.is_relative() {
        if let Some(parent) = toml_file_path.parent() {
            job.file = parent.join(&job.file);
        }
    }
    job.source = Some(toml_file_path.to_path_buf());

    Ok(job)
}

/// 从文件夹中加载所有 TOML 批改任务（按文件名排序）
pub async fn load_all_toml_files(folder_path: &str) -> Result<Vec<GradingJob>> {
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

    let mut jobs = Vec::new();
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_toml_to_grading_job(&path).await {
            Ok(job) => jobs.push(job),
            Err(e) => tracing::warn!("加载文件失败 {}: {:#}", path.display(), e),
        }
    }

    Ok(jobs)
}
