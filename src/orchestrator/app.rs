//! 应用入口 - 编排层
//!
//! 1. **应用初始化**：创建外部服务客户端、缓存和进程内存储
//! 2. **加载任务**：扫描任务清单目录，登记课程包和排队中的任务
//! 3. **执行**：交给 `WorkerPool`
//! 4. **导出**：把存储快照写成 JSON，输出全局统计

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::clients::{HttpObjectStore, HttpOcrClient, HttpTranscriber, LlmTranslator};
use crate::config::Config;
use crate::infrastructure::TtlCache;
use crate::models::{load_all_manifests, JobManifest};
use crate::orchestrator::job_runner::JobRunner;
use crate::orchestrator::worker_pool::WorkerPool;
use crate::store::{CoursePackage, InMemoryStore, JobStore};
use crate::utils::logging;
use crate::workflow::{GenerationFlow, PipelineDeps};

/// 应用主结构
pub struct App {
    config: Config,
    store: Arc<InMemoryStore>,
    pool: WorkerPool,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(&config);

        let store = Arc::new(InMemoryStore::new());
        let ttl = config.pipeline.cache_ttl();
        let deps = PipelineDeps {
            storage: Arc::new(HttpObjectStore::new(&config).context("创建对象存储客户端失败")?),
            ocr: Arc::new(HttpOcrClient::new(&config).context("创建 OCR 客户端失败")?),
            transcriber: Arc::new(
                HttpTranscriber::new(&config).context("创建语音识别客户端失败")?,
            ),
            translator: Arc::new(LlmTranslator::new(&config)),
            courses: store.clone(),
            jobs: store.clone(),
            ocr_cache: Arc::new(TtlCache::with_system_clock(ttl)),
            translation_cache: Arc::new(TtlCache::with_system_clock(ttl)),
        };

        let flow = GenerationFlow::new(deps, &config.pipeline).context("初始化生成流程失败")?;
        let runner = Arc::new(JobRunner::new(flow, store.clone()));
        let pool = WorkerPool::new(runner, &config);

        Ok(Self {
            config,
            store,
            pool,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        info!("\n📁 正在扫描任务清单...");
        let manifests = load_all_manifests(&self.config.jobs_folder).await?;

        if manifests.is_empty() {
            warn!("⚠️ 没有找到待处理的任务清单，程序结束");
            return Ok(());
        }

        let job_ids = self.enqueue(&manifests).await?;
        logging::log_jobs_loaded(job_ids.len(), self.config.max_concurrent_jobs);

        let stats = self.pool.run(job_ids).await;

        let snapshot_path = self.export_snapshot().await?;
        logging::print_final_stats(&stats, &snapshot_path);

        Ok(())
    }

    /// 登记课程包和任务，返回任务ID（清单顺序）
    async fn enqueue(&self, manifests: &[JobManifest]) -> Result<Vec<String>> {
        let mut job_ids = Vec::with_capacity(manifests.len());
        for manifest in manifests {
            self.store
                .insert_package(CoursePackage {
                    id: manifest.package_id.clone(),
                    title: manifest.package_title.clone(),
                    description: manifest.package_description.clone(),
                    current_version_id: None,
                })
                .await;

            let job = manifest.to_job();
            info!(
                "[任务 {}] 已入队: 课程包 {}，{} 个素材 ({})",
                job.id,
                manifest.package_title,
                job.input.materials.len(),
                manifest.file_path.as_deref().unwrap_or("-")
            );
            job_ids.push(job.id.clone());
            self.store
                .insert_job(job)
                .await
                .context("任务写入失败")?;
        }
        Ok(job_ids)
    }

    /// 导出存储快照
    async fn export_snapshot(&self) -> Result<PathBuf> {
        let folder = PathBuf::from(&self.config.output_folder);
        tokio::fs::create_dir_all(&folder)
            .await
            .with_context(|| format!("无法创建输出目录: {}", folder.display()))?;

        let snapshot = self.store.snapshot().await;
        let content = serde_json::to_string_pretty(&snapshot).context("快照序列化失败")?;
        let path = folder.join(format!(
            "course_store_{}.json",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ));
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("无法写入快照: {}", path.display()))?;
        Ok(path)
    }
}
