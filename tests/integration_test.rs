use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use course_gen_worker::clients::{ObjectStore, OcrService, Transcriber, TranscriptSegment, Translator};
use course_gen_worker::infrastructure::{ManualClock, TtlCache};
use course_gen_worker::models::{
    GenerationJob, JobLogEntry, JobStatus, JobUpdate, LogLevel, MaterialDescriptor,
};
use course_gen_worker::services::payload_compat::from_stored;
use course_gen_worker::services::sentence_scorer::{jaccard, tokenize};
use course_gen_worker::store::{CoursePackage, CourseStore, InMemoryStore, JobStore};
use course_gen_worker::{
    Config, GenerationFlow, JobRunner, PipelineDeps, PipelineError, PipelineSettings, RunOutcome,
    ServiceError, StoreError, WorkerPool,
};

const PAGE_ONE: &str = "I like to read books in the morning. My sister plays the piano after school. \
We often go to the park on Sunday. The teacher gives us homework every day. \
Tom is good at playing basketball.";

const PAGE_TWO: &str = "Lucy usually gets up at six o'clock. Her brother never eats breakfast at home. \
They went to the zoo last weekend. What do you want to be in the future? \
Can you help me with my English?";

const PAGE_THREE: &str = "My father works in a big hospital. We planted trees near the river yesterday. \
The library opens at nine in the morning. How many students are there in your class? \
Please close the door when you leave.";

// ========== 测试替身 ==========

struct FakeStorage;

#[async_trait]
impl ObjectStore for FakeStorage {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, ServiceError> {
        Err(ServiceError::BadResponse {
            service: "storage",
            status: 404,
            body: locator.to_string(),
        })
    }

    async fn signed_url(&self, locator: &str) -> Result<String, ServiceError> {
        Ok(format!("https://fake/{}", locator))
    }
}

/// 按签名链接返回预设文本的 OCR
struct FakeOcr {
    pages: HashMap<String, String>,
}

#[async_trait]
impl OcrService for FakeOcr {
    async fn recognize(&self, image_url: &str) -> Result<String, ServiceError> {
        self.pages
            .get(image_url)
            .cloned()
            .ok_or(ServiceError::BadResponse {
                service: "ocr",
                status: 404,
                body: image_url.to_string(),
            })
    }
}

struct FakeTranscriber;

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio_url: &str) -> Result<Vec<TranscriptSegment>, ServiceError> {
        Ok(Vec::new())
    }
}

/// `fail_on` 中的句子总是超时，其他句子返回固定格式的译文
struct FakeTranslator {
    fail_on: Vec<String>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl FakeTranslator {
    fn new(fail_on: &[&str]) -> Self {
        Self {
            fail_on: fail_on.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
        }
    }

    fn calls_for(&self, text: &str) -> usize {
        self.calls.lock().unwrap().get(text).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str) -> Result<String, ServiceError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(text.to_string()).or_default() += 1;
        if self.fail_on.iter().any(|f| f == text) {
            return Err(ServiceError::Timeout {
                service: "translate",
                timeout: Duration::from_secs(1),
            });
        }
        Ok(format!("译文：{}", text))
    }
}

/// 记录每次状态更新结果的任务存储
struct RecordingJobs {
    inner: Arc<InMemoryStore>,
    updates: Mutex<Vec<(JobUpdate, GenerationJob)>>,
}

impl RecordingJobs {
    fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            updates: Mutex::new(Vec::new()),
        }
    }

    /// 某个任务每次更新里显式给出的进度
    fn progress_for(&self, job_id: &str) -> Vec<u8> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, job)| job.id == job_id)
            .filter_map(|(update, _)| update.progress)
            .collect()
    }

    /// 某个任务每次更新之后的状态
    fn snapshots_for(&self, job_id: &str) -> Vec<GenerationJob> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, job)| job.id == job_id)
            .map(|(_, job)| job.clone())
            .collect()
    }
}

#[async_trait]
impl JobStore for RecordingJobs {
    async fn insert_job(&self, job: GenerationJob) -> Result<(), StoreError> {
        self.inner.insert_job(job).await
    }

    async fn get_job(&self, job_id: &str) -> Result<GenerationJob, StoreError> {
        self.inner.get_job(job_id).await
    }

    async fn update_job(
        &self,
        job_id: &str,
        update: JobUpdate,
    ) -> Result<GenerationJob, StoreError> {
        let job = self.inner.update_job(job_id, update.clone()).await?;
        self.updates.lock().unwrap().push((update, job.clone()));
        Ok(job)
    }

    async fn append_log(&self, job_id: &str, entry: JobLogEntry) -> Result<(), StoreError> {
        self.inner.append_log(job_id, entry).await
    }

    async fn list_logs(&self, job_id: &str) -> Result<Vec<JobLogEntry>, StoreError> {
        self.inner.list_logs(job_id).await
    }
}

// ========== 测试环境 ==========

struct Harness {
    store: Arc<InMemoryStore>,
    jobs: Arc<RecordingJobs>,
    runner: JobRunner,
    translator: Arc<FakeTranslator>,
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        ocr_batch_delay_ms: 0,
        translate_batch_delay_ms: 0,
        retry_base_delay_ms: 0,
        ..PipelineSettings::default()
    }
}

async fn harness_with(
    pages: &[(&str, &str)],
    fail_on: &[&str],
    settings: PipelineSettings,
) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_package(CoursePackage {
            id: "pkg".to_string(),
            title: "Grade 7 Unit 3".to_string(),
            description: None,
            current_version_id: None,
        })
        .await;

    let jobs = Arc::new(RecordingJobs::new(store.clone()));
    let translator = Arc::new(FakeTranslator::new(fail_on));
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let deps = PipelineDeps {
        storage: Arc::new(FakeStorage),
        ocr: Arc::new(FakeOcr {
            pages: pages
                .iter()
                .map(|(locator, text)| (format!("https://fake/{}", locator), text.to_string()))
                .collect(),
        }),
        transcriber: Arc::new(FakeTranscriber),
        translator: translator.clone(),
        courses: store.clone(),
        jobs: jobs.clone(),
        ocr_cache: Arc::new(TtlCache::new(Duration::from_secs(3600), clock.clone())),
        translation_cache: Arc::new(TtlCache::new(Duration::from_secs(3600), clock)),
    };
    let flow = GenerationFlow::new(deps, &settings).unwrap();

    Harness {
        runner: JobRunner::new(flow, jobs.clone()),
        store,
        jobs,
        translator,
    }
}

async fn harness(pages: &[(&str, &str)], fail_on: &[&str]) -> Harness {
    harness_with(pages, fail_on, settings()).await
}

fn image(id: &str, locator: &str) -> MaterialDescriptor {
    MaterialDescriptor {
        id: id.to_string(),
        storage_locator: locator.to_string(),
        original_name: format!("{}.png", id),
        mime_type: "image/png".to_string(),
        size_bytes: 1024,
        page_hints: Vec::new(),
        lesson_count_hint: None,
    }
}

fn three_pages() -> Vec<(&'static str, &'static str)> {
    vec![
        ("uploads/p1", PAGE_ONE),
        ("uploads/p2", PAGE_TWO),
        ("uploads/p3", PAGE_THREE),
    ]
}

fn three_images() -> Vec<MaterialDescriptor> {
    vec![
        image("p1", "uploads/p1"),
        image("p2", "uploads/p2"),
        image("p3", "uploads/p3"),
    ]
}

impl Harness {
    async fn submit(&self, unit_id: Option<&str>, materials: Vec<MaterialDescriptor>) -> String {
        let job = GenerationJob::queued("pkg", unit_id.map(str::to_string), materials);
        let id = job.id.clone();
        self.store.insert_job(job).await.unwrap();
        id
    }

    /// 当前版本的全部内容项载荷（按关卡序号）
    async fn stored_payloads(&self, version_id: &str) -> Vec<Value> {
        let mut payloads = Vec::new();
        for lesson in self.store.lessons_for_version(version_id).await {
            for item in self.store.items_for_lesson(&lesson.id).await {
                payloads.push(item.payload);
            }
        }
        payloads
    }
}

fn succeeded(outcome: RunOutcome) -> course_gen_worker::JobResult {
    match outcome {
        RunOutcome::Succeeded(result) => result,
        other => panic!("任务应该成功，实际: {:?}", other),
    }
}

// ========== 场景 ==========

#[tokio::test]
async fn test_fifteen_sentences_fill_one_round() {
    let h = harness(&three_pages(), &[]).await;
    let job_id = h.submit(None, three_images()).await;

    let result = succeeded(h.runner.run(&job_id, 1).await.unwrap());
    assert_eq!(result.lesson_count, 15);
    assert_eq!(result.version_number, 1);

    let payloads = h.stored_payloads(&result.version_id).await;
    assert_eq!(payloads.len(), 15);
    assert!(payloads.iter().all(|p| p["round"]["index"] == 1));

    let orders: Vec<u64> = payloads
        .iter()
        .filter_map(|p| p["round"]["order"].as_u64())
        .collect();
    assert_eq!(orders, (1..=15).collect::<Vec<u64>>());

    // 轮内按页码排序
    let pages: Vec<u64> = payloads
        .iter()
        .filter_map(|p| p["pageNumber"].as_u64())
        .collect();
    let mut sorted = pages.clone();
    sorted.sort();
    assert_eq!(pages, sorted);

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.progress, 100);
    assert_eq!(job.result, Some(result));
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn test_progress_checkpoints_in_order() {
    let h = harness(&three_pages(), &[]).await;
    let job_id = h.submit(None, three_images()).await;
    succeeded(h.runner.run(&job_id, 1).await.unwrap());

    assert_eq!(h.jobs.progress_for(&job_id), vec![5, 15, 30, 55, 70, 100]);

    let statuses: Vec<JobStatus> = h
        .jobs
        .snapshots_for(&job_id)
        .iter()
        .map(|j| j.status)
        .collect();
    let mut expected = vec![JobStatus::Processing; 5];
    expected.push(JobStatus::Succeeded);
    assert_eq!(statuses, expected);
}

#[tokio::test]
async fn test_failure_keeps_last_reached_checkpoint() {
    // 只有标题：抽取阶段之后才失败
    let h = harness(&[("uploads/cover", "UNIT 3 My Week")], &[]).await;
    let job_id = h.submit(None, vec![image("cover", "uploads/cover")]).await;
    assert!(h.runner.run(&job_id, 1).await.is_err());

    assert_eq!(h.jobs.progress_for(&job_id), vec![5, 15, 30]);

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 30);
    assert!(job.result.is_none());
}

#[tokio::test]
async fn test_heading_only_material_fails_with_no_usable_sentences() {
    let h = harness(&[("uploads/cover", "UNIT 3 My Week")], &[]).await;
    let job_id = h.submit(None, vec![image("cover", "uploads/cover")]).await;

    let err = h.runner.run(&job_id, 1).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoUsableSentences));

    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .as_deref()
        .unwrap_or_default()
        .starts_with("no usable sentences"));
    assert!(job.completed_at.is_some());

    // 没有任何部分写入
    assert!(h.store.versions_for_package("pkg").await.is_empty());

    let logs = h.store.list_logs(&job_id).await.unwrap();
    assert_eq!(logs.last().map(|l| l.level), Some(LogLevel::Error));
}

#[tokio::test]
async fn test_near_identical_sentences_keep_one() {
    let text = "I like apples. I like apples! We go to school every day. \
                My mother cooks dinner for us.";
    let h = harness(&[("uploads/p1", text)], &[]).await;
    let job_id = h.submit(None, vec![image("p1", "uploads/p1")]).await;

    let result = succeeded(h.runner.run(&job_id, 1).await.unwrap());
    assert_eq!(result.lesson_count, 3);

    let apples = h
        .stored_payloads(&result.version_id)
        .await
        .iter()
        .filter(|p| p["english"].as_str().unwrap_or_default().starts_with("I like apples"))
        .count();
    assert_eq!(apples, 1);
}

#[tokio::test]
async fn test_failed_translation_is_stored_as_null() {
    let failing = "Tom is good at playing basketball.";
    let h = harness(&three_pages(), &[failing]).await;
    let job_id = h.submit(None, three_images()).await;

    let result = succeeded(h.runner.run(&job_id, 1).await.unwrap());
    assert_eq!(h.translator.calls_for(failing), 3);

    let payloads = h.stored_payloads(&result.version_id).await;
    let failed = payloads
        .iter()
        .find(|p| p["english"] == failing)
        .expect("句子应该被保留");
    assert!(failed["cn"].is_null());
    assert!(failed["translation"].is_null());

    let translated = payloads
        .iter()
        .filter(|p| p["cn"].as_str().is_some_and(|cn| cn.starts_with("译文：")))
        .count();
    assert_eq!(translated, 14);

    let logs = h.store.list_logs(&job_id).await.unwrap();
    assert!(logs
        .iter()
        .any(|l| l.level == LogLevel::Warning && l.message.contains("翻译失败")));
}

#[tokio::test]
async fn test_existing_draft_is_replaced() {
    let h = harness(&three_pages(), &[]).await;

    let first = h.submit(None, three_images()).await;
    let first = succeeded(h.runner.run(&first, 1).await.unwrap());

    let second = h.submit(None, vec![image("p1", "uploads/p1")]).await;
    let second = succeeded(h.runner.run(&second, 1).await.unwrap());

    assert_ne!(first.version_id, second.version_id);
    assert!(h.store.lessons_for_version(&first.version_id).await.is_empty());

    let versions = h.store.versions_for_package("pkg").await;
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].label, "AI Draft #1");

    let sequences: Vec<u32> = h
        .store
        .lessons_for_version(&second.version_id)
        .await
        .iter()
        .map(|l| l.sequence)
        .collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    let package = h.store.get_package("pkg").await.unwrap();
    assert_eq!(package.current_version_id, Some(second.version_id));
}

#[tokio::test]
async fn test_unit_scoped_job_continues_sequence() {
    let h = harness(&three_pages(), &[]).await;

    let whole = h.submit(None, vec![image("p1", "uploads/p1")]).await;
    let whole = succeeded(h.runner.run(&whole, 1).await.unwrap());

    let unit = h.submit(Some("u2"), vec![image("p2", "uploads/p2")]).await;
    let unit = succeeded(h.runner.run(&unit, 1).await.unwrap());
    assert_eq!(unit.version_id, whole.version_id);

    // 同一单元再生成一次：只替换该单元的关卡
    let again = h.submit(Some("u2"), vec![image("p3", "uploads/p3")]).await;
    succeeded(h.runner.run(&again, 1).await.unwrap());

    let lessons = h.store.lessons_for_version(&whole.version_id).await;
    assert_eq!(lessons.len(), 10);
    let unit_sequences: Vec<u32> = lessons
        .iter()
        .filter(|l| l.unit_id.as_deref() == Some("u2"))
        .map(|l| l.sequence)
        .collect();
    assert_eq!(unit_sequences, vec![6, 7, 8, 9, 10]);
    assert_eq!(h.store.count_lessons(&whole.version_id).await.unwrap(), 10);
}

// ========== 性质 ==========

#[tokio::test]
async fn test_rounds_are_balanced_when_capacity_is_small() {
    let small = PipelineSettings {
        round_capacity: 4,
        ..settings()
    };
    let h = harness_with(&three_pages(), &[], small).await;
    let job_id = h.submit(None, three_images()).await;
    let result = succeeded(h.runner.run(&job_id, 1).await.unwrap());
    assert_eq!(result.lesson_count, 15);

    let mut sizes: HashMap<u64, usize> = HashMap::new();
    for payload in h.stored_payloads(&result.version_id).await {
        *sizes.entry(payload["round"]["index"].as_u64().unwrap()).or_default() += 1;
    }
    let mut sizes: Vec<usize> = sizes.into_values().collect();
    sizes.sort();
    assert_eq!(sizes, vec![3, 4, 4, 4]);
}

#[tokio::test]
async fn test_stored_payloads_are_consistent_and_distinct() {
    let h = harness(&three_pages(), &[]).await;
    let job_id = h.submit(None, three_images()).await;
    let result = succeeded(h.runner.run(&job_id, 1).await.unwrap());

    let payloads = h.stored_payloads(&result.version_id).await;
    for payload in &payloads {
        assert_eq!(payload["english"], payload["answer"]);
        assert_eq!(payload["english"], payload["target"]);
        let parsed = from_stored(payload).expect("英文句子不能为空");
        assert!(!parsed.english.is_empty());
    }

    let token_sets: Vec<BTreeSet<String>> = payloads
        .iter()
        .map(|p| tokenize(p["english"].as_str().unwrap_or_default()).into_iter().collect())
        .collect();
    for (i, a) in token_sets.iter().enumerate() {
        for b in &token_sets[i + 1..] {
            assert!(jaccard(a, b) < 0.85);
        }
    }
}

#[tokio::test]
async fn test_rerun_produces_same_lesson_count() {
    let h = harness(&three_pages(), &[]).await;
    let first = h.submit(None, three_images()).await;
    let first = succeeded(h.runner.run(&first, 1).await.unwrap());
    let calls_after_first = h.translator.total.load(Ordering::SeqCst);

    let second = h.submit(None, three_images()).await;
    let second = succeeded(h.runner.run(&second, 1).await.unwrap());

    assert_eq!(first.lesson_count, second.lesson_count);
    // 第二次全部命中翻译缓存
    assert_eq!(h.translator.total.load(Ordering::SeqCst), calls_after_first);
}

// ========== 状态机与队列 ==========

#[tokio::test]
async fn test_canceled_job_is_skipped() {
    let h = harness(&three_pages(), &[]).await;
    let job_id = h.submit(None, three_images()).await;
    h.store
        .update_job(
            &job_id,
            course_gen_worker::models::JobUpdate::status(JobStatus::Canceled),
        )
        .await
        .unwrap();

    let outcome = h.runner.run(&job_id, 1).await.unwrap();
    assert_eq!(outcome, RunOutcome::Skipped(JobStatus::Canceled));
    assert!(h.store.versions_for_package("pkg").await.is_empty());
}

#[tokio::test]
async fn test_unknown_job_is_reported() {
    let h = harness(&three_pages(), &[]).await;
    let err = h.runner.run("missing", 1).await.unwrap_err();
    assert!(matches!(err, PipelineError::JobNotFound(id) if id == "missing"));
}

#[tokio::test]
async fn test_worker_pool_redelivers_store_failures() {
    let h = harness(&three_pages(), &[]).await;
    let ok = h.submit(None, three_images()).await;

    // 课程包不存在：存储错误，可以重投
    let orphan = GenerationJob::queued("ghost", None, three_images());
    let orphan_id = orphan.id.clone();
    h.store.insert_job(orphan).await.unwrap();

    // 输入缺陷：不重投
    let bad = h.submit(None, Vec::new()).await;

    let config = Config {
        max_concurrent_jobs: 2,
        max_delivery_attempts: 3,
        redelivery_delay_ms: 0,
        ..Config::default()
    };
    let pool = WorkerPool::new(Arc::new(h.runner), &config);
    let stats = pool.run(vec![ok.clone(), orphan_id.clone(), bad.clone()]).await;

    assert_eq!(stats.total, 3);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.redelivered, 2);

    assert_eq!(h.store.get_job(&ok).await.unwrap().status, JobStatus::Succeeded);
    let orphan = h.store.get_job(&orphan_id).await.unwrap();
    assert_eq!(orphan.status, JobStatus::Failed);
    assert_eq!(
        h.store
            .list_logs(&orphan_id)
            .await
            .unwrap()
            .iter()
            .filter(|l| l.level == LogLevel::Error)
            .count(),
        3
    );
    assert_eq!(h.store.get_job(&bad).await.unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn test_redelivered_success_clears_previous_failure() {
    let h = harness(&three_pages(), &[]).await;
    let job = GenerationJob::queued("ghost", None, three_images());
    let job_id = job.id.clone();
    h.store.insert_job(job).await.unwrap();

    // 第一次投递：课程包还不存在
    assert!(h.runner.run(&job_id, 1).await.is_err());
    let failed = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error_message.is_some());
    assert!(failed.completed_at.is_some());

    h.store
        .insert_package(CoursePackage {
            id: "ghost".to_string(),
            title: "Grade 7 Unit 4".to_string(),
            description: None,
            current_version_id: None,
        })
        .await;

    // 第二次投递成功
    succeeded(h.runner.run(&job_id, 2).await.unwrap());
    let job = h.store.get_job(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert!(job.error_message.is_none());
    let started_at = job.started_at.unwrap();
    let completed_at = job.completed_at.unwrap();
    assert!(completed_at >= started_at);
    assert!(started_at >= failed.completed_at.unwrap());

    // 重新处理期间不再带着上一次的失败信息
    let processing: Vec<GenerationJob> = h
        .jobs
        .snapshots_for(&job_id)
        .into_iter()
        .filter(|j| j.status == JobStatus::Processing)
        .collect();
    assert_eq!(processing.len(), 10);
    assert!(processing
        .iter()
        .all(|j| j.error_message.is_none() && j.completed_at.is_none()));
}
