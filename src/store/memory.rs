//! 进程内存储
//!
//! 同时实现 `CourseStore` 和 `JobStore`，用于命令行运行和测试。
//! 所有操作在一把锁内完成，等价于每个调用一个事务。

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CourseStore, CoursePackage, JobStore, LessonItemRecord, LessonRecord, LessonVersionRecord,
    NewLesson, NewVersion, PackageVersion, VersionStatus,
};
use crate::error::StoreError;
use crate::models::{GenerationJob, JobLogEntry, JobUpdate};

/// 存储内容快照（导出为 JSON）
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub packages: Vec<CoursePackage>,
    pub versions: Vec<PackageVersion>,
    pub lessons: Vec<LessonRecord>,
    pub lesson_versions: Vec<LessonVersionRecord>,
    pub lesson_items: Vec<LessonItemRecord>,
    pub jobs: Vec<GenerationJob>,
    pub logs: HashMap<String, Vec<JobLogEntry>>,
}

#[derive(Debug, Default)]
struct State {
    packages: HashMap<String, CoursePackage>,
    versions: Vec<PackageVersion>,
    lessons: Vec<LessonRecord>,
    lesson_versions: Vec<LessonVersionRecord>,
    items: Vec<LessonItemRecord>,
    jobs: HashMap<String, GenerationJob>,
    logs: HashMap<String, Vec<JobLogEntry>>,
    /// 被"其他任务"占用的序号（package_id, sequence）
    reserved: BTreeSet<(String, u32)>,
}

impl State {
    fn remove_lessons<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&LessonRecord) -> bool,
    {
        let lesson_ids: Vec<String> = self
            .lessons
            .iter()
            .filter(|l| predicate(l))
            .map(|l| l.id.clone())
            .collect();
        if lesson_ids.is_empty() {
            return 0;
        }

        let version_ids: Vec<String> = self
            .lesson_versions
            .iter()
            .filter(|v| lesson_ids.contains(&v.lesson_id))
            .map(|v| v.id.clone())
            .collect();

        self.items
            .retain(|item| !version_ids.contains(&item.lesson_version_id));
        self.lesson_versions
            .retain(|v| !lesson_ids.contains(&v.lesson_id));
        self.lessons.retain(|l| !lesson_ids.contains(&l.id));
        lesson_ids.len()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_package(&self, package: CoursePackage) {
        let mut state = self.state.lock().await;
        state.packages.insert(package.id.clone(), package);
    }

    /// 模拟并发任务已经占用了这些序号，写入时会触发序号冲突
    pub async fn reserve_sequences(&self, package_id: &str, sequences: &[u32]) {
        let mut state = self.state.lock().await;
        for seq in sequences {
            state.reserved.insert((package_id.to_string(), *seq));
        }
    }

    /// 修改版本状态（模拟发布）
    pub async fn set_version_status(
        &self,
        version_id: &str,
        status: VersionStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let version = state
            .versions
            .iter_mut()
            .find(|v| v.id == version_id)
            .ok_or_else(|| not_found("PackageVersion", version_id))?;
        version.status = status;
        Ok(())
    }

    pub async fn versions_for_package(&self, package_id: &str) -> Vec<PackageVersion> {
        let state = self.state.lock().await;
        state
            .versions
            .iter()
            .filter(|v| v.package_id == package_id)
            .cloned()
            .collect()
    }

    /// 版本内的关卡（按序号排序）
    pub async fn lessons_for_version(&self, version_id: &str) -> Vec<LessonRecord> {
        let state = self.state.lock().await;
        let mut lessons: Vec<LessonRecord> = state
            .lessons
            .iter()
            .filter(|l| l.package_version_id == version_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.sequence);
        lessons
    }

    /// 关卡当前版本的内容项（按顺序）
    pub async fn items_for_lesson(&self, lesson_id: &str) -> Vec<LessonItemRecord> {
        let state = self.state.lock().await;
        let Some(version_id) = state
            .lessons
            .iter()
            .find(|l| l.id == lesson_id)
            .and_then(|l| l.current_version_id.clone())
        else {
            return Vec::new();
        };
        let mut items: Vec<LessonItemRecord> = state
            .items
            .iter()
            .filter(|item| item.lesson_version_id == version_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.order_index);
        items
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock().await;
        let mut packages: Vec<CoursePackage> = state.packages.values().cloned().collect();
        packages.sort_by(|a, b| a.id.cmp(&b.id));
        let mut jobs: Vec<GenerationJob> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);

        StoreSnapshot {
            packages,
            versions: state.versions.clone(),
            lessons: state.lessons.clone(),
            lesson_versions: state.lesson_versions.clone(),
            lesson_items: state.items.clone(),
            jobs,
            logs: state.logs.clone(),
        }
    }
}

fn not_found(entity: &'static str, id: &str) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl CourseStore for InMemoryStore {
    async fn get_package(&self, package_id: &str) -> Result<CoursePackage, StoreError> {
        let state = self.state.lock().await;
        state
            .packages
            .get(package_id)
            .cloned()
            .ok_or_else(|| not_found("CoursePackage", package_id))
    }

    async fn find_draft_version(
        &self,
        package_id: &str,
    ) -> Result<Option<PackageVersion>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .versions
            .iter()
            .filter(|v| v.package_id == package_id && v.status == VersionStatus::Draft)
            .max_by_key(|v| v.version_number)
            .cloned())
    }

    async fn max_version_number(&self, package_id: &str) -> Result<u32, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .versions
            .iter()
            .filter(|v| v.package_id == package_id)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0))
    }

    async fn delete_version_cascade(&self, version_id: &str) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let removed = state.remove_lessons(|l| l.package_version_id == version_id);
        state.versions.retain(|v| v.id != version_id);
        for package in state.packages.values_mut() {
            if package.current_version_id.as_deref() == Some(version_id) {
                package.current_version_id = None;
            }
        }
        Ok(removed)
    }

    async fn delete_unit_lessons(
        &self,
        version_id: &str,
        unit_id: &str,
    ) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.remove_lessons(|l| {
            l.package_version_id == version_id && l.unit_id.as_deref() == Some(unit_id)
        }))
    }

    async fn max_lesson_sequence(&self, version_id: &str) -> Result<u32, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .lessons
            .iter()
            .filter(|l| l.package_version_id == version_id)
            .map(|l| l.sequence)
            .max()
            .unwrap_or(0))
    }

    async fn create_version(&self, version: NewVersion) -> Result<PackageVersion, StoreError> {
        let mut state = self.state.lock().await;
        if !state.packages.contains_key(&version.package_id) {
            return Err(not_found("CoursePackage", &version.package_id));
        }
        let record = PackageVersion {
            id: Uuid::new_v4().to_string(),
            package_id: version.package_id,
            version_number: version.version_number,
            label: version.label,
            notes: version.notes,
            status: VersionStatus::Draft,
            source_type: "ai_generated".to_string(),
            payload: Value::Null,
            created_by: version.created_by,
            created_at: Utc::now(),
        };
        state.versions.push(record.clone());
        Ok(record)
    }

    async fn update_version_payload(
        &self,
        version_id: &str,
        payload: Value,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let version = state
            .versions
            .iter_mut()
            .find(|v| v.id == version_id)
            .ok_or_else(|| not_found("PackageVersion", version_id))?;
        version.payload = payload;
        Ok(())
    }

    async fn create_lesson(&self, lesson: NewLesson) -> Result<LessonRecord, StoreError> {
        let mut state = self.state.lock().await;

        if !state.versions.iter().any(|v| v.id == lesson.package_version_id) {
            return Err(not_found("PackageVersion", &lesson.package_version_id));
        }

        let taken = state.lessons.iter().any(|l| {
            l.package_version_id == lesson.package_version_id && l.sequence == lesson.sequence
        }) || state
            .reserved
            .contains(&(lesson.package_id.clone(), lesson.sequence));
        if taken {
            return Err(StoreError::SequenceConflict {
                version_id: lesson.package_version_id,
                sequence: lesson.sequence,
            });
        }

        let lesson_id = Uuid::new_v4().to_string();
        let lesson_version_id = Uuid::new_v4().to_string();

        let record = LessonRecord {
            id: lesson_id.clone(),
            package_id: lesson.package_id,
            package_version_id: lesson.package_version_id,
            unit_id: lesson.unit_id,
            title: lesson.title.clone(),
            sequence: lesson.sequence,
            current_version_id: Some(lesson_version_id.clone()),
        };

        state.lesson_versions.push(LessonVersionRecord {
            id: lesson_version_id.clone(),
            lesson_id,
            version_number: 1,
            title: lesson.title,
            summary: lesson.summary,
            difficulty: lesson.difficulty,
            status: VersionStatus::Draft,
        });

        for (index, item) in lesson.items.into_iter().enumerate() {
            state.items.push(LessonItemRecord {
                id: Uuid::new_v4().to_string(),
                lesson_version_id: lesson_version_id.clone(),
                order_index: index as u32 + 1,
                item_type: item.item_type,
                title: item.title,
                payload: item.payload,
            });
        }

        state.lessons.push(record.clone());
        Ok(record)
    }

    async fn set_current_version(
        &self,
        package_id: &str,
        version_id: &str,
        description_fallback: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let package = state
            .packages
            .get_mut(package_id)
            .ok_or_else(|| not_found("CoursePackage", package_id))?;
        package.current_version_id = Some(version_id.to_string());
        let empty = package
            .description
            .as_deref()
            .map_or(true, |d| d.trim().is_empty());
        if empty && !description_fallback.trim().is_empty() {
            package.description = Some(description_fallback.to_string());
        }
        Ok(())
    }

    async fn count_lessons(&self, version_id: &str) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .lessons
            .iter()
            .filter(|l| l.package_version_id == version_id)
            .count())
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn insert_job(&self, job: GenerationJob) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<GenerationJob, StoreError> {
        let state = self.state.lock().await;
        state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| not_found("GenerationJob", job_id))
    }

    async fn update_job(
        &self,
        job_id: &str,
        update: JobUpdate,
    ) -> Result<GenerationJob, StoreError> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| not_found("GenerationJob", job_id))?;
        job.apply(update);
        Ok(job.clone())
    }

    async fn append_log(&self, job_id: &str, entry: JobLogEntry) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .logs
            .entry(job_id.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn list_logs(&self, job_id: &str) -> Result<Vec<JobLogEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.logs.get(job_id).cloned().unwrap_or_default())
    }
}
