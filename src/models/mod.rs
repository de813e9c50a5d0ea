pub mod job;
pub mod loaders;
pub mod material;
pub mod plan;
pub mod sentence;

pub use job::{GenerationJob, JobInput, JobLogEntry, JobResult, JobStatus, JobUpdate, LogLevel};
pub use loaders::{load_all_manifests, load_manifest, JobManifest};
pub use material::{assign_page_offsets, Material, MaterialDescriptor, PageText, SourceKind};
pub use plan::{CoursePlan, LessonItemPlan, LessonItemType, LessonPlan, SentencePayload};
pub use sentence::{RawSentence, SelectedSentence, SentenceCandidate};
