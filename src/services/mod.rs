//! 业务能力层（Services）
//!
//! 每个模块只负责流水线中的一个阶段，不关心任务状态和进度。

pub mod lesson_builder;
pub mod lexicon;
pub mod material_loader;
pub mod payload_compat;
pub mod persistence;
pub mod round_distributor;
pub mod sentence_scorer;
pub mod text_extractor;
pub mod translation_enricher;

pub use lesson_builder::{repair_payloads, LessonPlanBuilder, RepairReport};
pub use material_loader::{LoadReport, MaterialLoader, SkippedMaterial};
pub use persistence::{CommitOutcome, CommitRequest, PersistenceCommitter};
pub use round_distributor::{RoundDistributor, Rounds};
pub use sentence_scorer::SentenceScorer;
pub use text_extractor::{collect_raw_sentences, TextExtractor};
pub use translation_enricher::{EnrichReport, TranslationEnricher};
