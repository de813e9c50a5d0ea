//! 基础设施层（Infrastructure）
//!
//! 不认识课程、句子、任务，只提供通用能力：
//! - `retry` - 指数退避重试
//! - `cache` - 带 TTL 的内容哈希缓存
//! - `batch` - 分批有限并发

pub mod batch;
pub mod cache;
pub mod retry;

pub use batch::run_in_batches;
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use retry::{retry_with_backoff, RetryPolicy};
