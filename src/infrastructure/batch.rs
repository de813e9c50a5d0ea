//! 分批并发执行
//!
//! 每批最多 `concurrency` 个任务同时执行，批次之间等待 `delay`，
//! 用来避免外部服务限频。结果顺序与输入一致。

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::debug;

pub async fn run_in_batches<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    delay: Duration,
    f: F,
) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let concurrency = concurrency.max(1);
    let total = items.len();
    let total_batches = total.div_ceil(concurrency);
    let mut results = Vec::with_capacity(total);
    let mut iter = items.into_iter().peekable();
    let mut batch_num = 0;

    while iter.peek().is_some() {
        batch_num += 1;
        let batch: Vec<T> = iter.by_ref().take(concurrency).collect();
        debug!("执行第 {}/{} 批，共 {} 个", batch_num, total_batches, batch.len());

        results.extend(join_all(batch.into_iter().map(&f)).await);

        // 批次间延迟，避免限频
        if iter.peek().is_some() && !delay.is_zero() {
            sleep(delay).await;
        }
    }

    results
}
