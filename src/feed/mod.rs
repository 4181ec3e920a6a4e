pub mod replay;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use types::FeedBatch;

/// Source of odds, probability estimates and betting splits.
#[async_trait]
pub trait QuoteFeed: Send {
    /// Next batch, or `None` once the feed is exhausted.
    async fn next_batch(&mut self) -> Result<Option<FeedBatch>>;
}
