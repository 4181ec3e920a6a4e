//! Offline feed that replays recorded batches, one JSON object per line.

use super::types::FeedBatch;
use super::QuoteFeed;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

pub struct ReplayFeed<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl ReplayFeed<BufReader<File>> {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open replay file {}", path.display()))?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> ReplayFeed<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> QuoteFeed for ReplayFeed<R> {
    async fn next_batch(&mut self) -> Result<Option<FeedBatch>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            let trimmed = line.trim();
            // Blank lines and `#` comments are allowed between batches.
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let batch: FeedBatch = serde_json::from_str(trimmed)
                .with_context(|| format!("failed to parse replay batch on line {}", self.line_no))?;
            return Ok(Some(batch));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::{Market, Side};

    const TWO_BATCHES: &str = r#"
# opening lines
{"quotes":[{"event_id":"nfl-1","sport":"nfl","market":"spread","side":"home","american_odds":-110,"line":-3.0,"timestamp":"2026-09-13T12:00:00Z"}]}

{"splits":[{"event_id":"nfl-1","market":"spread","side":"home","bet_pct":0.7,"money_pct":0.4}]}
"#;

    #[tokio::test]
    async fn test_replays_batches_in_order() {
        let mut feed = ReplayFeed::from_reader(TWO_BATCHES.as_bytes());

        let first = feed.next_batch().await.unwrap().unwrap();
        assert_eq!(first.quotes.len(), 1);
        assert_eq!(first.quotes[0].market, Market::Spread);
        assert_eq!(first.quotes[0].line, Some(-3.0));
        assert!(first.splits.is_empty());

        let second = feed.next_batch().await.unwrap().unwrap();
        assert!(second.quotes.is_empty());
        assert_eq!(second.splits[0].side, Side::Home);

        assert!(feed.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_line_reports_line_number() {
        let mut feed = ReplayFeed::from_reader("{}\n{not json}\n".as_bytes());
        assert!(feed.next_batch().await.unwrap().is_some());
        let err = feed.next_batch().await.unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
