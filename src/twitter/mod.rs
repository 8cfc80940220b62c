pub mod auth;
pub mod v1;

use crate::model::Post;
use async_trait::async_trait;

/// Marks text the timeline endpoint has shortened
pub const TRUNCATION_MARKER: char = '…';

#[async_trait]
pub trait TwitterClient {
    /// Up to `count` posts by `user` with an id less than or equal to
    /// `max_id` (the most recent ones when `None`), reshares excluded
    async fn get_tweets_older_than(
        &self,
        user: &str,
        max_id: Option<u64>,
        count: u32,
    ) -> anyhow::Result<Vec<Post>>;

    /// The untruncated text of a single post
    async fn get_full_text(&self, id: u64) -> anyhow::Result<String>;
}
