use crate::emoji::demojize;
use crate::model::{CorpusError, Post};
use crate::twitter::{TwitterClient, TRUNCATION_MARKER};
use std::error::Error as StdError;
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unable to fetch posts older than {}: {source}", describe(.max_id))]
    Page {
        max_id: Option<u64>,
        #[source]
        source: BoxError,
    },
    #[error("Unable to fetch full text of post {id}: {source}")]
    FullText {
        id: u64,
        #[source]
        source: BoxError,
    },
    #[error(transparent)]
    Corpus(#[from] CorpusError),
}

fn describe(max_id: &Option<u64>) -> String {
    match max_id {
        Some(id) => format!("id {}", id),
        None => "the most recent post".to_string(),
    }
}

/// Fetches one page of posts at or below `max_id`, replacing truncated
/// texts with the full version and encoding emoji for storage.
pub async fn fetch_page(
    client: &dyn TwitterClient,
    user: &str,
    max_id: Option<u64>,
    count: u32,
) -> Result<Vec<Post>, FetchError> {
    let posts = client
        .get_tweets_older_than(user, max_id, count)
        .await
        .map_err(|e| FetchError::Page {
            max_id,
            source: e.into(),
        })?;
    let mut page = Vec::with_capacity(posts.len());
    for mut post in posts {
        if post.text.contains(TRUNCATION_MARKER) {
            log::debug!("Post {} looks truncated, fetching full text", post.id);
            post.text = client
                .get_full_text(post.id)
                .await
                .map_err(|e| FetchError::FullText {
                    id: post.id,
                    source: e.into(),
                })?;
        }
        post.text = demojize(&post.text);
        page.push(post);
    }
    Ok(page)
}
