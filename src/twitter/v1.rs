use crate::model::{bare_handle, Post};
use crate::twitter::TwitterClient;
use anyhow::Context;
use async_trait::async_trait;
use egg_mode::Token;

pub struct TwitterClientV1 {
    token: Token,
}

impl TwitterClientV1 {
    pub fn new(token: Token) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TwitterClient for TwitterClientV1 {
    async fn get_tweets_older_than(
        &self,
        user: &str,
        max_id: Option<u64>,
        count: u32,
    ) -> anyhow::Result<Vec<Post>> {
        let timeline =
            egg_mode::tweet::user_timeline(bare_handle(user).to_string(), true, false, &self.token)
                .with_page_size(count.try_into().context("Page size out of range")?);
        let tweets = timeline
            .call(None, max_id)
            .await
            .with_context(|| format!("Unable to fetch tweets for {}", user))?;
        Ok(tweets.response.into_iter().map(Post::from).collect())
    }

    async fn get_full_text(&self, id: u64) -> anyhow::Result<String> {
        let tweet = egg_mode::tweet::show(id, &self.token)
            .await
            .with_context(|| format!("Unable to fetch tweet {}", id))?;
        Ok(tweet.response.text)
    }
}

impl From<egg_mode::tweet::Tweet> for Post {
    fn from(tweet: egg_mode::tweet::Tweet) -> Self {
        Post {
            id: tweet.id,
            text: tweet.text,
        }
    }
}
