use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::fs;

/// A single item from a user's timeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    pub text: String,
}

impl Post {
    pub fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Unable to read corpus {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Corpus {0} is not a valid JSON object of post ids: {1}")]
    Malformed(PathBuf, #[source] serde_json::Error),
    #[error("Unable to write corpus {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),
    #[error("Corpus path has no parent directory: {0}")]
    InvalidPath(PathBuf),
}

/// Posts collected for one user, keyed by post id.
///
/// Stored on disk as a single JSON object mapping the stringified id to
/// the emoji-encoded text, e.g. `{"90":"older","100":"hello"}`.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Corpus {
    posts: BTreeMap<u64, String>,
}

impl Corpus {
    /// `<dir>/<user without @>_body.json`
    pub fn path_for(dir: &Path, user: &str) -> PathBuf {
        dir.join(format!("{}_body.json", bare_handle(user)))
    }

    /// Returns `None` when no corpus has been written for this path yet
    pub async fn load(path: &Path) -> Result<Option<Self>, CorpusError> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CorpusError::Read(path.to_path_buf(), e)),
        };
        // A zero length file is what an interrupted first run leaves behind
        if contents.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| CorpusError::Malformed(path.to_path_buf(), e))
    }

    /// Replaces the file at `path` atomically, so a failed write never
    /// truncates what was collected before.
    pub async fn save(&self, path: &Path) -> Result<(), CorpusError> {
        let parent = path
            .parent()
            .ok_or_else(|| CorpusError::InvalidPath(path.to_path_buf()))?;
        let write_err = |e| CorpusError::Write(path.to_path_buf(), e);
        fs::create_dir_all(parent).await.map_err(write_err)?;
        let json = serde_json::to_vec(self)
            .map_err(|e| CorpusError::Write(path.to_path_buf(), e.into()))?;
        let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
        temp.write_all(&json).map_err(write_err)?;
        temp.flush().map_err(write_err)?;
        temp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    /// Inserts the posts, overwriting any existing text for the same id.
    /// Returns the number of ids that were not present before.
    pub fn merge(&mut self, posts: impl IntoIterator<Item = Post>) -> usize {
        posts
            .into_iter()
            .filter(|post| self.posts.insert(post.id, post.text.clone()).is_none())
            .count()
    }

    pub fn oldest_id(&self) -> Option<u64> {
        self.posts.keys().next().copied()
    }

    /// Upper bound (inclusive) for the next page request: one below the
    /// oldest id held, or `None` to request the most recent page.
    pub fn watermark(&self) -> Option<u64> {
        self.oldest_id().map(|id| id.saturating_sub(1))
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Texts in ascending id order
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.posts.values().map(String::as_str)
    }
}

impl FromIterator<Post> for Corpus {
    fn from_iter<I: IntoIterator<Item = Post>>(iter: I) -> Self {
        let mut corpus = Corpus::default();
        corpus.merge(iter);
        corpus
    }
}

pub fn bare_handle(user: &str) -> &str {
    user.trim_start_matches('@')
}
