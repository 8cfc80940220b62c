//! Credential loading and the first-run authorization exchange.
//!
//! The credential file is a JSON object holding `consumer_key` and
//! `consumer_secret`, plus `access_token` and `access_token_secret` once the
//! account has been authorized. Authorization uses the PIN based
//! (out-of-band) flow, and the resulting tokens are written back to the
//! same file so later runs never need to prompt.

use anyhow::Context;
use async_trait::async_trait;
use egg_mode::{KeyPair, Token};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const CONSUMER_KEYS: [&str; 2] = ["consumer_key", "consumer_secret"];
pub const ACCESS_TOKENS: [&str; 2] = ["access_token", "access_token_secret"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Credential file {0} does not exist")]
    Missing(PathBuf),
    #[error("Unable to read credential file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Credential file {0} is not a JSON object of strings: {1}")]
    Malformed(PathBuf, #[source] serde_json::Error),
    #[error("Credentials are missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),
    #[error("Unable to write credential file {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Account is not authorized yet, run the `authorize` command first")]
    InteractionRequired,
    #[error("Failed to get request token: {0}")]
    RequestToken(#[source] egg_mode::error::Error),
    #[error("Failed to get access token: {0}")]
    AccessToken(#[source] egg_mode::error::Error),
    #[error("Access token was rejected: {0}")]
    Verify(#[source] egg_mode::error::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStatus {
    /// A consumer key is absent, nothing can be done with these
    Incomplete { missing: Vec<&'static str> },
    /// Consumer keys are present but the account still has to be authorized
    NeedsAuthorization,
    Complete,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct Credentials {
    keys: BTreeMap<String, String>,
}

impl Credentials {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()))
            }
            Err(e) => return Err(ConfigError::Io(path.to_path_buf(), e)),
        };
        serde_json::from_str(&contents).map_err(|e| ConfigError::Malformed(path.to_path_buf(), e))
    }

    /// Writes the keys sorted and indented by four spaces
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let CredentialStatus::Incomplete { missing } = self.status() {
            return Err(ConfigError::MissingKeys(missing));
        }
        let mut json = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut json, formatter);
        let write_err = |e| ConfigError::Write(path.to_path_buf(), e);
        self.serialize(&mut serializer)
            .map_err(|e| write_err(e.into()))?;
        // Replace atomically, an interrupted write must not lose the consumer keys
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
        temp.write_all(&json).map_err(write_err)?;
        temp.flush().map_err(write_err)?;
        temp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    pub fn status(&self) -> CredentialStatus {
        let missing = CONSUMER_KEYS
            .into_iter()
            .filter(|k| !self.keys.contains_key(*k))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            CredentialStatus::Incomplete { missing }
        } else if ACCESS_TOKENS.iter().all(|k| self.keys.contains_key(*k)) {
            CredentialStatus::Complete
        } else {
            CredentialStatus::NeedsAuthorization
        }
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.keys.insert(key.to_string(), value.into());
    }

    fn pair(&self, [key, secret]: [&str; 2]) -> Option<KeyPair> {
        Some(KeyPair::new(
            self.keys.get(key)?.clone(),
            self.keys.get(secret)?.clone(),
        ))
    }

    fn consumer(&self) -> Result<KeyPair, ConfigError> {
        self.pair(CONSUMER_KEYS)
            .ok_or_else(|| ConfigError::MissingKeys(CONSUMER_KEYS.to_vec()))
    }

    /// `None` until both consumer keys and access tokens are present
    pub fn token(&self) -> Option<Token> {
        Some(Token::Access {
            consumer: self.pair(CONSUMER_KEYS)?,
            access: self.pair(ACCESS_TOKENS)?,
        })
    }
}

/// Obtains the PIN shown to the user after they approve the application.
/// Only the interactive setup path ever holds one of these.
#[async_trait]
pub trait VerifierPrompt: Send + Sync {
    async fn verifier(&self, authorize_url: &str) -> anyhow::Result<String>;
}

pub struct StdinPrompt;

#[async_trait]
impl VerifierPrompt for StdinPrompt {
    async fn verifier(&self, authorize_url: &str) -> anyhow::Result<String> {
        println!("{}", authorize_url);
        print!("\nVisit the above URL and input the pin: ");
        std::io::stdout().flush()?;
        let pin = BufReader::new(tokio::io::stdin())
            .lines()
            .next_line()
            .await
            .context("Unable to read pin")?
            .context("No pin entered")?;
        Ok(pin.trim().to_string())
    }
}

/// Loads the credential file and produces a token for API calls.
///
/// When the access tokens are missing and a prompt is given, runs the
/// authorization exchange and persists the new tokens to `path`.
/// Without a prompt this fails with [`AuthError::InteractionRequired`].
pub async fn open_session(
    path: &Path,
    prompt: Option<&dyn VerifierPrompt>,
) -> anyhow::Result<Token> {
    let mut credentials = Credentials::load(path).await?;
    match credentials.status() {
        CredentialStatus::Incomplete { missing } => Err(ConfigError::MissingKeys(missing).into()),
        CredentialStatus::Complete => credentials
            .token()
            .context("Access tokens disappeared from credentials"),
        CredentialStatus::NeedsAuthorization => {
            let prompt = prompt.ok_or(AuthError::InteractionRequired)?;
            let token = authorize(&mut credentials, prompt).await?;
            credentials
                .save(path)
                .await
                .context("Unable to save access tokens")?;
            log::info!("Saved access tokens to {}", path.display());
            Ok(token)
        }
    }
}

async fn authorize(
    credentials: &mut Credentials,
    prompt: &dyn VerifierPrompt,
) -> anyhow::Result<Token> {
    let consumer = credentials.consumer()?;
    let request_token = egg_mode::auth::request_token(&consumer, "oob")
        .await
        .map_err(AuthError::RequestToken)?;
    let authorize_url = egg_mode::auth::authorize_url(&request_token);
    let pin = prompt.verifier(&authorize_url).await?;
    let (token, _user_id, screen_name) =
        egg_mode::auth::access_token(consumer, &request_token, pin)
            .await
            .map_err(AuthError::AccessToken)?;
    if let Token::Access { access, .. } = &token {
        credentials.insert(ACCESS_TOKENS[0], access.key.to_string());
        credentials.insert(ACCESS_TOKENS[1], access.secret.to_string());
    }
    log::info!("Authorized as @{}", screen_name);
    Ok(token)
}

/// Checks the token against the API, returning the account's screen name
pub async fn verify(token: &Token) -> Result<String, AuthError> {
    let user = egg_mode::auth::verify_tokens(token)
        .await
        .map_err(AuthError::Verify)?;
    Ok(user.response.screen_name)
}
