use crate::body::page::{fetch_page, FetchError};
use crate::model::{bare_handle, Corpus};
use crate::render;
use crate::twitter::auth::{open_session, StdinPrompt, VerifierPrompt};
use crate::twitter::v1::TwitterClientV1;
use crate::twitter::TwitterClient;
use crate::BuildArgs;
use anyhow::{bail, Context};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::fs;

mod page;

/// Largest page the user timeline endpoint will return
pub const PAGE_SIZE: u32 = 200;

pub struct BuildOptions {
    /// Directory holding one `<user>_body.json` per account
    pub bodies_dir: PathBuf,
    pub page_size: u32,
    /// Upper bound on page requests for a single account
    pub max_pages: usize,
}

#[derive(Debug)]
pub enum StopReason {
    /// The oldest post held did not change, nothing older is available
    Exhausted,
    /// `max_pages` requests were made without reaching the end
    PageLimit,
    /// Fetching or saving failed, everything saved before is kept
    Failed(FetchError),
}

#[derive(Debug)]
pub struct BuildReport {
    pub pages: usize,
    pub added: usize,
    pub stop: StopReason,
    pub corpus: Corpus,
}

pub async fn build(args: BuildArgs) -> anyhow::Result<()> {
    let usernames = parse_usernames(&args).await?;
    let prompt: Option<&dyn VerifierPrompt> = if args.no_interactive {
        None
    } else {
        Some(&StdinPrompt)
    };
    let token = open_session(&args.keys, prompt)
        .await
        .context("Unable to open Twitter session")?;
    let client = TwitterClientV1::new(token);
    let options = BuildOptions {
        bodies_dir: args.bodies.clone(),
        page_size: PAGE_SIZE,
        max_pages: args.max_pages,
    };
    build_accounts(&usernames, &client, &options, &args).await
}

/// Builds and renders each account in turn. With `continue_on_error` a
/// failing account is logged and skipped, otherwise its error is returned
/// once its partial document has been written.
pub async fn build_accounts(
    usernames: &[String],
    client: &dyn TwitterClient,
    options: &BuildOptions,
    args: &BuildArgs,
) -> anyhow::Result<()> {
    for account in usernames {
        if let Err(e) = build_account(account, client, options, args).await {
            if args.continue_on_error {
                log::warn!("Error building body for: {}, ignoring... ({:#})", account, e);
            } else {
                return Err(e);
            }
        }
    }
    Ok(())
}

async fn parse_usernames(args: &BuildArgs) -> anyhow::Result<Vec<String>> {
    let mut account_names = BTreeSet::new();
    if let Some(users) = &args.users {
        users.split(',').for_each(|s| {
            account_names.insert(bare_handle(s.trim()).to_string());
        });
    }
    if let Some(list) = &args.list {
        let list = fs::read_to_string(list)
            .await
            .context("Unable to read users list")?;
        list.lines().for_each(|l| {
            account_names.insert(bare_handle(l.trim()).to_string());
        });
    }
    account_names.remove("");
    if account_names.is_empty() {
        bail!("No usernames provided")
    }
    Ok(account_names.into_iter().collect())
}

async fn build_account(
    username: &str,
    client: &dyn TwitterClient,
    options: &BuildOptions,
    args: &BuildArgs,
) -> anyhow::Result<()> {
    let report = build_body(username, client, options).await?;
    log::info!(
        "Got {} new posts for {} in {} pages, {} stored",
        report.added,
        username,
        report.pages,
        report.corpus.len()
    );

    if !args.no_render {
        let out_dir = args.out_dir.as_ref().unwrap_or(&args.bodies);
        let out = out_dir.join(render::document_name(username));
        render::write_document(&out, &report.corpus).await?;
        log::info!("Wrote {}", out.display());
        if !args.no_launch {
            render::open_in_viewer(&out);
        }
    }

    match report.stop {
        StopReason::Failed(e) => {
            Err(anyhow::Error::new(e).context(format!("Stopped early for {}", username)))
        }
        _ => Ok(()),
    }
}

/// Walks back through `user`'s timeline one page at a time, merging each
/// page into the corpus on disk, until a page adds nothing older.
///
/// Every page is persisted before the next request, so a failure part way
/// through keeps everything fetched up to that point. Failures end the
/// loop and are returned in [`BuildReport::stop`]; only being unable to
/// create the corpus directory is returned as an error.
pub async fn build_body(
    user: &str,
    client: &dyn TwitterClient,
    options: &BuildOptions,
) -> anyhow::Result<BuildReport> {
    fs::create_dir_all(&options.bodies_dir)
        .await
        .context("Unable to create bodies directory")?;
    let path = Corpus::path_for(&options.bodies_dir, user);

    let mut corpus = Corpus::default();
    // Outer `None` until the first request, so it never equals a watermark
    let mut previous_watermark: Option<Option<u64>> = None;
    let mut pages = 0;
    let mut added = 0;

    let stop = loop {
        corpus = match Corpus::load(&path).await {
            Ok(Some(existing)) => existing,
            Ok(None) => {
                log::info!("{} does not exist yet, starting fresh", path.display());
                Corpus::default()
            }
            Err(e) => break StopReason::Failed(e.into()),
        };
        let watermark = corpus.watermark();
        if previous_watermark == Some(watermark) {
            break StopReason::Exhausted;
        }
        if pages >= options.max_pages {
            break StopReason::PageLimit;
        }
        match watermark {
            Some(max_id) => log::info!("Fetching posts for {} up to id {}", user, max_id),
            None => log::info!("Fetching most recent posts for {}", user),
        }

        let page = match fetch_page(client, user, watermark, options.page_size).await {
            Ok(page) => page,
            Err(e) => break StopReason::Failed(e),
        };
        pages += 1;
        added += corpus.merge(page);
        if let Err(e) = corpus.save(&path).await {
            break StopReason::Failed(e.into());
        }
        previous_watermark = Some(watermark);
    };

    match &stop {
        StopReason::Exhausted => {}
        StopReason::PageLimit => log::warn!(
            "Stopped after {} pages for {}, run again to continue",
            pages,
            user
        ),
        StopReason::Failed(e) => log::error!("{}", e),
    }
    Ok(BuildReport {
        pages,
        added,
        stop,
        corpus,
    })
}
