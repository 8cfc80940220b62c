mod body;
mod emoji;
mod model;
mod render;
mod twitter;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use twitter::auth::{open_session, verify, StdinPrompt};

#[derive(Parser, Debug)]
#[clap(version, about = "Collect a Twitter account's posts into a local body")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch posts into each user's body file, then render it
    Build(BuildArgs),
    /// Render a stored body file without contacting Twitter
    Render(RenderArgs),
    /// First-run setup: authorize this application and save the access tokens
    Authorize(AuthorizeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Path to the credential file
    #[clap(short, long, default_value = "./consumer_keys.json")]
    pub keys: PathBuf,
    /// Directory holding the body files
    #[clap(short, long, default_value = "./bodies")]
    pub bodies: PathBuf,
    /// Username(s) to collect (comma seperated, leading @ optional)
    #[clap(short, long)]
    pub users: Option<String>,
    /// File containing list of usernames to collect (one per line)
    #[clap(short, long)]
    pub list: Option<PathBuf>,
    /// Stop after this many page requests per user
    #[clap(long, default_value_t = 100)]
    pub max_pages: usize,
    /// Where to write rendered documents (defaults to the bodies directory)
    #[clap(long)]
    pub out_dir: Option<PathBuf>,
    /// Only update the body files
    #[clap(long)]
    pub no_render: bool,
    /// Don't open rendered documents
    #[clap(long)]
    pub no_launch: bool,
    /// Fail instead of prompting when the account is not authorized yet
    #[clap(long)]
    pub no_interactive: bool,
    /// Continue even if an account fails
    #[clap(long)]
    pub continue_on_error: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Username whose body file to render
    #[clap(short, long)]
    pub user: Option<String>,
    /// Path of a body file to render, instead of --user
    #[clap(short, long, conflicts_with = "user")]
    pub corpus: Option<PathBuf>,
    /// Directory holding the body files
    #[clap(short, long, default_value = "./bodies")]
    pub bodies: PathBuf,
    /// Path of the document to write
    #[clap(short, long)]
    pub out: Option<PathBuf>,
    /// Don't open the rendered document
    #[clap(long)]
    pub no_launch: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AuthorizeArgs {
    /// Path to the credential file
    #[clap(short, long, default_value = "./consumer_keys.json")]
    pub keys: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = main2().await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn main2() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Build(args) => body::build(args).await,
        Command::Render(args) => render::render_stored(args).await,
        Command::Authorize(args) => authorize(args).await,
    }
}

async fn authorize(args: AuthorizeArgs) -> anyhow::Result<()> {
    let token = open_session(&args.keys, Some(&StdinPrompt)).await?;
    let screen_name = verify(&token)
        .await
        .context("Unable to verify credentials")?;
    log::info!("Credentials in {} work for @{}", args.keys.display(), screen_name);
    Ok(())
}
