use crate::emoji::emojize;
use crate::model::{bare_handle, Corpus};
use crate::RenderArgs;
use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// `<user without @>_body.htm`
pub fn document_name(user: &str) -> String {
    format!("{}_body.htm", bare_handle(user))
}

/// One chunk per post, oldest first. Line breaks inside a post become
/// `<br />` so the document reads as a flat list in a browser.
///
/// Post text is not HTML escaped: the API already entity encodes `&`, `<`
/// and `>` in the text it returns.
pub fn render(corpus: &Corpus) -> impl Iterator<Item = String> + '_ {
    corpus.texts().map(render_post)
}

fn render_post(text: &str) -> String {
    let mut text = emojize(text);
    text.push('\n');
    text.replace("\r\n", "\n").replace('\n', "<br />\n")
}

pub async fn write_document(path: &Path, corpus: &Corpus) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Unable to create {}", parent.display()))?;
    }
    let file = File::create(path)
        .await
        .with_context(|| format!("Unable to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    out.write_all(UTF8_BOM).await?;
    for chunk in render(corpus) {
        out.write_all(chunk.as_bytes()).await?;
    }
    out.flush()
        .await
        .with_context(|| format!("Unable to write {}", path.display()))?;
    Ok(())
}

#[cfg(feature = "view")]
pub fn open_in_viewer(path: &Path) {
    if let Err(e) = open::that(path) {
        log::warn!("Unable to open {}: {}", path.display(), e);
    }
}

#[cfg(not(feature = "view"))]
pub fn open_in_viewer(path: &Path) {
    log::info!("Built without viewer support, open {} manually", path.display());
}

/// Renders a stored corpus without contacting the API
pub async fn render_stored(args: RenderArgs) -> anyhow::Result<()> {
    let (corpus_path, default_out) = match (&args.corpus, &args.user) {
        (Some(path), _) => (path.clone(), path.with_extension("htm")),
        (None, Some(user)) => (
            Corpus::path_for(&args.bodies, user),
            args.bodies.join(document_name(user)),
        ),
        (None, None) => bail!("Either --user or --corpus is required"),
    };
    let corpus = Corpus::load(&corpus_path)
        .await?
        .with_context(|| format!("No corpus at {}", corpus_path.display()))?;
    let out: PathBuf = args.out.unwrap_or(default_out);
    write_document(&out, &corpus).await?;
    log::info!("Rendered {} posts to {}", corpus.len(), out.display());
    if !args.no_launch {
        open_in_viewer(&out);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Post;
    use tempfile::TempDir;

    fn corpus(posts: &[(u64, &str)]) -> Corpus {
        posts.iter().map(|(id, text)| Post::new(*id, *text)).collect()
    }

    #[test]
    fn posts_render_oldest_first_with_breaks() {
        let corpus = corpus(&[(100, "hello :crab:"), (90, "first\r\nsecond")]);
        let lines = render(&corpus).collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec!["first<br />\nsecond<br />\n", "hello 🦀<br />\n"]
        );
    }

    #[test]
    fn empty_corpus_renders_nothing() {
        assert_eq!(render(&Corpus::default()).count(), 0);
    }

    #[test]
    fn merging_nothing_does_not_change_output() {
        let original = corpus(&[(1, "one"), (2, "two :pizza:"), (3, "three\nlines")]);
        let mut merged = original.clone();
        merged.merge(Vec::new());
        assert!(render(&merged).eq(render(&original)));
    }

    #[tokio::test]
    async fn document_starts_with_bom() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.htm");
        write_document(&path, &corpus(&[(1, "a"), (2, "b :crab:")]))
            .await
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(
            std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap(),
            "a<br />\nb 🦀<br />\n"
        );
    }

    #[tokio::test]
    async fn document_directory_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not").join("there").join("out.htm");
        write_document(&path, &corpus(&[(1, "a")])).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn stored_corpus_renders_without_launching() {
        let dir = TempDir::new().unwrap();
        corpus(&[(7, "stored")])
            .save(&Corpus::path_for(dir.path(), "@someone"))
            .await
            .unwrap();
        let args = RenderArgs {
            user: Some("@someone".to_string()),
            corpus: None,
            bodies: dir.path().to_path_buf(),
            out: None,
            no_launch: true,
        };
        render_stored(args).await.unwrap();
        let written = std::fs::read(dir.path().join("someone_body.htm")).unwrap();
        assert_eq!(&written[UTF8_BOM.len()..], b"stored<br />\n");
    }

    #[tokio::test]
    async fn missing_corpus_is_reported() {
        let dir = TempDir::new().unwrap();
        let args = RenderArgs {
            user: None,
            corpus: Some(dir.path().join("nonexist_body.json")),
            bodies: dir.path().to_path_buf(),
            out: None,
            no_launch: true,
        };
        assert!(render_stored(args).await.is_err());
    }
}
