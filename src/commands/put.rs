use anyhow::{bail, Context};
use tokio::io::AsyncReadExt;

use crate::models::NewPaste;
use crate::App;

pub async fn run(
    app: App,
    owner: &str,
    title: Option<String>,
    syntax: Option<String>,
) -> anyhow::Result<()> {
    let mut data = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut data)
        .await
        .context("failed to read paste from stdin")?;

    if data.is_empty() {
        bail!("nothing to paste, stdin was empty");
    }

    let paste = NewPaste {
        data: data.into(),
        title,
        syntax,
    };
    let id = app.store.put(&paste, owner).await?;

    println!(
        "{base_url}/{id}",
        base_url = app.config.base_url.trim_end_matches('/')
    );

    Ok(())
}
