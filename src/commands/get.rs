use anyhow::anyhow;
use tokio::io::AsyncWriteExt;

use crate::App;

pub async fn run(app: App, id: &str) -> anyhow::Result<()> {
    let paste = app
        .store
        .get(id)
        .await?
        .ok_or_else(|| anyhow!("no paste with id '{id}'"))?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&paste.data).await?;
    stdout.flush().await?;

    Ok(())
}
