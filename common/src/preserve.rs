use anyhow::{Context, Result};
use std::path::Path;
use tracing::instrument;

/// Copy permissions and access/modification times of `src` onto `dst`.
///
/// Must run after the last write to `dst`, otherwise the modification time is bumped again.
#[instrument]
pub async fn set_file_metadata(src: &Path, dst: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(src)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &src))?;
    let dst = dst.to_owned();
    tokio::task::spawn_blocking(move || -> Result<()> {
        // set timestamps first - those are unlikely to fail
        tracing::debug!("setting timestamps");
        let atime = filetime::FileTime::from_last_access_time(&metadata);
        let mtime = filetime::FileTime::from_last_modification_time(&metadata);
        filetime::set_file_times(&dst, atime, mtime)
            .with_context(|| format!("failed setting timestamps for {:?}", &dst))?;
        let permissions = metadata.permissions();
        std::fs::set_permissions(&dst, permissions.clone())
            .with_context(|| format!("cannot set {:?} permissions to {:?}", &dst, &permissions))?;
        Ok(())
    })
    .await?
}
