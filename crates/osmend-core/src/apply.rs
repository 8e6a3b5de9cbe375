//! Change applier adapter.
//!
//! Persists the change document to a uniquely named transient file and hands
//! it to `osmium apply-changes`. The applier writes only to the output path;
//! the input dataset is never touched in place.

use crate::{Config, Error, Result};
use std::io::Write;
use std::path::Path;
use tokio::process::Command;

/// Apply `change_xml` to `input`, producing `output`.
pub async fn apply_change(
    config: &Config,
    input: &Path,
    output: &Path,
    change_xml: &str,
) -> Result<()> {
    // Random stem keeps concurrent pipeline runs from colliding; the file is
    // removed on drop, best-effort.
    let mut tmp = tempfile::Builder::new()
        .prefix("osmend-")
        .suffix(".osc.xml")
        .tempfile()?;
    tmp.write_all(change_xml.as_bytes())?;
    tmp.flush()?;

    let result = Command::new(&config.osmium_bin)
        .arg("apply-changes")
        .arg("--output")
        .arg(output)
        .arg(input)
        .arg(tmp.path())
        .output()
        .await?;

    if !result.status.success() {
        return Err(Error::Applier {
            status: result.status,
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        });
    }
    // osmium's own chatter is diagnostic pass-through only.
    tracing::debug!(
        stdout = %String::from_utf8_lossy(&result.stdout),
        stderr = %String::from_utf8_lossy(&result.stderr),
        "apply-changes finished"
    );
    Ok(())
}
