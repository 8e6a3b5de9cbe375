//! Parent context loader.
//!
//! Fetches the current serialized body of every parent with at least one
//! missing child, in a single batched `osmium getid` invocation. A parent
//! the scanner reported but the extractor cannot produce is a fatal
//! integrity fault, never a silent skip.

use crate::id::FeatureId;
use crate::{xml, Config, Error, Result};
use indexmap::IndexSet;
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;

/// Extract the headless bodies of `parents` from `input`.
pub async fn load_parents(
    config: &Config,
    input: &Path,
    parents: &IndexSet<FeatureId>,
) -> Result<HashMap<FeatureId, String>> {
    let mut cmd = Command::new(&config.osmium_bin);
    cmd.arg("getid").arg("-f").arg("osm").arg(input);
    for id in parents {
        cmd.arg(id.to_string());
    }
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(Error::Extract {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let doc = String::from_utf8_lossy(&output.stdout);
    let mut bodies = HashMap::with_capacity(parents.len());
    for &id in parents {
        let body = xml::extract_feature(&doc, id)?.ok_or(Error::Integrity { id })?;
        bodies.insert(id, body);
    }
    tracing::debug!(parents = bodies.len(), "extracted parent bodies");
    Ok(bodies)
}
