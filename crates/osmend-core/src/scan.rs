//! Reference scanner adapter.
//!
//! Runs `osmium check-refs -i -r` against the input dataset and turns its
//! report into a typed missing-reference graph. The tool's exit status is
//! part of the contract: 0 means the dataset is already consistent, 1 means
//! findings were reported on stdout, anything else is an execution failure.

use crate::id::FeatureId;
use crate::{Config, Error, Result};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tokio::process::Command;

/// Child → ordered distinct parents, plus the distinct parent set.
///
/// Both sides are many-to-many: a missing child may be referenced by several
/// parents, and a parent may reference several missing children. Iteration
/// order is first-seen order of the scanner report, which in turn drives the
/// element order of the change document.
#[derive(Debug, Clone, Default)]
pub struct MissingRefs {
    pub children: IndexMap<FeatureId, Vec<FeatureId>>,
    pub parents: IndexSet<FeatureId>,
}

impl MissingRefs {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn insert(&mut self, child: FeatureId, parent: FeatureId) {
        let parents = self.children.entry(child).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
        self.parents.insert(parent);
    }
}

fn report_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([nwr]\d+) in ([nwr]\d+)$").expect("report line pattern"))
}

/// Parse a `check-refs` report into a missing-reference graph.
///
/// Each finding is one line of the form `<child> in <parent>`; the tool also
/// emits progress and summary text, which is ignored.
pub fn parse_report(stdout: &str) -> Result<MissingRefs> {
    let mut refs = MissingRefs::default();
    for line in stdout.lines() {
        let Some(caps) = report_line().captures(line.trim_end()) else {
            continue;
        };
        let child: FeatureId = caps[1].parse()?;
        let parent: FeatureId = caps[2].parse()?;
        refs.insert(child, parent);
    }
    Ok(refs)
}

/// Scan `input` for dangling references.
///
/// Returns `None` when the dataset is already consistent (the pipeline
/// short-circuits to success without touching the output path).
pub async fn find_missing(config: &Config, input: &Path) -> Result<Option<MissingRefs>> {
    let output = Command::new(&config.osmium_bin)
        .arg("check-refs")
        .arg("-i") // report ids, not just counts
        .arg("-r") // check relation members too
        .arg(input)
        .output()
        .await?;

    match output.status.code() {
        Some(0) => Ok(None),
        Some(1) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let refs = parse_report(&stdout)?;
            tracing::debug!(
                children = refs.children.len(),
                parents = refs.parents.len(),
                "check-refs reported dangling references"
            );
            if refs.is_empty() {
                Ok(None)
            } else {
                Ok(Some(refs))
            }
        }
        _ => Err(Error::Scanner {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
    }
}
