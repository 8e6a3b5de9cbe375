//! Error taxonomy for the repair pipeline.
//!
//! Every variant here is fatal to the run: there is no partial-success mode
//! and no retry. Per-feature lookup results (deleted, never existed) are not
//! errors; they are [`crate::resolve::Outcome`] values driving the drop path.

use crate::id::FeatureId;
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A feature id string did not match `[nwr]<digits>`.
    #[error("malformed feature id `{0}`")]
    BadId(String),

    /// The consistency checker could not run or crashed. Exit code 1 with
    /// findings on stdout is the normal reporting path, not this.
    #[error("check-refs failed ({status}): {stderr}")]
    Scanner { status: ExitStatus, stderr: String },

    /// A remote lookup returned an unexpected status or failed at the
    /// transport level. Aborts the whole batch: a changeset built on an
    /// unknown outcome risks corrupting the dataset.
    #[error("lookup of {id} failed: {reason}")]
    Resolution { id: FeatureId, reason: String },

    /// The extraction tool could not run or crashed.
    #[error("getid failed ({status}): {stderr}")]
    Extract { status: ExitStatus, stderr: String },

    /// A parent reported by the scanner was absent from the extraction
    /// output. The dataset changed under us, or scanner and extractor
    /// disagree on the id space.
    #[error("parent {id} reported by check-refs but missing from getid output")]
    Integrity { id: FeatureId },

    /// The applier rejected the change document. The original dataset is
    /// untouched; the applier only ever writes to the output path.
    #[error("apply-changes failed ({status}): {stderr}")]
    Applier { status: ExitStatus, stderr: String },

    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
