//! osmend: referential-consistency repair for OSM data files.
//!
//! An OSM dataset is inconsistent when a parent feature (a way or relation)
//! references a child id that is absent from the same file. This crate
//! locates every dangling reference, resolves each missing child against the
//! OSM API, and builds a minimal osmChange document that either re-creates
//! the child or strips the reference from its parents, then applies it:
//!
//! ```text
//! input.osm ──► scan (osmium check-refs) ──► missing-reference graph
//!                                                │
//!                        ┌───────────────────────┴──────────────────────┐
//!                        ▼                                              ▼
//!              resolve (OSM API, ≤N in flight)           extract (osmium getid)
//!              Resolved / Gone / NeverExisted              parent bodies
//!                        └───────────────────────┬──────────────────────┘
//!                                                ▼
//!                                     changeset (osmChange doc)
//!                                                │
//!                                                ▼
//!                          apply (osmium apply-changes) ──► output.osm
//! ```
//!
//! Every stage failure is fatal to the run: no partial changeset is ever
//! applied, and the output path is only written on success.

pub mod apply;
pub mod changeset;
mod error;
pub mod extract;
pub mod id;
pub mod resolve;
pub mod scan;
pub mod xml;

pub use changeset::Changeset;
pub use error::{Error, Result};
pub use id::{FeatureId, Kind};
pub use resolve::{Outcome, Resolver};
pub use scan::MissingRefs;

use std::env;
use std::path::{Path, PathBuf};

/// Default OSM API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://www.openstreetmap.org/api/0.6";

/// Default cap on concurrent API lookups and drop mutations.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Pipeline configuration. Threaded explicitly into every stage; there is no
/// process-wide mutable endpoint.
#[derive(Debug, Clone)]
pub struct Config {
    /// Feature-lookup endpoint, without trailing slash.
    pub endpoint: String,
    /// The osmium-tool binary to invoke for scan, extract, and apply.
    pub osmium_bin: PathBuf,
    /// Bounded fan-out limit for remote lookups and drop mutations.
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            osmium_bin: PathBuf::from("osmium"),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Config {
    /// Defaults overridden by `OSM_ENDPOINT` and `OSMEND_OSMIUM`.
    pub fn from_env() -> Config {
        let mut config = Config::default();
        if let Ok(endpoint) = env::var("OSM_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(bin) = env::var("OSMEND_OSMIUM") {
            config.osmium_bin = PathBuf::from(bin);
        }
        config
    }
}

/// What a pipeline run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// The dataset was already consistent; the output path was not written.
    Clean,
    /// A change document was built and applied.
    Fixed {
        created: usize,
        modified: usize,
        dropped: usize,
    },
}

/// Run the whole repair pipeline.
///
/// Resolver and parent extraction run concurrently once the graph exists;
/// the first fatal error aborts the run without touching the output path.
pub async fn repair(config: &Config, input: &Path, output: &Path) -> Result<Repair> {
    let Some(refs) = scan::find_missing(config, input).await? else {
        tracing::info!(input = %input.display(), "nothing to repair");
        return Ok(Repair::Clean);
    };
    tracing::info!(
        children = refs.children.len(),
        parents = refs.parents.len(),
        "found dangling references"
    );

    let resolver = Resolver::from_config(config);
    let (outcomes, parent_bodies) = tokio::try_join!(
        resolver.resolve_all(refs.children.keys().copied()),
        extract::load_parents(config, input, &refs.parents),
    )?;

    let changeset = changeset::build(&refs, &outcomes, parent_bodies, config.concurrency).await?;
    tracing::info!(
        created = changeset.created,
        modified = changeset.modified,
        dropped = changeset.dropped,
        "assembled change document"
    );

    apply::apply_change(config, input, output, &changeset.xml).await?;
    Ok(Repair::Fixed {
        created: changeset.created,
        modified: changeset.modified,
        dropped: changeset.dropped,
    })
}
