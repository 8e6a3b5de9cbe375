//! Changeset builder.
//!
//! Turns the missing-reference graph, the lookup outcomes, and the extracted
//! parent bodies into an osmChange document. Resolved children become
//! `create` entries; gone/never-existed children are stripped from every
//! parent that references them, and each effectively touched parent becomes
//! a `modify` entry.
//!
//! Section order is fixed by the osmChange contract: created nodes first
//! (ways that reference them must find them), then way modifications, way
//! creations, relation modifications, relation creations. Empty sections
//! are omitted entirely.

use crate::id::{FeatureId, Kind};
use crate::resolve::Outcome;
use crate::scan::MissingRefs;
use crate::{xml, Error, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Generator tag written into the change document header.
pub const GENERATOR: &str = "osmend";

/// A built change document plus summary counters for reporting.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub xml: String,
    /// Features re-created from the remote source.
    pub created: usize,
    /// Parents rewritten to drop dangling references.
    pub modified: usize,
    /// Individual references dropped across all parents.
    pub dropped: usize,
}

/// Build the change document.
///
/// `outcomes` must cover every child in `refs` (the resolver guarantees a
/// total mapping); `parents` must cover every parent (the loader guarantees
/// it, or fails with an integrity fault). Drop mutations against distinct
/// parents run in a bounded task set; drops against the same parent are
/// applied sequentially on one owned body, so nothing races.
pub async fn build(
    refs: &MissingRefs,
    outcomes: &HashMap<FeatureId, Outcome>,
    mut parents: HashMap<FeatureId, String>,
    concurrency: usize,
) -> Result<Changeset> {
    // Partition resolved children by kind, in graph order.
    let mut add_nodes = Vec::new();
    let mut add_ways = Vec::new();
    let mut add_relations = Vec::new();
    for child in refs.children.keys() {
        if let Some(Outcome::Resolved(body)) = outcomes.get(child) {
            match child.kind {
                Kind::Node => add_nodes.push(body.clone()),
                Kind::Way => add_ways.push(body.clone()),
                Kind::Relation => add_relations.push(body.clone()),
            }
        }
    }

    // Group drops by parent so each body has a single owner.
    let mut drops: IndexMap<FeatureId, Vec<FeatureId>> = IndexMap::new();
    for (child, parent_ids) in &refs.children {
        let dropping = outcomes.get(child).is_some_and(Outcome::is_drop);
        if !dropping {
            continue;
        }
        for parent in parent_ids {
            drops.entry(*parent).or_default().push(*child);
        }
    }
    let parent_order: Vec<FeatureId> = drops.keys().copied().collect();

    let slots = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (parent, children) in drops {
        let body = parents.remove(&parent).ok_or(Error::Integrity { id: parent })?;
        let slots = Arc::clone(&slots);
        tasks.spawn(async move {
            let _permit = slots.acquire_owned().await.expect("semaphore never closed");
            let mut body = body;
            let mut dropped = 0usize;
            for child in children {
                let (filtered, removed) = xml::strip_refs(&body, child)?;
                if removed {
                    body = filtered;
                    dropped += 1;
                }
            }
            Ok::<_, Error>((parent, body, dropped))
        });
    }

    let mut mutated: HashMap<FeatureId, (String, usize)> = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((parent, body, dropped))) => {
                mutated.insert(parent, (body, dropped));
            }
            Ok(Err(err)) => {
                tasks.abort_all();
                return Err(err);
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        }
    }

    // Collect touched parents in graph order. A parent where no reference
    // was actually removed is left alone.
    let mut modify_ways = Vec::new();
    let mut modify_relations = Vec::new();
    let mut dropped_total = 0usize;
    for parent in parent_order {
        let Some((body, dropped)) = mutated.remove(&parent) else {
            continue;
        };
        if dropped == 0 {
            tracing::warn!(%parent, "reported parent had no matching references to drop");
            continue;
        }
        dropped_total += dropped;
        match parent.kind {
            Kind::Way => modify_ways.push(body),
            Kind::Relation => modify_relations.push(body),
            // Nodes reference nothing; the scanner never reports them as
            // parents.
            Kind::Node => {}
        }
    }

    let created = add_nodes.len() + add_ways.len() + add_relations.len();
    let modified = modify_ways.len() + modify_relations.len();

    let mut doc = format!(
        "<?xml version='1.0' encoding='UTF-8'?><osmChange version=\"0.6\" generator=\"{GENERATOR}\">"
    );
    push_section(&mut doc, "create", &add_nodes);
    push_section(&mut doc, "modify", &modify_ways);
    push_section(&mut doc, "create", &add_ways);
    push_section(&mut doc, "modify", &modify_relations);
    push_section(&mut doc, "create", &add_relations);
    doc.push_str("</osmChange>");

    Ok(Changeset {
        xml: doc,
        created,
        modified,
        dropped: dropped_total,
    })
}

fn push_section(doc: &mut String, tag: &str, bodies: &[String]) {
    if bodies.is_empty() {
        return;
    }
    doc.push('<');
    doc.push_str(tag);
    doc.push('>');
    for body in bodies {
        doc.push_str(body);
    }
    doc.push_str("</");
    doc.push_str(tag);
    doc.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::parse_report;

    const NODE_1: &str = r#"<node changeset="31430396" id="1" lat="48.5669850" lon="13.4465242" version="13" visible="true"><tag k="natural" v="tree"/></node>"#;

    const WAY_1: &str = r#"<way id="1" visible="true" version="3"><nd ref="1"/><nd ref="2"/><nd ref="3"/><nd ref="4"/><tag k="highway" v="residential"/></way>"#;

    const RELATION_1: &str = r#"<relation id="1" version="20"><member type="node" ref="1" role=""/><member type="node" ref="2" role=""/><member type="way" ref="1" role="outer"/><member type="way" ref="2" role="outer"/><tag k="type" v="multipolygon"/></relation>"#;

    fn id(s: &str) -> FeatureId {
        s.parse().unwrap()
    }

    fn scenario_refs() -> MissingRefs {
        parse_report("n1 in w1\nn1 in r1\nn2 in w1\nn2 in r1\nn3 in w1\nw2 in r1\n").unwrap()
    }

    fn scenario_outcomes() -> HashMap<FeatureId, Outcome> {
        HashMap::from([
            (id("n1"), Outcome::Resolved(NODE_1.to_string())),
            (id("n2"), Outcome::Gone),
            (id("n3"), Outcome::NeverExisted),
            (id("w2"), Outcome::Gone),
        ])
    }

    fn scenario_parents() -> HashMap<FeatureId, String> {
        HashMap::from([
            (id("w1"), WAY_1.to_string()),
            (id("r1"), RELATION_1.to_string()),
        ])
    }

    #[tokio::test]
    async fn test_scenario_document() {
        let changeset = build(
            &scenario_refs(),
            &scenario_outcomes(),
            scenario_parents(),
            10,
        )
        .await
        .unwrap();

        assert_eq!(changeset.created, 1);
        assert_eq!(changeset.modified, 2);
        // w1 drops n2 and n3; r1 drops n2 and w2.
        assert_eq!(changeset.dropped, 4);

        let doc = &changeset.xml;
        assert!(doc.starts_with(
            "<?xml version='1.0' encoding='UTF-8'?><osmChange version=\"0.6\" generator=\"osmend\">"
        ));
        assert!(doc.ends_with("</osmChange>"));

        // Created node body is carried verbatim.
        assert!(doc.contains(&format!("<create>{NODE_1}</create>")));

        // Way keeps nd 1 and 4, loses 2 and 3.
        assert!(doc.contains(r#"<nd ref="1"/><nd ref="4"/>"#));
        assert!(!doc.contains(r#"<nd ref="2"/>"#));
        assert!(!doc.contains(r#"<nd ref="3"/>"#));

        // Relation keeps node 1 and way 1, loses node 2 and way 2.
        assert!(doc.contains(r#"<member type="node" ref="1" role=""/>"#));
        assert!(doc.contains(r#"<member type="way" ref="1" role="outer"/>"#));
        assert!(!doc.contains(r#"<member type="node" ref="2" role=""/>"#));
        assert!(!doc.contains(r#"<member type="way" ref="2" role="outer"/>"#));
    }

    #[tokio::test]
    async fn test_section_ordering() {
        let changeset = build(
            &scenario_refs(),
            &scenario_outcomes(),
            scenario_parents(),
            10,
        )
        .await
        .unwrap();
        let doc = &changeset.xml;

        let create_node = doc.find("<create><node").unwrap();
        let modify_way = doc.find("<modify><way").unwrap();
        let modify_relation = doc.find("<modify><relation").unwrap();
        assert!(create_node < modify_way);
        assert!(modify_way < modify_relation);
    }

    #[tokio::test]
    async fn test_empty_sections_omitted() {
        // Everything resolves: no modify sections at all.
        let refs = parse_report("n1 in w1\n").unwrap();
        let outcomes = HashMap::from([(id("n1"), Outcome::Resolved(NODE_1.to_string()))]);
        let parents = HashMap::from([(id("w1"), WAY_1.to_string())]);
        let changeset = build(&refs, &outcomes, parents, 10).await.unwrap();
        assert!(!changeset.xml.contains("<modify>"));
        assert!(!changeset.xml.contains("<create></create>"));
        assert_eq!(changeset.modified, 0);
    }

    #[tokio::test]
    async fn test_conservative_touch() {
        // The parent body has no reference to the dropped child, so no
        // modify entry may be emitted for it.
        let refs = parse_report("n9 in w1\n").unwrap();
        let outcomes = HashMap::from([(id("n9"), Outcome::NeverExisted)]);
        let parents = HashMap::from([(id("w1"), WAY_1.to_string())]);
        let changeset = build(&refs, &outcomes, parents, 10).await.unwrap();
        assert_eq!(changeset.modified, 0);
        assert!(!changeset.xml.contains("<modify>"));
    }

    #[tokio::test]
    async fn test_missing_parent_body_is_integrity_fault() {
        let refs = parse_report("n2 in w1\n").unwrap();
        let outcomes = HashMap::from([(id("n2"), Outcome::Gone)]);
        let err = build(&refs, &outcomes, HashMap::new(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Integrity { .. }));
    }

    #[tokio::test]
    async fn test_resolved_ways_create_after_way_modifies() {
        let refs = parse_report("w5 in r1\nn2 in w1\nn2 in r1\n").unwrap();
        let outcomes = HashMap::from([
            (
                id("w5"),
                Outcome::Resolved(r#"<way id="5" version="1"><nd ref="1"/></way>"#.to_string()),
            ),
            (id("n2"), Outcome::Gone),
        ]);
        let parents = HashMap::from([
            (id("r1"), RELATION_1.to_string()),
            (id("w1"), WAY_1.to_string()),
        ]);
        let changeset = build(&refs, &outcomes, parents, 10).await.unwrap();
        let doc = &changeset.xml;
        let modify_way = doc.find("<modify><way").unwrap();
        let create_way = doc.find("<create><way").unwrap();
        let modify_relation = doc.find("<modify><relation").unwrap();
        assert!(modify_way < create_way);
        assert!(create_way < modify_relation);
    }
}
