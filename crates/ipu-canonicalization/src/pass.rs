use std::collections::BTreeSet;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::ir::{Graph, NodeId};
use crate::registry::HandlerRegistry;
use crate::utils::copy_op_attr;

/// Rewrites every host operation of a graph through the handlers of a registry.
#[derive(Debug, Clone)]
pub struct CanonicalizationPass {
    /// Operation types left untouched.
    ignored_ops: BTreeSet<String>,
    /// Attributes copied from a source operation onto the operations replacing it.
    inherited_attrs: Vec<String>,
    development: Option<PathBuf>,
}

impl Default for CanonicalizationPass {
    fn default() -> Self {
        Self {
            ignored_ops: ["feed", "fetch"].into_iter().map(String::from).collect(),
            inherited_attrs: vec!["ipu_index".to_string(), "ipu_stage".to_string()],
            development: None,
        }
    }
}

/// Summary of one pass run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Source operations handed to a handler.
    pub rewritten: usize,
    /// Nodes emitted by the handlers.
    pub nodes_created: usize,
    /// Source operations and orphaned variables deleted.
    pub nodes_removed: usize,
}

impl CanonicalizationPass {
    /// Create a pass skipping `feed`/`fetch` and propagating the IPU placement attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave operations of type `op_type` untouched.
    pub fn ignore_op(&mut self, op_type: &str) -> &mut Self {
        self.ignored_ops.insert(op_type.to_string());
        self
    }

    /// Copy attribute `name` from every source operation onto the operations replacing it.
    ///
    /// An attribute already set by the handler is kept.
    pub fn inherit_attr(&mut self, name: &str) -> &mut Self {
        if !self.inherited_attrs.iter().any(|attr| attr == name) {
            self.inherited_attrs.push(name.to_string());
        }
        self
    }

    /// Set development mode.
    ///
    /// The graph is written to `dir` as `before.graph.json` and `after.graph.json`.
    pub fn development(&mut self, dir: &str) -> &mut Self {
        self.development = Some(Path::new(dir).into());
        self
    }

    /// Run the pass over `graph`.
    ///
    /// Edges recorded on one end only are rejected before anything is rewritten. The first
    /// error aborts the run and leaves the graph partially rewritten.
    pub fn run(&self, graph: &mut Graph, registry: &HandlerRegistry) -> Result<PassReport> {
        log::info!("Starting canonicalization of {} nodes", graph.len());
        graph.validate_edges()?;
        self.dump(graph, "before")?;

        let mut report = PassReport::default();
        for node in graph.topological_ops()? {
            let op_type = graph.op(node)?.op_type.clone();
            if self.ignored_ops.contains(&op_type) {
                log::debug!("Skipping {op_type} {node}");
                continue;
            }

            let handler = registry.get_handler(&op_type)?;
            let watermark = graph.next_id();
            let replacement = handler.canonicalize(graph, node)?;
            log::debug!(
                "Rewrote {op_type} {node} into {} {replacement}",
                graph.node(replacement)?.name()
            );

            let created = self.inherit_attrs(graph, node, watermark)?;
            report.nodes_created += created;
            report.nodes_removed += remove_source(graph, node)?;
            report.rewritten += 1;
        }

        self.dump(graph, "after")?;
        log::info!(
            "Finished canonicalization: {} operations rewritten, {} nodes created, {} removed",
            report.rewritten,
            report.nodes_created,
            report.nodes_removed
        );
        Ok(report)
    }

    /// Propagate inherited attributes to the nodes created since `watermark` and count them.
    fn inherit_attrs(&self, graph: &mut Graph, source: NodeId, watermark: NodeId) -> Result<usize> {
        let created: Vec<NodeId> = (watermark.0..graph.next_id().0)
            .map(NodeId)
            .filter(|id| graph.contains(*id))
            .collect();

        for id in created.iter().copied() {
            if !graph.node(id)?.is_op() {
                continue;
            }
            for attr in &self.inherited_attrs {
                copy_op_attr(graph, attr, source, id, false)?;
            }
        }
        Ok(created.len())
    }

    fn dump(&self, graph: &Graph, stage: &str) -> Result<()> {
        let Some(dir) = &self.development else {
            return Ok(());
        };
        create_dir_all(dir)?;

        let graph_file = dir.join(format!("{stage}.graph.json"));
        log::debug!("Writing debug graph file: {graph_file:?}");
        fs::write(graph_file, serde_json::to_string_pretty(graph)?)?;
        Ok(())
    }
}

/// Delete `node` and every neighbouring variable left without edges. Returns the number of
/// deleted nodes.
fn remove_source(graph: &mut Graph, node: NodeId) -> Result<usize> {
    let source = graph.node(node)?;
    let neighbours: BTreeSet<NodeId> = source
        .inputs()
        .iter()
        .chain(source.outputs())
        .copied()
        .collect();

    graph.remove_node(node)?;
    let mut removed = 1;

    for var in neighbours {
        let orphaned = graph
            .get(var)
            .is_some_and(|n| n.is_var() && n.inputs().is_empty() && n.outputs().is_empty());
        if orphaned {
            graph.remove_node(var)?;
            removed += 1;
        }
    }
    Ok(removed)
}
