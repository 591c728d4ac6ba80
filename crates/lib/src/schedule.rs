//! Job scheduling.
//!
//! Jobs and their dependency edges form a DAG. The scheduler groups jobs into
//! batches: every job's dependencies sit in earlier batches, and jobs inside
//! one batch are independent of each other.

use petgraph::Direction;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::resolve::{JobId, ResolveError, ResolvedJob};

/// Dependency graph over the jobs of one plan.
///
/// Node `i` is job `i`; edges point from a dependency to its dependent.
#[derive(Debug)]
pub struct JobDag {
  graph: DiGraph<String, ()>,
}

impl JobDag {
  /// Build the graph and check it has no cycles.
  ///
  /// # Errors
  ///
  /// Returns `DependencyCycle` naming every job on a cycle.
  pub fn from_jobs(jobs: &[ResolvedJob]) -> Result<Self, ResolveError> {
    let mut graph = DiGraph::with_capacity(jobs.len(), 0);
    for job in jobs {
      graph.add_node(job.name.clone());
    }

    for (i, job) in jobs.iter().enumerate() {
      for dep in &job.depends_on {
        graph.add_edge(NodeIndex::new(dep.0), NodeIndex::new(i), ());
      }
    }

    let dag = Self { graph };
    dag.verify_acyclic()?;
    Ok(dag)
  }

  fn verify_acyclic(&self) -> Result<(), ResolveError> {
    if toposort(&self.graph, None).is_ok() {
      return Ok(());
    }

    let mut cyclic: Vec<NodeIndex> = tarjan_scc(&self.graph)
      .into_iter()
      .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
      .flatten()
      .collect();
    cyclic.sort();

    Err(ResolveError::DependencyCycle {
      jobs: cyclic.into_iter().map(|idx| self.graph[idx].clone()).collect(),
    })
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Group jobs into batches, level by level.
  ///
  /// A job lands in the first batch after all of its dependencies. Within a
  /// batch jobs keep declaration order.
  pub fn batches(&self) -> Result<Vec<Vec<JobId>>, ResolveError> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
      .collect();
    let mut done = vec![false; self.len()];
    let mut remaining = self.len();
    let mut batches = Vec::new();

    while remaining > 0 {
      let ready: Vec<NodeIndex> = self
        .graph
        .node_indices()
        .filter(|idx| !done[idx.index()] && in_degree[idx.index()] == 0)
        .collect();

      if ready.is_empty() {
        // Unreachable after verify_acyclic, but never loop forever.
        self.verify_acyclic()?;
        break;
      }

      for &idx in &ready {
        done[idx.index()] = true;
        remaining -= 1;
        for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
          in_degree[dependent.index()] = in_degree[dependent.index()].saturating_sub(1);
        }
      }

      debug!(batch = batches.len(), jobs = ready.len(), "scheduled batch");
      batches.push(ready.into_iter().map(|idx| JobId(idx.index())).collect());
    }

    Ok(batches)
  }
}
