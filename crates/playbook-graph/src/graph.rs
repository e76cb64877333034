use std::collections::{HashMap, HashSet, VecDeque};

use playbook_config::Node;

use crate::error::GraphError;

/// Dependency graph over a playbook's active nodes.
///
/// Inactive nodes are dropped on construction. A dependency on an inactive
/// node counts as already satisfied; a dependency on an id that is not in the
/// playbook at all is an error.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
  nodes: Vec<Node>,
  index: HashMap<String, usize>,
  /// node_id -> ids of active nodes it depends on.
  upstream: HashMap<String, Vec<String>>,
  /// node_id -> ids of active nodes that depend on it.
  downstream: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
  /// Build a graph from the node list returned by a node store.
  ///
  /// This checks references but not acyclicity; call
  /// [`validate_acyclic`](Self::validate_acyclic) for that.
  pub fn new(all_nodes: Vec<Node>) -> Result<Self, GraphError> {
    let mut seen = HashSet::new();
    for node in &all_nodes {
      if !seen.insert(node.node_id.as_str()) {
        return Err(GraphError::DuplicateNode(node.node_id.clone()));
      }
    }

    let inactive: HashSet<String> = all_nodes
      .iter()
      .filter(|n| !n.is_active)
      .map(|n| n.node_id.clone())
      .collect();

    let nodes: Vec<Node> = all_nodes.into_iter().filter(|n| n.is_active).collect();
    let index: HashMap<String, usize> = nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (n.node_id.clone(), i))
      .collect();

    let mut upstream: HashMap<String, Vec<String>> = HashMap::new();
    let mut downstream: HashMap<String, Vec<String>> = HashMap::new();
    for node in &nodes {
      upstream.entry(node.node_id.clone()).or_default();
      downstream.entry(node.node_id.clone()).or_default();
    }

    let mut output_keys: HashMap<&str, &str> = HashMap::new();
    for node in &nodes {
      if let Some(first) = output_keys.insert(node.output_key(), &node.node_id) {
        return Err(GraphError::DuplicateOutputVariable {
          key: node.output_key().to_string(),
          first: first.to_string(),
          second: node.node_id.clone(),
        });
      }

      for dep in &node.depends_on {
        if index.contains_key(dep) {
          upstream
            .entry(node.node_id.clone())
            .or_default()
            .push(dep.clone());
          downstream
            .entry(dep.clone())
            .or_default()
            .push(node.node_id.clone());
        } else if !inactive.contains(dep) {
          return Err(GraphError::UnknownDependency {
            node_id: node.node_id.clone(),
            dependency: dep.clone(),
          });
        }
      }
    }

    Ok(Self {
      nodes,
      index,
      upstream,
      downstream,
    })
  }

  /// Reject graphs where a node (directly or transitively) depends on itself.
  pub fn validate_acyclic(&self) -> Result<(), GraphError> {
    let mut in_degree: HashMap<&str, usize> = self
      .nodes
      .iter()
      .map(|n| (n.node_id.as_str(), self.upstream(&n.node_id).len()))
      .collect();

    let mut queue: VecDeque<&str> = in_degree
      .iter()
      .filter(|(_, degree)| **degree == 0)
      .map(|(id, _)| *id)
      .collect();

    let mut visited = 0;
    while let Some(id) = queue.pop_front() {
      visited += 1;
      for next in self.downstream(id) {
        if let Some(degree) = in_degree.get_mut(next.as_str()) {
          *degree -= 1;
          if *degree == 0 {
            queue.push_back(next);
          }
        }
      }
    }

    if visited == self.nodes.len() {
      return Ok(());
    }

    let mut nodes: Vec<String> = in_degree
      .into_iter()
      .filter(|(_, degree)| *degree > 0)
      .map(|(id, _)| id.to_string())
      .collect();
    nodes.sort();
    Err(GraphError::Cycle { nodes })
  }

  /// Compute the next wave.
  ///
  /// Returns every node not in `started` whose dependencies are all in
  /// `completed`, sorted by execution order then node id. A node downstream
  /// of a failed or skipped node is never returned.
  pub fn next_wave(&self, completed: &HashSet<String>, started: &HashSet<String>) -> Vec<&Node> {
    let mut wave: Vec<&Node> = self
      .nodes
      .iter()
      .filter(|n| !started.contains(&n.node_id) && !completed.contains(&n.node_id))
      .filter(|n| {
        self
          .upstream(&n.node_id)
          .iter()
          .all(|up| completed.contains(up))
      })
      .collect();

    wave.sort_by(|a, b| {
      a.execution_order
        .cmp(&b.execution_order)
        .then_with(|| a.node_id.cmp(&b.node_id))
    });
    wave
  }

  /// The waves a run would execute if every node succeeded.
  ///
  /// Stops early on a cycle, leaving the cyclic nodes out of the plan.
  pub fn plan(&self) -> Vec<Vec<&Node>> {
    let mut completed = HashSet::new();
    let mut waves = Vec::new();

    loop {
      let wave = self.next_wave(&completed, &HashSet::new());
      if wave.is_empty() {
        break;
      }
      completed.extend(wave.iter().map(|n| n.node_id.clone()));
      waves.push(wave);
    }

    waves
  }

  /// Get upstream (dependency) node ids for a given node.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .upstream
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get downstream (dependent) node ids for a given node.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .downstream
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Nodes with no active dependencies.
  pub fn entry_points(&self) -> Vec<&Node> {
    self
      .nodes
      .iter()
      .filter(|n| self.upstream(&n.node_id).is_empty())
      .collect()
  }

  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.index.get(node_id).map(|&i| &self.nodes[i])
  }

  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn node(id: &str, order: i32, deps: &[&str]) -> Node {
    Node {
      node_id: id.to_string(),
      playbook_id: "pb".to_string(),
      action_id: "action".to_string(),
      name: format!("Node {}", id),
      output_variable: format!("{}_out", id),
      execution_order: order,
      depends_on: deps.iter().map(|d| d.to_string()).collect(),
      config: serde_json::Value::Null,
      is_active: true,
    }
  }

  fn ids(wave: &[&Node]) -> Vec<String> {
    wave.iter().map(|n| n.node_id.clone()).collect()
  }

  fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_first_wave_is_nodes_without_dependencies() {
    let graph = DependencyGraph::new(vec![
      node("c", 3, &["a"]),
      node("b", 2, &[]),
      node("a", 1, &[]),
    ])
    .unwrap();

    let wave = graph.next_wave(&HashSet::new(), &HashSet::new());
    assert_eq!(ids(&wave), vec!["a", "b"]);
  }

  #[test]
  fn test_wave_ordering_ties_broken_by_node_id() {
    let graph = DependencyGraph::new(vec![
      node("z", 1, &[]),
      node("m", 0, &[]),
      node("a", 1, &[]),
    ])
    .unwrap();

    let wave = graph.next_wave(&HashSet::new(), &HashSet::new());
    assert_eq!(ids(&wave), vec!["m", "a", "z"]);
  }

  #[test]
  fn test_next_wave_after_completion() {
    let graph = DependencyGraph::new(vec![
      node("a", 1, &[]),
      node("b", 2, &["a"]),
      node("c", 3, &["a"]),
      node("d", 4, &["b", "c"]),
    ])
    .unwrap();

    let wave = graph.next_wave(&set(&["a"]), &set(&["a"]));
    assert_eq!(ids(&wave), vec!["b", "c"]);

    let wave = graph.next_wave(&set(&["a", "b"]), &set(&["a", "b", "c"]));
    assert!(wave.is_empty(), "d must wait for c");

    let wave = graph.next_wave(&set(&["a", "b", "c"]), &set(&["a", "b", "c"]));
    assert_eq!(ids(&wave), vec!["d"]);
  }

  #[test]
  fn test_dependents_of_failed_node_never_ready() {
    let graph = DependencyGraph::new(vec![node("a", 1, &[]), node("b", 2, &["a"])]).unwrap();

    // "a" started but did not complete
    let wave = graph.next_wave(&HashSet::new(), &set(&["a"]));
    assert!(wave.is_empty());
  }

  #[test]
  fn test_inactive_nodes_are_dropped_and_satisfy_dependencies() {
    let mut skipped = node("a", 1, &[]);
    skipped.is_active = false;

    let graph = DependencyGraph::new(vec![skipped, node("b", 2, &["a"])]).unwrap();

    assert_eq!(graph.len(), 1);
    assert!(graph.get_node("a").is_none());
    let wave = graph.next_wave(&HashSet::new(), &HashSet::new());
    assert_eq!(ids(&wave), vec!["b"]);
  }

  #[test]
  fn test_unknown_dependency_rejected() {
    let err = DependencyGraph::new(vec![node("a", 1, &["ghost"])]).unwrap_err();
    assert_eq!(
      err,
      GraphError::UnknownDependency {
        node_id: "a".to_string(),
        dependency: "ghost".to_string(),
      }
    );
  }

  #[test]
  fn test_duplicate_node_rejected() {
    let err = DependencyGraph::new(vec![node("a", 1, &[]), node("a", 2, &[])]).unwrap_err();
    assert_eq!(err, GraphError::DuplicateNode("a".to_string()));
  }

  #[test]
  fn test_duplicate_output_variable_rejected() {
    let mut b = node("b", 2, &[]);
    b.output_variable = "a_out".to_string();

    let err = DependencyGraph::new(vec![node("a", 1, &[]), b]).unwrap_err();
    assert!(matches!(err, GraphError::DuplicateOutputVariable { ref key, .. } if key == "a_out"));
  }

  #[test]
  fn test_cycle_detected() {
    let graph = DependencyGraph::new(vec![
      node("a", 1, &[]),
      node("b", 2, &["a", "d"]),
      node("c", 3, &["b"]),
      node("d", 4, &["c"]),
    ])
    .unwrap();

    let err = graph.validate_acyclic().unwrap_err();
    assert_eq!(
      err,
      GraphError::Cycle {
        nodes: vec!["b".to_string(), "c".to_string(), "d".to_string()],
      }
    );
  }

  #[test]
  fn test_self_dependency_is_a_cycle() {
    let graph = DependencyGraph::new(vec![node("a", 1, &["a"])]).unwrap();
    assert!(matches!(graph.validate_acyclic(), Err(GraphError::Cycle { .. })));
  }

  #[test]
  fn test_plan_diamond() {
    let graph = DependencyGraph::new(vec![
      node("a", 1, &[]),
      node("b", 2, &["a"]),
      node("c", 3, &["a"]),
      node("d", 4, &["b", "c"]),
    ])
    .unwrap();
    graph.validate_acyclic().unwrap();

    let plan: Vec<Vec<String>> = graph.plan().iter().map(|w| ids(w)).collect();
    assert_eq!(plan, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    assert_eq!(graph.downstream("a"), ["b".to_string(), "c".to_string()]);
    assert_eq!(ids(&graph.entry_points()), vec!["a"]);
  }
}
