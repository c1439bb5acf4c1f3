use std::collections::{HashMap, HashSet};

use crate::models::TaskDependency;

/// Firm-scoped "depends on" adjacency. An edge (task, dep) means `task`
/// depends on `dep`; traversal follows the depends-on direction.
#[derive(Debug)]
pub struct DependencyGraph {
    adj: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn from_edges(edges: &[TaskDependency]) -> Self {
        let mut adj: HashMap<String, Vec<String>> = HashMap::new();
        for edge in edges {
            adj.entry(edge.task_id.clone())
                .or_default()
                .push(edge.depends_on_id.clone());
        }
        Self { adj }
    }

    /// Would adding "`from` depends on `to`" close a cycle? True iff `from`
    /// is already reachable from `to` along existing depends-on edges.
    /// Iterative DFS: one visited set, one explicit stack, O(V+E).
    pub fn would_create_cycle(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![to];

        while let Some(node) = stack.pop() {
            if node == from {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(deps) = self.adj.get(node) {
                for dep in deps {
                    if !visited.contains(dep.as_str()) {
                        stack.push(dep);
                    }
                }
            }
        }
        false
    }
}

/// Does the edge set already contain a cycle? Iterative three-color DFS
/// with an explicit enter/exit stack.
pub fn has_cycle(edges: &[(String, String)]) -> bool {
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in edges {
        adj.entry(from.as_str()).or_default().push(to.as_str());
        adj.entry(to.as_str()).or_default();
    }

    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;
    let mut color: HashMap<&str, u8> = adj.keys().map(|&n| (n, WHITE)).collect();

    enum Frame<'a> {
        Enter(&'a str),
        Exit(&'a str),
    }

    let roots: Vec<&str> = adj.keys().copied().collect();
    for root in roots {
        if color[root] != WHITE {
            continue;
        }
        let mut stack = vec![Frame::Enter(root)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(node) => {
                    if color[node] != WHITE {
                        continue;
                    }
                    color.insert(node, GRAY);
                    stack.push(Frame::Exit(node));
                    for &next in &adj[node] {
                        match color[next] {
                            GRAY => return true,
                            WHITE => stack.push(Frame::Enter(next)),
                            _ => {}
                        }
                    }
                }
                Frame::Exit(node) => {
                    color.insert(node, BLACK);
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(task: &str, dep: &str) -> TaskDependency {
        TaskDependency {
            task_id: task.into(),
            depends_on_id: dep.into(),
        }
    }

    #[test]
    fn empty_graph_has_no_cycle() {
        let g = DependencyGraph::from_edges(&[]);
        assert!(!g.would_create_cycle("a", "b"));
    }

    #[test]
    fn self_loop_is_always_a_cycle() {
        let g = DependencyGraph::from_edges(&[]);
        assert!(g.would_create_cycle("a", "a"));
    }

    #[test]
    fn direct_back_edge() {
        // b depends on a; adding a->b closes the loop
        let g = DependencyGraph::from_edges(&[edge("b", "a")]);
        assert!(g.would_create_cycle("a", "b"));
        assert!(!g.would_create_cycle("b", "a"));
    }

    #[test]
    fn transitive_back_edge() {
        // c -> b -> a; adding a->c closes a triangle
        let g = DependencyGraph::from_edges(&[edge("c", "b"), edge("b", "a")]);
        assert!(g.would_create_cycle("a", "c"));
        assert!(!g.would_create_cycle("c", "a"));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        // d -> b -> a, d -> c -> a; adding d->a is still acyclic
        let g = DependencyGraph::from_edges(&[
            edge("d", "b"),
            edge("d", "c"),
            edge("b", "a"),
            edge("c", "a"),
        ]);
        assert!(!g.would_create_cycle("d", "a"));
        assert!(g.would_create_cycle("a", "d"));
    }

    #[test]
    fn has_cycle_on_edge_sets() {
        let acyclic = vec![("b".to_string(), "a".to_string()), ("c".to_string(), "b".to_string())];
        assert!(!has_cycle(&acyclic));

        let cyclic = vec![
            ("b".to_string(), "a".to_string()),
            ("c".to_string(), "b".to_string()),
            ("a".to_string(), "c".to_string()),
        ];
        assert!(has_cycle(&cyclic));

        let self_loop = vec![("a".to_string(), "a".to_string())];
        assert!(has_cycle(&self_loop));
    }

    #[test]
    fn long_chain_stays_iterative() {
        // 10k-node chain; a recursive search would blow the stack
        let mut edges = Vec::new();
        for i in 1..10_000 {
            edges.push(edge(&format!("n{i}"), &format!("n{}", i - 1)));
        }
        let g = DependencyGraph::from_edges(&edges);
        assert!(g.would_create_cycle("n0", "n9999"));
        assert!(!g.would_create_cycle("n9999", "n0"));
    }
}
