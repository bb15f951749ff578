//! Dependency-graph utilities shared by the parser (cycle detection at
//! validation time) and the scheduler (topological batching at execution
//! time). Kahn's algorithm over `Step::depends_on`.

use std::collections::{BTreeMap, VecDeque};

use crate::step::Step;

/// Build an adjacency view: step name -> indices of the steps that depend
/// on it (forward edges), plus each step's in-degree (number of
/// dependencies it itself has).
fn build_graph(steps: &[Step]) -> (BTreeMap<String, Vec<usize>>, Vec<usize>) {
    let index_of: BTreeMap<&str, usize> = steps.iter().enumerate().map(|(i, s)| (s.name.as_str(), i)).collect();
    let mut forward: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut in_degree = vec![0usize; steps.len()];

    for (i, step) in steps.iter().enumerate() {
        for dep in &step.depends_on {
            if let Some(&dep_idx) = index_of.get(dep.as_str()) {
                forward.entry(steps[dep_idx].name.clone()).or_default().push(i);
                in_degree[i] += 1;
            }
        }
    }

    (forward, in_degree)
}

/// Topologically sort `steps` by `depends_on`, ties broken by document
/// order (matching the scheduler's "ties within Ready broken by document
/// order", §4.6). Returns step indices in a valid execution order, or the
/// names forming a cycle if the graph is not a DAG.
pub fn topological_order(steps: &[Step]) -> Result<Vec<usize>, Vec<String>> {
    let (forward, mut in_degree) = build_graph(steps);
    let mut queue: VecDeque<usize> = (0..steps.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(steps.len());

    while let Some(i) = queue.pop_front() {
        order.push(i);
        if let Some(dependents) = forward.get(&steps[i].name) {
            for &j in dependents {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    queue.push_back(j);
                }
            }
        }
        // keep document order among newly-ready nodes
        let mut ready: Vec<usize> = queue.drain(..).collect();
        ready.sort_unstable();
        queue.extend(ready);
    }

    if order.len() == steps.len() {
        Ok(order)
    } else {
        Err(find_cycle(steps))
    }
}

/// Locate one concrete cycle (as a chain of step names) for error
/// reporting. Only called once `topological_order` has already determined
/// a cycle exists.
fn find_cycle(steps: &[Step]) -> Vec<String> {
    let index_of: BTreeMap<&str, usize> = steps.iter().enumerate().map(|(i, s)| (s.name.as_str(), i)).collect();
    let n = steps.len();
    let mut color = vec![0u8; n]; // 0 = white, 1 = gray, 2 = black
    let mut stack = Vec::new();

    fn visit(
        i: usize,
        steps: &[Step],
        index_of: &BTreeMap<&str, usize>,
        color: &mut [u8],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        color[i] = 1;
        stack.push(i);
        for dep in &steps[i].depends_on {
            if let Some(&dep_idx) = index_of.get(dep.as_str()) {
                match color[dep_idx] {
                    1 => {
                        let start = stack.iter().position(|&s| s == dep_idx).unwrap();
                        let mut cycle: Vec<String> = stack[start..].iter().map(|&s| steps[s].name.clone()).collect();
                        cycle.push(steps[dep_idx].name.clone());
                        return Some(cycle);
                    }
                    0 => {
                        if let Some(cycle) = visit(dep_idx, steps, index_of, color, stack) {
                            return Some(cycle);
                        }
                    }
                    _ => {}
                }
            }
        }
        stack.pop();
        color[i] = 2;
        None
    }

    for i in 0..n {
        if color[i] == 0 {
            if let Some(cycle) = visit(i, steps, &index_of, &mut color, &mut stack) {
                return cycle;
            }
        }
    }
    Vec::new()
}
