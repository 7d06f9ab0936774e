//! Field trees: built while parsing or serializing with tracing on, rendered in
//! the same syntax the fixture files use for expectations.

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf { name: String, value: Value },
    Group { name: String, children: Vec<Node> },
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Leaf { name, .. } | Node::Group { name, .. } => name,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Node::Leaf { value, .. } => Some(value),
            Node::Group { .. } => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Leaf { .. } => &[],
            Node::Group { children, .. } => children,
        }
    }

    /// Find a descendant by slash-separated path relative to this node, e.g.
    /// `payload/parameter/numItems`. The first matching child wins at each step.
    pub fn find(&self, path: &str) -> Option<&Node> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, step| node.children().iter().find(|c| c.name() == step))
    }
}

/// Incremental tree construction driven by buffer context push/pop.
#[derive(Debug, Default)]
pub struct TraceBuilder {
    open: Vec<(String, Vec<Node>)>,
    done: Vec<Node>,
}

impl TraceBuilder {
    pub fn open(&mut self, name: &str) {
        self.open.push((name.to_string(), Vec::new()));
    }

    pub fn close(&mut self) {
        if let Some((name, children)) = self.open.pop() {
            self.push(Node::Group { name, children });
        }
    }

    pub fn leaf(&mut self, name: &str, value: Value) {
        self.push(Node::Leaf { name: name.to_string(), value });
    }

    fn push(&mut self, node: Node) {
        match self.open.last_mut() {
            Some((_, children)) => children.push(node),
            None => self.done.push(node),
        }
    }

    /// Close anything left open (a parse that failed midway) and return the roots.
    pub fn finish(mut self) -> Vec<Node> {
        while !self.open.is_empty() {
            self.close();
        }
        self.done
    }
}

/// Render a node in fixture syntax with two-space indentation.
pub fn render(node: &Node) -> String {
    let mut out = String::new();
    render_into(node, 0, &mut out);
    out
}

pub fn render_all(nodes: &[Node]) -> String {
    nodes.iter().map(render).collect()
}

fn render_into(node: &Node, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match node {
        Node::Leaf { name, value } => {
            out.push_str(&format!("{}{}: {};\n", pad, name, value));
        }
        Node::Group { name, children } => {
            out.push_str(&format!("{}{} {{\n", pad, name));
            for child in children {
                render_into(child, indent + 1, out);
            }
            out.push_str(&format!("{}}}\n", pad));
        }
    }
}
