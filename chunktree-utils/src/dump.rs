use std::collections::BTreeMap;

use chunktree::{ChunkContainer, NodeInfo};

type Node<'a> = &'a NodeDescriptor;
type Edge<'a> = (usize, usize);
struct ContainerGraph {
    nodes: BTreeMap<usize, NodeDescriptor>,
    edges: Vec<(usize, usize)>,
}

enum NodeDescriptor {
    Branch {
        id: usize,
        level: u32,
        cached: bool,
    },
    Leaf {
        id: usize,
        chunks: usize,
        bytes: u64,
        cached: bool,
    },
}

impl NodeDescriptor {
    fn new(id: usize, info: NodeInfo) -> Self {
        if info.level == 1 {
            Self::Leaf {
                id,
                chunks: info.children,
                bytes: info.data_length,
                cached: info.cached,
            }
        } else {
            Self::Branch {
                id,
                level: info.level,
                cached: info.cached,
            }
        }
    }

    fn id(&self) -> usize {
        match self {
            Self::Branch { id, .. } | Self::Leaf { id, .. } => *id,
        }
    }

    fn cached(&self) -> bool {
        match self {
            Self::Branch { cached, .. } | Self::Leaf { cached, .. } => *cached,
        }
    }
}

impl<'a> dot::Labeller<'a, Node<'a>, Edge<'a>> for ContainerGraph {
    fn graph_id(&'a self) -> dot::Id<'a> {
        dot::Id::new("thetree").unwrap()
    }

    fn node_id(&'a self, n: &&'a NodeDescriptor) -> dot::Id<'a> {
        dot::Id::new(format!("N{}", n.id())).unwrap()
    }

    fn node_label(&'a self, n: &&'a NodeDescriptor) -> dot::LabelText<'a> {
        let text = match n {
            NodeDescriptor::Branch { level, .. } => format!("L{}", level),
            NodeDescriptor::Leaf { chunks, bytes, .. } => format!("{}/{}", chunks, bytes),
        };
        dot::LabelText::label(text)
    }

    fn node_shape(&'a self, n: &Node<'a>) -> Option<dot::LabelText<'a>> {
        let shape = match n {
            NodeDescriptor::Branch { .. } => "box",
            NodeDescriptor::Leaf { .. } => "circle",
        };
        Some(dot::LabelText::label(shape))
    }

    fn node_color(&'a self, n: &Node<'a>) -> Option<dot::LabelText<'a>> {
        if n.cached() {
            Some(dot::LabelText::label("grey"))
        } else {
            None
        }
    }

    fn node_style(&'a self, n: &Node<'a>) -> dot::Style {
        if n.cached() {
            dot::Style::Filled
        } else {
            dot::Style::None
        }
    }
}

impl<'a> dot::GraphWalk<'a, Node<'a>, Edge<'a>> for ContainerGraph {
    fn nodes(&'a self) -> dot::Nodes<'a, Node<'a>> {
        self.nodes.values().collect()
    }

    fn edges(&'a self) -> dot::Edges<'a, Edge<'a>> {
        self.edges.iter().cloned().collect()
    }

    fn source(&'a self, edge: &Edge<'a>) -> Node<'a> {
        &self.nodes[&edge.0]
    }

    fn target(&'a self, edge: &Edge<'a>) -> Node<'a> {
        &self.nodes[&edge.1]
    }
}

/// Write the node structure of a container as graphviz dot.
///
/// Branches are boxes labelled with their level, leaves are circles labelled
/// with chunk count and byte length. Nodes that are materialized in memory are
/// greyed out.
pub fn graph(container: &ChunkContainer, mut out: impl std::io::Write) -> anyhow::Result<()> {
    let (edges, nodes) = container.dump_graph(|(id, info)| NodeDescriptor::new(id, info))?;
    let graph = ContainerGraph { nodes, edges };
    dot::render(&graph, &mut out)?;
    Ok(())
}
