//! Test data builders for creating test graphs

use depgraph_view::graph::{Graph, Link, Node};

/// Builder for small dependency graphs
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            graph: Graph::new(name),
        }
    }

    pub fn node(mut self, name: &str) -> Self {
        self.graph.add_node(Node::new(name)).unwrap();
        self
    }

    pub fn missing(mut self, name: &str) -> Self {
        self.graph.add_node(Node::new(name).missing()).unwrap();
        self
    }

    pub fn link(mut self, source: &str, target: &str) -> Self {
        self.graph.add_link(Link::new(source, target)).unwrap();
        self
    }

    pub fn weak_link(mut self, source: &str, target: &str) -> Self {
        self.graph.add_link(Link::new(source, target).weak()).unwrap();
        self
    }

    pub fn start(mut self, name: &str) -> Self {
        self.graph.set_start(name).unwrap();
        self
    }

    /// One hub linking out to `fanout` leaves named `leaf0..`.
    pub fn star(name: &str, fanout: usize) -> Graph {
        let mut builder = Self::new(name).node("hub");
        for i in 0..fanout {
            let leaf = format!("leaf{}", i);
            builder = builder.node(&leaf).link("hub", &leaf);
        }
        builder.start("hub").build()
    }

    pub fn build(self) -> Graph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_builder() {
        let g = GraphBuilder::new("g").node("a").node("b").link("a", "b").start("a").build();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.link_count(), 1);
        assert_eq!(g.start().map(|n| n.name.as_str()), Some("a"));
    }
}
