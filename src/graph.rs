//! Topic dependency graph.
//!
//! A topic B depends on topic A when B's inbox is registered as a subscriber
//! of A. Publishing must follow that relation: A before B, every tick.

use core::fmt::Write as _;

use crate::message::Inbox;
use crate::subscriber::SubscriberNode;
use crate::topic::TopicNode;

/// Adjacency list over topic indices: `edges[a]` holds every topic that
/// subscribes to topic `a`.
fn topic_edges(topics: &[TopicNode]) -> Vec<Vec<usize>> {
    topics
        .iter()
        .map(|topic| {
            topic
                .subscribers()
                .iter()
                .filter_map(|inbox| topics.iter().position(|other| other.inbox().same_as(inbox)))
                .collect()
        })
        .collect()
}

/// Indices of `topics` in publish order: every topic comes after all topics
/// it subscribes to. The result is only meaningful for an acyclic graph.
pub fn dependency_sort(topics: &[TopicNode]) -> Vec<usize> {
    fn visit(node: usize, edges: &[Vec<usize>], visited: &mut [bool], result: &mut Vec<usize>) {
        if visited[node] {
            return;
        }
        visited[node] = true;
        for &subscriber in &edges[node] {
            visit(subscriber, edges, visited, result);
        }
        result.push(node);
    }

    let edges = topic_edges(topics);
    let mut visited = vec![false; topics.len()];
    let mut result = Vec::with_capacity(topics.len());
    for node in 0..topics.len() {
        visit(node, &edges, &mut visited, &mut result);
    }
    result.reverse();
    result
}

/// True if following subscriptions from any topic can lead back to it.
pub fn has_cycle(topics: &[TopicNode]) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(node: usize, edges: &[Vec<usize>], marks: &mut [Mark]) -> bool {
        match marks[node] {
            Mark::InProgress => return true,
            Mark::Done => return false,
            Mark::Unvisited => {}
        }
        marks[node] = Mark::InProgress;
        if edges[node].iter().any(|&next| visit(next, edges, marks)) {
            return true;
        }
        marks[node] = Mark::Done;
        false
    }

    let edges = topic_edges(topics);
    let mut marks = vec![Mark::Unvisited; topics.len()];
    (0..topics.len()).any(|node| visit(node, &edges, &mut marks))
}

/// Groups of topic indices reachable from a common root, in discovery order.
pub fn find_connected_subgraphs(topics: &[TopicNode]) -> Vec<Vec<usize>> {
    fn visit(node: usize, edges: &[Vec<usize>], visited: &mut [bool], group: &mut Vec<usize>) {
        if visited[node] {
            return;
        }
        visited[node] = true;
        group.push(node);
        for &subscriber in &edges[node] {
            visit(subscriber, edges, visited, group);
        }
    }

    let edges = topic_edges(topics);
    let mut visited = vec![false; topics.len()];
    let mut groups = Vec::new();
    for node in 0..topics.len() {
        if !visited[node] {
            let mut group = Vec::new();
            visit(node, &edges, &mut visited, &mut group);
            groups.push(group);
        }
    }
    groups
}

/// Graphviz rendering of the network: topics in blue, plain subscribers in
/// red, one edge per subscription.
pub fn to_dot(topics: &[TopicNode], subscribers: &[SubscriberNode]) -> String {
    let mut dot = String::from("digraph topics {\n");
    for topic in topics {
        let _ = writeln!(dot, "    \"{}\" [color=blue];", topic.name());
    }
    for subscriber in subscribers {
        let _ = writeln!(dot, "    \"{}\" [color=red];", subscriber.name());
    }
    // internal readers such as the system time handle are not nodes
    let is_node = |inbox: &Inbox| {
        topics.iter().any(|topic| topic.inbox().same_as(inbox))
            || subscribers.iter().any(|subscriber| subscriber.inbox().same_as(inbox))
    };
    for topic in topics {
        for inbox in topic.subscribers().iter().filter(|&inbox| is_node(inbox)) {
            let _ = writeln!(dot, "    \"{}\" -> \"{}\";", topic.name(), inbox.owner());
        }
    }
    dot.push_str("}\n");
    dot
}
