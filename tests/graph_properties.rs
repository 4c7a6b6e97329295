use proptest::prelude::*;
use rosebus::graph::{dependency_sort, find_connected_subgraphs, has_cycle};
use rosebus::{TickContext, Topic, TopicNode};
use serde_json::{json, Value};

struct Node(String);

impl Topic for Node {
    fn name(&self) -> &str {
        &self.0
    }

    fn generate_messages_periodic(&mut self, _tick: &TickContext<'_>) -> Value {
        json!({})
    }
}

/// Topics declared in `order`, with `rank[i] < rank[j]` for every edge (i, j)
/// so the network is acyclic by construction.
fn network(count: usize, edges: &[(usize, usize)], order: &[usize]) -> Vec<TopicNode> {
    let mut topics: Vec<TopicNode> = order
        .iter()
        .map(|rank| TopicNode::new(Node(format!("topic{rank}"))))
        .collect();
    let slot = |rank: usize| order.iter().position(|&r| r == rank).unwrap();

    for &(from, to) in edges {
        if from < to && to < count {
            let inbox = topics[slot(to)].inbox().clone();
            topics[slot(from)].add_subscriber(&inbox);
        }
    }
    topics
}

fn dag_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>, Vec<usize>)> {
    (2usize..12).prop_flat_map(|count| {
        (
            Just(count),
            prop::collection::vec((0..count, 0..count), 0..30),
            Just((0..count).collect::<Vec<_>>()).prop_shuffle(),
        )
    })
}

proptest! {
    #[test]
    fn test_sort_respects_every_subscription((count, edges, order) in dag_strategy()) {
        let topics = network(count, &edges, &order);
        prop_assert!(!has_cycle(&topics));

        let sorted = dependency_sort(&topics);
        prop_assert_eq!(sorted.len(), count);

        let position = |index: usize| sorted.iter().position(|&i| i == index).unwrap();
        for (publisher, topic) in topics.iter().enumerate() {
            for inbox in topic.subscribers() {
                let subscriber = topics.iter().position(|t| t.inbox().same_as(inbox)).unwrap();
                prop_assert!(position(publisher) < position(subscriber));
            }
        }
    }

    #[test]
    fn test_mutual_subscription_creates_cycle((count, edges, order) in dag_strategy()) {
        let mut topics = network(count, &edges, &order);
        // two topics subscribed to each other
        let first = topics[0].inbox().clone();
        let second = topics[1].inbox().clone();
        topics[0].add_subscriber(&second);
        topics[1].add_subscriber(&first);
        prop_assert!(has_cycle(&topics));
    }

    #[test]
    fn test_subgraphs_cover_every_topic_once((count, edges, order) in dag_strategy()) {
        let topics = network(count, &edges, &order);
        let mut seen: Vec<usize> =
            find_connected_subgraphs(&topics).into_iter().flatten().collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..count).collect::<Vec<_>>());
    }
}
