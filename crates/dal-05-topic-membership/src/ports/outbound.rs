use shared_types::Topic;

/// Joins and leaves gossip topics. Implemented over the overlay by the node.
pub trait TopicSubscriber: Send + Sync {
    /// Returns `false` if the topic was already joined.
    fn join(&self, topic: Topic) -> bool;

    /// Returns `false` if the topic was not joined.
    fn leave(&self, topic: Topic) -> bool;
}
