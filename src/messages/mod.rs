pub mod model;
pub mod queue;

pub use model::Message;
pub use queue::MessageQueue;
