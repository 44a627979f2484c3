pub mod error;
pub mod message;
pub mod notifier;
pub mod sqs;

pub use error::QueueError;
pub use message::IngestionMessage;
pub use notifier::{check_queues, QueueHealth, QueueNotifier, QueueReport};
pub use sqs::SqsNotifier;
