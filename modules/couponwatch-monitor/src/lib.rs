pub mod aggregator;
pub mod extractor;
pub mod forwarder;
pub mod monitor;
pub mod scheduler;
pub mod stories;
pub mod window;

pub use aggregator::AggregatorScraper;
pub use extractor::{Extraction, ExtractedCoupon, VisionExtractor};
pub use forwarder::WebhookForwarder;
pub use monitor::{Monitor, RunStats};
pub use scheduler::SchedulerStatus;
pub use stories::StoryFeed;
pub use window::PollWindow;
