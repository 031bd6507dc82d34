pub mod annotation;
pub mod channel;
pub mod cluster;
pub mod digest;
pub mod discovery;
pub mod item;
pub mod item_rating;
pub mod llm_usage;
pub mod rating;
pub mod raw_message;
pub mod setting;

pub use annotation::Annotation;
pub use channel::Channel;
pub use cluster::Cluster;
pub use digest::Digest;
pub use discovery::Discovery;
pub use item::Item;
pub use item_rating::ItemRating;
pub use llm_usage::LlmUsage;
pub use rating::Rating;
pub use raw_message::RawMessage;
pub use setting::Setting;
pub use setting::SettingHistory;
