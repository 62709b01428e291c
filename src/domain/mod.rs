pub mod config;
pub mod engine;
pub mod view;

pub use config::{ConfigId, EngineConfig};
pub use engine::{RuleEngine, Tag};
pub use view::{CompleteRuleEngine, TagView};
