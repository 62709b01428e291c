pub mod api;
pub mod config;
pub mod definition;
pub mod domain;
pub mod error;
pub mod observability;
pub mod service;
pub mod storage;
pub mod store;
pub mod validator;

pub use config::Config;
pub use domain::{CompleteRuleEngine, ConfigId, EngineConfig, RuleEngine, Tag, TagView};
pub use error::{Error, ErrorCode, Result};
pub use service::RuleEngineService;
pub use store::TagStore;
