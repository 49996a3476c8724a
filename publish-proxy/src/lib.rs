pub mod config;
pub mod config_provider;
pub mod eligibility;
pub mod filter_chain;
pub mod filter_trait;
pub mod latency;
pub mod prometheus;
pub mod publisher;
pub mod publishing_filter;
pub mod record;
pub mod resource;
pub mod server;
pub mod session;
pub mod upstream;
