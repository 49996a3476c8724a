use std::sync::Arc;

use anyhow::bail;

use publish_proxy::config::Config;
use publish_proxy::config_provider::ConfigProvider;
use publish_proxy::filter_trait::Filter;
use publish_proxy::publisher::create_publisher;
use publish_proxy::publishing_filter::PublishingFilter;

use crate::log_filter::LogFilter;

pub fn get_filters(config: &Config, provider: Arc<dyn ConfigProvider>) -> anyhow::Result<Vec<Box<dyn Filter>>> {
    let mut filters: Vec<Box<dyn Filter>> = vec![];
    let mut filter_chain_conf = config.filter_chain.clone();

    for filter_name in &config.filter_chain.filters {
        let filter: Box<dyn Filter> = match filter_name.as_str() {
            "log" => {
                Box::new(LogFilter::new())
            }
            "publish" => {
                match filter_chain_conf.publish.take() {
                    None => {
                        bail!("publish filter config is required")
                    }
                    Some(publish) => {
                        let publisher = create_publisher(&publish)?;
                        Box::new(PublishingFilter::new(provider.clone(), publisher, &publish)?)
                    }
                }
            }
            _ => {
                bail!("unknown filter: {}", filter_name)
            }
        };
        filters.push(filter);
    }

    Ok(filters)
}
