use std::env::args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use env_logger::Env;
use log::{error, info};

use publish_proxy::config::Config;
use publish_proxy::config_provider::{spawn_reload, SharedConfig};
use publish_proxy::filter_chain::FilterChain;
use publish_proxy::prometheus::PrometheusServer;
use publish_proxy::server::ProxyServer;

mod filters;
mod log_filter;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let conf_path = match args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            error!("config file path is required");
            return;
        }
    };

    let conf = match get_conf(&conf_path) {
        Ok(conf) => conf,
        Err(e) => {
            error!("load config error: {:?}", e);
            return;
        }
    };
    if conf.debug.unwrap_or(false) {
        info!("{:?}", conf);
    }

    info!("Starting server...");
    if let Err(e) = run(conf, conf_path).await {
        error!("server error: {:?}", e);
    }
    info!("Server quit.");
}

async fn run(conf: Config, conf_path: PathBuf) -> anyhow::Result<()> {
    let shared = Arc::new(SharedConfig::new(conf.publishing.clone()));
    if let Some(secs) = conf.reload_interval_secs {
        spawn_reload(shared.clone(), conf_path, Duration::from_secs(secs));
    }
    if let Some(metrics) = &conf.metrics {
        PrometheusServer::start(&metrics.address, &metrics.uri)?;
        info!("metrics exported at {}{}", metrics.address, metrics.uri);
    }

    let filters = filters::get_filters(&conf, shared)?;
    let chain = FilterChain::new(filters);
    let server = ProxyServer::new(Arc::new(conf), Arc::new(chain));
    server.start().await
}

fn get_conf(path: &Path) -> anyhow::Result<Config> {
    let conf = Config::load(path)?;
    Ok(conf)
}
