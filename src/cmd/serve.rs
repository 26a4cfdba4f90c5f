//! HTTP service command — `stemsplit serve`.

use anyhow::Result;

use stemsplit::config::StemsplitConfig;

pub async fn cmd_serve(
    mut config: StemsplitConfig,
    port: Option<u16>,
    host: Option<String>,
    dev: bool,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }
    if dev {
        config.server.dev_mode = true;
    }

    for problem in config.validate() {
        tracing::warn!(problem = %problem, "configuration problem");
    }

    stemsplit::server::start_server(config).await
}
