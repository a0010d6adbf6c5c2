//! Mapping gateway CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use mapping_gateway::{GatewayConfig, MappingGateway};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mapping-gateway")]
#[command(author, version, about = "Configuration-driven API mapping gateway")]
struct Args {
    /// Configuration file path (YAML or JSON)
    #[arg(short, long, env = "MAPPING_GATEWAY_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Address to listen on (overrides settings.listen_address)
    #[arg(long, env = "MAPPING_GATEWAY_LISTEN")]
    listen: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit.
    #[arg(long)]
    example_config: bool,

    /// Validate configuration and exit.
    #[arg(long)]
    validate: bool,
}

fn print_example_config() {
    let example = r#"# Mapping Gateway Configuration Example
version: "1"

settings:
  # Address the HTTP listener binds to
  listen_address: "0.0.0.0:8082"
  # Timeout for a single target call (ms)
  target_timeout_ms: 30000
  # Maximum inbound body size (bytes)
  max_body_size: 10485760  # 10MB
  # Enable debug headers (X-Mapping-Endpoint, X-Mapping-Time)
  debug_headers: false

apiMappings:
  # Route on the target's status code
  - name: "user-lookup"
    responseMappingType: byHTTPStatusCode
    source:
      url: "/v1/users"
      method: "GET"
    target:
      url: "http://localhost:8081/api/users/search"
      method: "POST"
      headers:
        X-Api-Key: "src:req_header|x-api-key"
    requestMapping:
      queryParam:
        lang: "src:query|lang"
      requestBody:
        transaction_id: "src:func|trx()"
        user_id: "src:query|id"
    responseMapping:
      byHTTPStatusCode:
        default:
          response:
            http_status_code: 502
            json_body:
              ok: "src:static|false"
        custom:
          "200":
            response:
              json_body:
                ok: "src:static|true"
                name: "src:res_body|data.name"

  # Route on a field of the target's body
  - name: "sim-swap"
    responseMappingType: byBodyResponse
    source:
      url: "/v1/sim-swap/check"
      method: "POST"
    target:
      url: "http://localhost:8081/digihub/subscheck/simswapv2"
      method: "POST"
    requestMapping:
      requestBody:
        msisdn: "src:req_body|phoneNumber"
    responseMapping:
      byBodyResponse:
        default:
          response:
            http_status_code: 500
            json_body:
              error: "src:static|unexpected response"
        custom:
          status_code:
            - values: ["20005", "20006"]
              response:
                http_status_code: 400
                json_body: "src:res_body|status_desc"
          data.score:
            - values: ["1", "2", "3", "4"]
              response:
                http_status_code: 200
                json_body:
                  swapped: "src:func|sim_swap(src:req_body|maxAge, src:res_body|data.score)"

pluginConfigs:
  - name: "trx"
    path: "plugins/generate_transaction_id_plugin.so"
    instanceName: "GenerateTransactionIDPluginInstance"
  - name: "sim_swap"
    path: "plugins/sim_swap_plugin.so"
    instanceName: "SimSwapPluginInstance"
"#;
    println!("{}", example);
}

fn load_config(path: &Path) -> Result<GatewayConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = if path
        .extension()
        .is_some_and(|e| e == "yaml" || e == "yml")
    {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
    };

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    // Print example config if requested
    if args.example_config {
        print_example_config();
        return Ok(());
    }

    let mut config = load_config(&args.config)?;

    if let Some(listen) = args.listen {
        config.settings.listen_address = listen;
    }

    // Validate only if requested
    if args.validate {
        let _gateway = MappingGateway::new(config)?;
        info!(config = %args.config.display(), "Configuration is valid");
        return Ok(());
    }

    let addr: SocketAddr = config
        .settings
        .listen_address
        .parse()
        .context("Invalid listen address format (expected host:port)")?;

    let gateway = MappingGateway::new(config)?;

    info!(
        config = %args.config.display(),
        listen_address = %addr,
        "Starting mapping gateway"
    );

    mapping_gateway::server::serve(Arc::new(gateway), addr)
        .await
        .context("Failed to run mapping gateway")?;

    info!("Mapping gateway stopped");
    Ok(())
}
