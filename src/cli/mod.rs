// Firkinize — CLI Module
//
// Command-line interface using clap derive macros. Connection and tenant
// settings fall back to the environment variables existing deployments
// already export.
// Subcommands: add-keystone, get-keystone, create-db.

mod commands;

use clap::{Args, Parser, Subcommand};

pub use commands::execute;

/// Firkinize — get/set service configuration in the config store.
#[derive(Parser, Debug)]
#[command(name = "firkinize")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the config store lives and which tenant to operate on.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    pub debug: bool,

    /// Where to connect to the Consul server (host:port).
    #[arg(long, env = "CONFIG_HOST_AND_PORT")]
    pub consul_host_port: String,

    /// Consul API scheme (http or https).
    #[arg(long, env = "CONFIG_SCHEME", default_value = "http")]
    pub consul_scheme: String,

    /// Security token to talk to the Consul server.
    #[arg(long, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    pub consul_token: Option<String>,

    /// ID of the customer under which it is operating.
    #[arg(long, env = "CUSTOMER_ID")]
    pub customer_id: String,

    /// ID of the region under which it is operating.
    #[arg(long, env = "REGION_ID")]
    pub region_id: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the keystone endpoint and service user for a service.
    AddKeystone {
        /// Name of the service (e.g., "qbert").
        #[arg(long)]
        service_name: String,

        /// Ingress suffix (e.g., "qbert/v2").
        #[arg(long)]
        ingress_suffix: String,
    },

    /// Print the keystone password of a service.
    GetKeystone {
        /// Name of the service (e.g., "qbert").
        #[arg(long)]
        service_name: String,
    },

    /// Create the database for a service and record it in the config store.
    CreateDb {
        /// Name of the service (e.g., "qbert"). Also the database name.
        #[arg(long)]
        service_name: String,

        /// Name of the database user. Defaults to the service name.
        #[arg(long)]
        db_user: Option<String>,
    },
}

// ─── Tests ───────────────────────────────────────────────────────────────────
