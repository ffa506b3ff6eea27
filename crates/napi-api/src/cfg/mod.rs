//! Configuration and command-line parsing, following `carbide-api`'s split
//! between a `clap`-derived [`Options`] for process invocation and a
//! `figment`-loaded [`Config`] for the service itself (§6: "Configuration").

pub mod command_line;

use std::collections::BTreeMap;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use napi_model::NetworkParams;
use serde::Deserialize;

pub use command_line::{Command, Migrate, Options};

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
}

/// One entry of `initial_networks` (§6): a network created at startup if
/// its name doesn't already exist, for environments that want a non-empty
/// control plane the moment the service comes up.
#[derive(Debug, Clone, Deserialize)]
pub struct InitialNetwork {
    #[serde(flatten)]
    pub params: InitialNetworkParams,
}

/// Mirrors [`NetworkParams`] but without the server-assigned fields
/// (`uuid`, `created_at`, `modified_at`), since those don't belong in a
/// config file.
#[derive(Debug, Clone, Deserialize)]
pub struct InitialNetworkParams {
    pub name: String,
    pub nic_tag: String,
    pub vlan_id: u16,
    pub subnet: String,
    pub provision_start_ip: String,
    pub provision_end_ip: String,
    pub gateway: Option<String>,
    #[serde(default)]
    pub resolvers: Vec<String>,
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
    pub mtu: u32,
    pub owner_uuids: Option<Vec<napi_types::OwnerId>>,
    pub description: Option<String>,
    #[serde(default)]
    pub fabric: bool,
}

impl From<InitialNetworkParams> for NetworkParams {
    fn from(p: InitialNetworkParams) -> Self {
        NetworkParams {
            uuid: None,
            name: p.name,
            nic_tag: p.nic_tag,
            vlan_id: p.vlan_id,
            subnet: p.subnet,
            provision_start_ip: p.provision_start_ip,
            provision_end_ip: p.provision_end_ip,
            gateway: p.gateway,
            resolvers: p.resolvers,
            routes: p.routes,
            mtu: p.mtu,
            owner_uuids: p.owner_uuids,
            description: p.description,
            fabric: p.fabric,
            created_at: None,
            modified_at: None,
        }
    }
}

/// §6's `{ port, admin_uuid, mac_oui, mtu_default, storage, log_level,
/// initial_networks? }`, loaded the way `carbide-api::Options` layers a
/// base TOML file, an optional site-specific overlay, and environment
/// variables prefixed `NAPI_API_`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub admin_uuid: napi_types::OwnerId,
    pub mac_oui: String,
    pub mtu_default: u32,
    pub storage: StorageConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub initial_networks: Vec<InitialNetwork>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Layers `config_str` as the base TOML document, `site_config_str` as
    /// an overlay (if any site-specific overrides are given), and
    /// `NAPI_API_*` environment variables on top, matching the precedence
    /// `Daemon::config_path`/`site_config_path`'s doc comment specifies.
    pub fn load(config_str: &str, site_config_str: Option<&str>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new().merge(Toml::string(config_str));
        if let Some(site) = site_config_str {
            figment = figment.merge(Toml::string(site));
        }
        figment
            .merge(Env::prefixed("NAPI_API_").split("_"))
            .extract()
    }

    pub fn database_url(&self) -> String {
        let password = self
            .storage
            .password
            .as_deref()
            .map(|p| format!(":{p}"))
            .unwrap_or_default();
        format!(
            "postgres://{}{}@{}:{}/{}",
            self.storage.user, password, self.storage.host, self.storage.port, self.storage.database
        )
    }
}
