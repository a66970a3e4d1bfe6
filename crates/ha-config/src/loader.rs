//! Configuration reload path

use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use ha_shared_types::{
    ClusterConfig, Credentials, InterfaceSwitchMode, SyncAddresses, TemplateName, VipConfig,
};
use indexmap::IndexMap;

use crate::error::ConfigError;

/// Name every migrated legacy VIP entry receives.
const DEFAULT_VIP_NAME: &str = "cluster-vip";

/// One sync interface as reported by `cphaconf aws_mode`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncInterface {
    pub ipaddr: String,
    #[serde(default)]
    pub other_member_if_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CphaconfOutput {
    #[serde(default)]
    ifs: Vec<SyncInterface>,
}

/// Runs the external configuration helpers and normalizes their output.
pub struct ConfigLoader {
    dump_command: PathBuf,
    cphaconf_command: PathBuf,
}

impl ConfigLoader {
    pub fn new(fwdir: &Path) -> Self {
        Self {
            dump_command: fwdir.join("bin/azure-ha-conf"),
            cphaconf_command: PathBuf::from("cphaconf"),
        }
    }

    /// Point the loader at explicit helper binaries; used by tests.
    pub fn with_commands(dump_command: PathBuf, cphaconf_command: PathBuf) -> Self {
        Self {
            dump_command,
            cphaconf_command,
        }
    }

    pub async fn load(&self) -> Result<ClusterConfig, ConfigError> {
        let raw = self.dump().await?;
        let interfaces = self.sync_interfaces().await?;
        build_config(raw, &interfaces)
    }

    async fn dump(&self) -> Result<Value, ConfigError> {
        let output = run(&self.dump_command, &["--dump"]).await?;
        Ok(serde_json::from_slice(&output)?)
    }

    async fn sync_interfaces(&self) -> Result<Vec<SyncInterface>, ConfigError> {
        let output = run(&self.cphaconf_command, &["aws_mode"]).await?;
        let parsed: CphaconfOutput = serde_json::from_slice(&output)?;
        Ok(parsed.ifs)
    }
}

async fn run(command: &Path, args: &[&str]) -> Result<Vec<u8>, ConfigError> {
    let output = Command::new(command)
        .args(args)
        .output()
        .await
        .map_err(|source| ConfigError::Command {
            command: command.display().to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(ConfigError::CommandFailed {
            command: command.display().to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Normalize the raw dump and sync-interface listing into a config epoch.
pub fn build_config(raw: Value, interfaces: &[SyncInterface]) -> Result<ClusterConfig, ConfigError> {
    log_config(&raw);

    let subscription_id = required_str(&raw, "subscriptionId")?;
    let resource_group = required_str(&raw, "resourceGroup")?;

    let hostname = match optional_str(&raw, "hostname") {
        Some(name) => name,
        None => local_hostname().ok_or(ConfigError::MissingField("hostname"))?,
    };
    let peername = optional_str(&raw, "peername").unwrap_or_else(|| derive_peername(&hostname));

    let template_name = TemplateName::from(
        optional_str(&raw, "templateName").unwrap_or_default().as_str(),
    );
    let interface_switch_mode = InterfaceSwitchMode::from(
        optional_str(&raw, "interfaceSwitchMode")
            .unwrap_or_default()
            .as_str(),
    );

    let cluster_network_interfaces = match raw.get("clusterNetworkInterfaces") {
        Some(value) => Some(parse_cluster_interfaces(value)?),
        None => None,
    };

    let credentials = parse_credentials(&raw)?;

    let mut addresses = SyncAddresses::default();
    for interface in interfaces {
        if let Some(peer_ip) = interface
            .other_member_if_ip
            .as_deref()
            .filter(|ip| !ip.is_empty())
        {
            addresses.me.push(interface.ipaddr.clone());
            addresses.peer.push(peer_ip.to_string());
        }
    }

    Ok(ClusterConfig {
        hostname,
        peername,
        subscription_id,
        resource_group,
        template_name,
        cluster_network_interfaces,
        lb_name: optional_str(&raw, "lbName"),
        cluster_name: optional_str(&raw, "clusterName"),
        vnet_id: optional_str(&raw, "vnetId"),
        interface_switch_mode,
        addresses,
        credentials,
        environment: optional_str(&raw, "environment"),
        proxy: optional_str(&raw, "proxy"),
        debug: raw.get("debug").and_then(Value::as_bool).unwrap_or(false),
    })
}

/// Interface map, upgrading entries still in the legacy address-list format
/// (`[private-ip, public-ip-obj?]`) to the named-VIP structure.
fn parse_cluster_interfaces(
    value: &Value,
) -> Result<IndexMap<String, Vec<VipConfig>>, ConfigError> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("clusterNetworkInterfaces", "expected an object"))?;

    let mut interfaces = IndexMap::new();
    for (cni, vips) in object {
        let entries = vips
            .as_array()
            .ok_or_else(|| invalid(cni, "expected a list of VIPs"))?;

        let parsed = if entries.first().map_or(false, Value::is_string) {
            vec![VipConfig {
                name: DEFAULT_VIP_NAME.to_string(),
                private_ip_addr: entries[0].as_str().unwrap_or_default().to_string(),
                public_ip_obj: entries
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }]
        } else {
            serde_json::from_value(vips.clone())
                .map_err(|err| invalid(cni, &err.to_string()))?
        };
        interfaces.insert(cni.clone(), parsed);
    }
    Ok(interfaces)
}

fn parse_credentials(raw: &Value) -> Result<Credentials, ConfigError> {
    if let Some(credentials) = raw.get("credentials") {
        return Ok(serde_json::from_value(credentials.clone())?);
    }
    match (optional_str(raw, "userName"), optional_str(raw, "password")) {
        (Some(username), Some(password)) => Ok(Credentials {
            username: Some(username),
            password: Some(password),
            access_token: None,
        }),
        _ => Err(ConfigError::MissingField("credentials")),
    }
}

fn derive_peername(hostname: &str) -> String {
    match hostname.strip_suffix('1') {
        Some(stem) => format!("{}2", stem),
        None => {
            let mut stem = hostname.chars();
            stem.next_back();
            format!("{}1", stem.as_str())
        }
    }
}

fn local_hostname() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|name| name.trim().to_string())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .filter(|name| !name.is_empty())
}

fn required_str(raw: &Value, field: &'static str) -> Result<String, ConfigError> {
    optional_str(raw, field).ok_or(ConfigError::MissingField(field))
}

fn optional_str(raw: &Value, field: &str) -> Option<String> {
    raw.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn log_config(raw: &Value) {
    let Some(object) = raw.as_object() else { return };
    for (key, value) in object {
        if key == "password" || key == "credentials" {
            continue;
        }
        debug!("{}: {}", key, value);
    }
}
