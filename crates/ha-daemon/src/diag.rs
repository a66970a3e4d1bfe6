//! Diagnostics side-file
//!
//! Support tooling reads per-interface VIP counts from the cloud version
//! file. Lines keyed `<cni>_vips_number` are replaced in place; missing
//! keys are appended. Failures are reported but never interrupt a reload.

use std::fs;
use std::io;
use std::path::Path;

use log::error;

use ha_shared_types::ClusterConfig;

pub fn update_vip_counts(path: &Path, config: &ClusterConfig) {
    let Some(interfaces) = &config.cluster_network_interfaces else {
        return;
    };
    for (cni, vips) in interfaces {
        let key = format!("{}_vips_number", cni);
        let line = format!("{}: {}\n", key, vips.len());
        if let Err(err) = upsert_line(path, &key, &line) {
            error!(
                "failed to update {} in {}: {}",
                key,
                path.display(),
                err
            );
        }
    }
}

fn upsert_line(path: &Path, key: &str, text: &str) -> io::Result<()> {
    let content = fs::read_to_string(path)?;
    let mut lines = Vec::new();
    let mut found = false;
    for line in content.lines() {
        if line.starts_with(key) {
            found = true;
            lines.push(text.trim_end().to_string());
        } else {
            lines.push(line.to_string());
        }
    }
    if !found {
        lines.push(text.trim_end().to_string());
    }
    let mut output = lines.join("\n");
    output.push('\n');
    fs::write(path, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_shared_types::VipConfig;
    use indexmap::IndexMap;

    fn config_with_vips(entries: &[(&str, usize)]) -> ClusterConfig {
        let mut interfaces = IndexMap::new();
        for (cni, count) in entries {
            let vips = (0..*count)
                .map(|i| VipConfig {
                    name: format!("vip-{}", i),
                    private_ip_addr: format!("10.0.0.{}", 10 + i),
                    public_ip_obj: String::new(),
                })
                .collect();
            interfaces.insert(cni.to_string(), vips);
        }
        ClusterConfig {
            cluster_network_interfaces: Some(interfaces),
            ..Default::default()
        }
    }

    #[test]
    fn replaces_existing_keys_and_appends_new_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud-version");
        fs::write(&path, "build: 1234\neth0_vips_number: 1\n").unwrap();

        update_vip_counts(&path, &config_with_vips(&[("eth0", 2), ("eth1", 1)]));

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "build: 1234\neth0_vips_number: 2\neth1_vips_number: 1\n"
        );
    }

    #[test]
    fn missing_file_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud-version");
        // no panic, no file created
        update_vip_counts(&path, &config_with_vips(&[("eth0", 1)]));
        assert!(!path.exists());
    }

    #[test]
    fn no_interfaces_means_no_touch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud-version");
        fs::write(&path, "build: 1234\n").unwrap();
        update_vip_counts(&path, &ClusterConfig::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "build: 1234\n");
    }
}
