//! API-version selection
//!
//! ARM requires an explicit api-version per provider namespace. Versions are
//! resolved by longest-prefix match against the resource id; the profile
//! depends on the deployment template.

use ha_shared_types::TemplateName;

const NETWORK_VERSION: &str = "2024-05-01";
const VNET_VERSION: &str = "2024-05-01";
const COMPUTE_VERSION: &str = "2019-07-01";
const RESOURCES_VERSION: &str = "2021-04-01";

/// Ordered prefix-to-version mapping with a generic resources fallback.
#[derive(Debug, Clone)]
pub struct ApiVersionMap {
    entries: Vec<(&'static str, &'static str)>,
    fallback: &'static str,
}

impl ApiVersionMap {
    /// Profile for the `ha` family of templates.
    pub fn ha() -> Self {
        Self {
            entries: vec![
                ("network/", NETWORK_VERSION),
                ("resources/", RESOURCES_VERSION),
                ("compute/", COMPUTE_VERSION),
            ],
            fallback: RESOURCES_VERSION,
        }
    }

    /// Profile for `stack-ha` deployments.
    pub fn stack() -> Self {
        Self {
            entries: vec![
                ("compute/", COMPUTE_VERSION),
                ("network/", NETWORK_VERSION),
                ("network/virtualnetworks", VNET_VERSION),
                ("resources/", RESOURCES_VERSION),
            ],
            fallback: RESOURCES_VERSION,
        }
    }

    pub fn for_template(template: &TemplateName) -> Self {
        if template.is_stack() {
            Self::stack()
        } else {
            Self::ha()
        }
    }

    /// Longest matching prefix wins; no match falls back to the generic
    /// resources version.
    pub fn resolve(&self, resource_id: &str) -> &'static str {
        let id = resource_id.to_ascii_lowercase();
        let mut best: Option<(&str, &'static str)> = None;
        for (prefix, version) in &self.entries {
            if !id.contains(&format!("microsoft.{}", prefix)) {
                continue;
            }
            if best.map_or(true, |(p, _)| prefix.len() > p.len()) {
                best = Some((prefix, version));
            }
        }
        best.map(|(_, v)| v).unwrap_or(self.fallback)
    }

    /// Query-string suffix appended to every request URL.
    pub fn query_suffix(&self, resource_id: &str) -> String {
        format!("?api-version={}", self.resolve(resource_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_provider_namespace() {
        let versions = ApiVersionMap::ha();
        assert_eq!(
            versions.resolve("/subscriptions/s/resourcegroups/rg/providers/Microsoft.Network/networkInterfaces/nic0"),
            NETWORK_VERSION
        );
        assert_eq!(
            versions.resolve("/subscriptions/s/resourcegroups/rg/providers/Microsoft.Compute/virtualMachines/fw1"),
            COMPUTE_VERSION
        );
        assert_eq!(versions.resolve("/subscriptions/s"), RESOURCES_VERSION);
    }

    #[test]
    fn longest_prefix_wins_in_stack_profile() {
        let versions = ApiVersionMap::stack();
        assert_eq!(
            versions.resolve("/subscriptions/s/resourcegroups/rg/providers/Microsoft.Network/virtualNetworks/vnet0"),
            VNET_VERSION
        );
        assert_eq!(
            versions.resolve("/subscriptions/s/resourcegroups/rg/providers/Microsoft.Network/routeTables/rt0"),
            NETWORK_VERSION
        );
    }

    #[test]
    fn profile_follows_template() {
        assert_eq!(
            ApiVersionMap::for_template(&TemplateName::StackHa).entries.len(),
            4
        );
        assert_eq!(ApiVersionMap::for_template(&TemplateName::Ha).entries.len(), 3);
    }

    #[test]
    fn query_suffix_format() {
        let versions = ApiVersionMap::ha();
        assert_eq!(
            versions.query_suffix("/providers/Microsoft.Compute/virtualMachines/fw1"),
            "?api-version=2019-07-01"
        );
    }
}
