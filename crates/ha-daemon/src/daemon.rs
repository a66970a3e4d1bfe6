//! Reload and poll handlers behind the event loop

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn, LevelFilter};
use serde_json::Value;

use azure_arm_client::{management_endpoint, ApiVersionMap, ArmClient, HttpArmClient};
use azure_ha_config::ConfigLoader;
use azure_ha_failover::{FailoverEngine, StatusFile};
use ha_shared_types::FailoverStatus;

use crate::diag;
use crate::membership::{parse_local_state, CphaProbe, MembershipProbe, ACTIVE_STATES};
use crate::server::EventHandler;
use crate::settings::Settings;

/// Per-call ceiling for ARM requests; retries are the transport's business,
/// not ours.
const ARM_CALL_TIMEOUT: Duration = Duration::from_secs(20);

pub struct Daemon {
    settings: Settings,
    loader: ConfigLoader,
    probe: Box<dyn MembershipProbe>,
    status: Arc<StatusFile>,
    engine: Option<FailoverEngine>,
}

impl Daemon {
    pub fn new(settings: Settings, status: Arc<StatusFile>) -> Self {
        let loader = ConfigLoader::new(&settings.fwdir);
        Self::with_parts(settings, loader, Box::new(CphaProbe::default()), status)
    }

    /// Explicit collaborators; used by tests.
    pub fn with_parts(
        settings: Settings,
        loader: ConfigLoader,
        probe: Box<dyn MembershipProbe>,
        status: Arc<StatusFile>,
    ) -> Self {
        Self {
            settings,
            loader,
            probe,
            status,
            engine: None,
        }
    }

    /// Replace the configuration epoch: reload the dump, rebuild the ARM
    /// client, verify connectivity and run one poll. Failure leaves the
    /// previous epoch in place.
    pub async fn reload(&mut self) -> Result<()> {
        let config = self
            .loader
            .load()
            .await
            .context("failed to load configuration")?;

        log::set_max_level(if config.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        });

        let endpoint = management_endpoint(config.environment.as_deref());
        let mut http = HttpArmClient::new(endpoint, ARM_CALL_TIMEOUT, config.proxy.as_deref())
            .context("failed to build the ARM client")?;
        if let Some(token) = config.credentials.access_token.clone() {
            http = http.with_auth_token(token);
        }
        let arm = ArmClient::new(
            Arc::new(http),
            ApiVersionMap::for_template(&config.template_name),
        );

        let subscription = arm
            .get(&format!("/subscriptions/{}", config.subscription_id))
            .await
            .context("subscription probe failed")?;
        info!(
            "successfully connected to Azure subscription {}",
            subscription
                .get("subscriptionId")
                .and_then(Value::as_str)
                .unwrap_or(&config.subscription_id)
        );

        diag::update_vip_counts(&self.settings.cloud_version_path, &config);

        self.engine = Some(FailoverEngine::new(arm, config, self.status.clone()));
        self.poll().await;
        Ok(())
    }

    /// Probe cluster membership and reconcile when the local member is
    /// active. Never fails: any error is logged and the next tick retries.
    pub async fn poll(&mut self) {
        if let Err(err) = self.try_poll().await {
            info!("poll failed: {:#}", err);
        }
    }

    async fn try_poll(&mut self) -> Result<()> {
        debug!("poll called");
        let output = self.probe.stat().await?;
        let state = parse_local_state(&output);
        debug!("state: {}", state);

        if ACTIVE_STATES.contains(&state.as_str()) {
            debug!("{} mode detected", state);
            match self.engine.as_mut() {
                Some(engine) => engine.set_local_active().await?,
                None => warn!("no configuration epoch yet; skipping reconciliation"),
            }
        } else {
            self.status.set(FailoverStatus::NotStarted)?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for Daemon {
    async fn reconf(&mut self) {
        if let Err(err) = self.reload().await {
            error!("reconfiguration failed: {:#}", err);
        }
    }

    async fn poll(&mut self) {
        Daemon::poll(self).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::path::PathBuf;

    const ACTIVE_TABLE: &str =
        "1 (local)  10.0.1.4        100%            ACTIVE         member1\n";
    const STANDBY_TABLE: &str =
        "1 (local)  10.0.1.5        0%              STANDBY        member2\n";

    struct StaticProbe(&'static str);

    #[async_trait]
    impl MembershipProbe for StaticProbe {
        async fn stat(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl MembershipProbe for FailingProbe {
        async fn stat(&self) -> Result<String> {
            Err(anyhow!("cphaprob is unavailable"))
        }
    }

    fn test_daemon(probe: Box<dyn MembershipProbe>) -> (Daemon, PathBuf, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            fwdir: dir.path().to_path_buf(),
            cloud_version_path: dir.path().join("cloud-version"),
        };
        let status_path = settings.status_file();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
        let status = Arc::new(StatusFile::new(&status_path));
        let loader = ConfigLoader::with_commands(
            dir.path().join("missing-dump"),
            dir.path().join("missing-cphaconf"),
        );
        (
            Daemon::with_parts(settings, loader, probe, status),
            status_path,
            dir,
        )
    }

    #[tokio::test]
    async fn standby_member_reports_not_started() {
        let (mut daemon, status_path, _dir) = test_daemon(Box::new(StaticProbe(STANDBY_TABLE)));
        daemon.poll().await;
        assert_eq!(
            std::fs::read_to_string(status_path).unwrap().trim(),
            "NOT_STARTED"
        );
    }

    #[tokio::test]
    async fn probe_failure_is_swallowed() {
        let (mut daemon, status_path, _dir) = test_daemon(Box::new(FailingProbe));
        daemon.poll().await;
        assert!(!status_path.exists());
    }

    #[tokio::test]
    async fn active_without_an_epoch_is_a_no_op() {
        let (mut daemon, status_path, _dir) = test_daemon(Box::new(StaticProbe(ACTIVE_TABLE)));
        daemon.poll().await;
        assert!(!status_path.exists());
    }

    #[tokio::test]
    async fn failed_reload_keeps_the_daemon_alive() {
        let (mut daemon, _status_path, _dir) = test_daemon(Box::new(StaticProbe(STANDBY_TABLE)));
        assert!(daemon.reload().await.is_err());
        // the poll path still works on the previous (absent) epoch
        daemon.poll().await;
    }
}
