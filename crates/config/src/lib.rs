use core::time::Duration;
use std::fs::{read_to_string, write};

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{bail, Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_GROUP_SIZE: usize = 4;
pub const DEFAULT_MAX_SYNC_ATTEMPTS: u32 = 10;
pub const DEFAULT_ACCOUNT_TRANSFER_CLEANUP_FACTOR: u32 = 100;
pub const DEFAULT_ACCOUNT_TRANSFER_LIFE: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    #[serde(default)]
    pub consensus: ConsensusConfig,

    pub datastore: DataStoreConfig,
}

/// Process-wide parameters of the group consensus core.
///
/// Injected into every accumulator and account transfer handler at
/// construction; nothing in the core reads global state.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ConsensusConfig {
    /// Number of nodes responsible for any given key.
    pub group_size: usize,

    /// Sync rounds an unresolved action survives before it is dropped.
    pub max_sync_attempts: u32,

    #[serde(default)]
    pub account_transfer: AccountTransferConfig,
}

impl ConsensusConfig {
    #[must_use]
    pub const fn new(
        group_size: usize,
        max_sync_attempts: u32,
        account_transfer: AccountTransferConfig,
    ) -> Self {
        Self {
            group_size,
            max_sync_attempts,
            account_transfer,
        }
    }

    /// Distinct peers that must agree before anything resolves:
    /// `⌈(group_size + 1) / 2⌉`.
    #[must_use]
    pub const fn quorum(&self) -> usize {
        self.group_size.saturating_add(1).div_ceil(2)
    }

    pub fn validate(&self) -> EyreResult<()> {
        if self.group_size == 0 {
            bail!("consensus.group_size must be at least 1");
        }

        if self.account_transfer.cleanup_factor == 0 {
            bail!("consensus.account_transfer.cleanup_factor must be at least 1");
        }

        Ok(())
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_GROUP_SIZE,
            DEFAULT_MAX_SYNC_ATTEMPTS,
            AccountTransferConfig::default(),
        )
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct AccountTransferConfig {
    /// Every `cleanup_factor`-th insertion prunes stale transfers.
    pub cleanup_factor: u32,

    /// How long an unresolved transfer may sit without updates.
    #[serde(rename = "life_ms", with = "serde_duration")]
    pub life: Duration,
}

impl AccountTransferConfig {
    #[must_use]
    pub const fn new(cleanup_factor: u32, life: Duration) -> Self {
        Self {
            cleanup_factor,
            life,
        }
    }
}

impl Default for AccountTransferConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_ACCOUNT_TRANSFER_CLEANUP_FACTOR,
            DEFAULT_ACCOUNT_TRANSFER_LIFE,
        )
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct DataStoreConfig {
    pub path: Utf8PathBuf,
}

impl DataStoreConfig {
    #[must_use]
    pub const fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

impl ConfigFile {
    #[must_use]
    pub const fn new(consensus: ConsensusConfig, datastore: DataStoreConfig) -> Self {
        Self {
            consensus,
            datastore,
        }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration at {path:?}"))?;

        config.consensus.validate()?;

        Ok(config)
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Only write config file if changes are detected
    pub fn save_if_changed(&self, dir: &Utf8Path) -> EyreResult<bool> {
        let path = dir.join(CONFIG_FILE);
        let new_content = toml::to_string_pretty(self)?;

        let changed = match read_to_string(&path) {
            Ok(existing) => existing != new_content,
            Err(_) => true,
        };

        if changed {
            write(&path, new_content)
                .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;
        }

        Ok(changed)
    }
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
