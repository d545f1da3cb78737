//! Hook configuration store with optional JSON file persistence.

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use utoipa::ToSchema;

use crate::scripting::HookConfig;

/// `(app, provider id)` identifying one stored hook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookKey {
    pub app: String,
    pub provider_id: String,
}

impl HookKey {
    pub fn new(app: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            provider_id: provider_id.into(),
        }
    }
}

/// On-disk and list representation of one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredHook {
    pub app: String,
    pub provider_id: String,
    pub config: HookConfig,
}

/// Concurrent hook store.
///
/// Configs are stored as received, so unknown fields survive a save/load cycle.
pub struct HookStore {
    hooks: DashMap<HookKey, HookConfig>,
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl HookStore {
    pub fn in_memory() -> Self {
        Self {
            hooks: DashMap::new(),
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a file-backed store, loading existing entries if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let hooks = DashMap::new();

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read hook store: {}", path.display()))?;
            let entries: Vec<StoredHook> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse hook store: {}", path.display()))?;
            for entry in entries {
                hooks.insert(HookKey::new(entry.app, entry.provider_id), entry.config);
            }
            tracing::info!(path = %path.display(), hooks = hooks.len(), "Hook store loaded");
        } else {
            tracing::info!(path = %path.display(), "Hook store file not found, starting empty");
        }

        Ok(Self {
            hooks,
            path: Some(path),
            write_lock: Mutex::new(()),
        })
    }

    pub fn get(&self, app: &str, provider_id: &str) -> Option<HookConfig> {
        self.hooks
            .get(&HookKey::new(app, provider_id))
            .map(|entry| entry.value().clone())
    }

    /// Insert or replace a config, returning the previous one.
    ///
    /// If the store file cannot be written the previous entry is restored.
    pub async fn put(
        &self,
        app: &str,
        provider_id: &str,
        config: HookConfig,
    ) -> Result<Option<HookConfig>> {
        let key = HookKey::new(app, provider_id);
        let _guard = self.write_lock.lock().await;
        let previous = self.hooks.insert(key.clone(), config);
        if let Err(e) = self.persist().await {
            match &previous {
                Some(old) => {
                    self.hooks.insert(key, old.clone());
                }
                None => {
                    self.hooks.remove(&key);
                }
            }
            return Err(e);
        }
        Ok(previous)
    }

    /// Remove a config; it is put back if the store file cannot be written.
    pub async fn remove(&self, app: &str, provider_id: &str) -> Result<Option<HookConfig>> {
        let key = HookKey::new(app, provider_id);
        let _guard = self.write_lock.lock().await;
        let removed = self.hooks.remove(&key).map(|(_, config)| config);
        if let Some(config) = &removed {
            if let Err(e) = self.persist().await {
                self.hooks.insert(key, config.clone());
                return Err(e);
            }
        }
        Ok(removed)
    }

    /// All entries sorted by key.
    pub fn list(&self) -> Vec<StoredHook> {
        let mut entries: Vec<(HookKey, HookConfig)> = self
            .hooks
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
            .into_iter()
            .map(|(key, config)| StoredHook {
                app: key.app,
                provider_id: key.provider_id,
                config,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Callers hold `write_lock`.
    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&self.list())?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write hook store: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace hook store: {}", path.display()))?;
        tracing::debug!(path = %path.display(), hooks = self.hooks.len(), "Hook store persisted");
        Ok(())
    }
}
