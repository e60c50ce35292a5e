//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`].
//!
//! - Namespace isolation: each subsystem uses its own namespace
//!   (`outlet` for config and power state, `wifi_cfg` for credentials).
//! - Atomic writes: ESP-IDF NVS commits are atomic per key.
//! - Cloneable: every clone addresses the same partition, so the WiFi
//!   provisioner and the controller can each own one.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::OutletConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;
#[cfg(not(target_os = "espidf"))]
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const CONFIG_NAMESPACE: &str = "outlet";
const CONFIG_KEY: &str = "cfg";
const MAX_BLOB_SIZE: usize = 512;

#[derive(Clone)]
pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    #[cfg(target_os = "espidf")]
    partition: EspDefaultNvsPartition,
}

impl NvsAdapter {
    /// Take the default NVS partition.
    ///
    /// ESP-IDF erases and re-initialises the partition itself when it finds
    /// a version mismatch or no free pages.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, StorageError> {
        let partition = EspDefaultNvsPartition::take().map_err(|e| {
            warn!("NvsAdapter: partition unavailable ({})", e);
            StorageError::IoError
        })?;
        info!("NvsAdapter: ESP-IDF NVS initialised");
        Ok(Self { partition })
    }

    /// In-memory backend for host builds.
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, StorageError> {
        info!("NvsAdapter: simulation backend");
        Ok(Self {
            store: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    #[cfg(target_os = "espidf")]
    pub fn partition(&self) -> EspDefaultNvsPartition {
        self.partition.clone()
    }

    #[cfg(target_os = "espidf")]
    fn open(&self, namespace: &str, write: bool) -> Result<EspNvs<NvsDefault>, StorageError> {
        EspNvs::new(self.partition.clone(), namespace, write).map_err(|e| {
            warn!("NvsAdapter: open '{}' failed ({})", namespace, e);
            StorageError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    #[cfg(not(target_os = "espidf"))]
    fn with_store<T>(&self, f: impl FnOnce(&mut HashMap<String, Vec<u8>>) -> T) -> T {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<OutletConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let len = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Err(ConfigError::NotFound),
            Err(_) => return Err(ConfigError::IoError),
        };
        let cfg: OutletConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsAdapter: loaded config ({} bytes)", len);
        Ok(cfg)
    }

    fn save(&self, config: &OutletConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        // `write` takes `&mut self`; a clone addresses the same partition.
        let mut nvs = self.clone();
        nvs.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(|_| ConfigError::IoError)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.with_store(|store| match store.get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            })
        }

        #[cfg(target_os = "espidf")]
        {
            let nvs = self.open(namespace, false)?;
            match nvs.get_raw(key, buf) {
                Ok(Some(data)) => Ok(data.len()),
                Ok(None) => Err(StorageError::NotFound),
                Err(e) => {
                    warn!("NvsAdapter: read {}::{} failed ({})", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.with_store(|store| store.insert(composite, data.to_vec()));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let mut nvs = self.open(namespace, true)?;
            nvs.set_raw(key, data).map(|_| ()).map_err(|e| {
                warn!("NvsAdapter: write {}::{} failed ({})", namespace, key, e);
                StorageError::IoError
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.with_store(|store| store.remove(&composite));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let mut nvs = self.open(namespace, true)?;
            nvs.remove(key).map(|_| ()).map_err(|e| {
                warn!("NvsAdapter: delete {}::{} failed ({})", namespace, key, e);
                StorageError::IoError
            })
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.with_store(|store| store.contains_key(&composite))
        }

        #[cfg(target_os = "espidf")]
        {
            self.open(namespace, false)
                .and_then(|nvs| nvs.contains(key).map_err(|_| StorageError::IoError))
                .unwrap_or(false)
        }
    }
}
