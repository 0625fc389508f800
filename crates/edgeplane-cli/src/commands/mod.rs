pub mod blueprint;
pub mod inventory;
pub mod pod;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use edgeplane_airflow::AirflowEngineFactory;
use edgeplane_catalog::CatalogStore;
use edgeplane_control::{Inventory, PodManager};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::ControllerConfig;

/// Everything a command needs, wired from one config.
pub struct App {
    pub config: ControllerConfig,
    pub store: CatalogStore,
    pub manager: PodManager,
    pub inventory: Inventory,
}

impl App {
    pub fn open(config: ControllerConfig) -> anyhow::Result<Self> {
        if let Some(parent) = config.store.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = CatalogStore::open(&config.store.path)?;
        info!(path = %config.store.path.display(), "catalog store opened");

        let factory = AirflowEngineFactory::new(config.airflow.clone(), store.clone())?;
        let manager = PodManager::new(store.clone(), Arc::new(factory.clone()));
        let inventory = Inventory::new(store.clone(), manager.edgesite_locks());
        Ok(Self {
            config,
            store,
            manager,
            inventory,
        })
    }
}

/// Parse a YAML (or JSON) document from `path`; no path means null.
pub fn read_document(path: Option<&Path>) -> anyhow::Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Null);
    };
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One `uuid  name` line per row.
pub fn print_rows<'a>(rows: impl IntoIterator<Item = (uuid::Uuid, &'a str)>) {
    for (uuid, name) in rows {
        println!("{uuid}  {name}");
    }
}
