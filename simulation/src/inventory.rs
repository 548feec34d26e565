//! Warehouse inventories
//!
//! A node's items are the names of the files in its warehouse directory,
//! `<warehouses>/<node id>/`. The directory is listed once at startup.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use meshwave_core::{ConfigError, Inventory, StaticInventory};
use tracing::{info, warn};

/// Inventory read from a warehouse directory
#[derive(Debug, Clone)]
pub struct DirectoryInventory {
    items: StaticInventory,
}

impl DirectoryInventory {
    /// List `<root>/<node_id>/`
    ///
    /// A missing directory is an empty warehouse.
    pub fn load(root: impl AsRef<Path>, node_id: u32) -> Result<Self, ConfigError> {
        let dir = root.as_ref().join(node_id.to_string());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(node = node_id, dir = %dir.display(), "no warehouse directory");
                return Ok(Self::from_items(Vec::<String>::new()));
            }
            Err(e) => {
                return Err(ConfigError::Inventory(format!("{}: {}", dir.display(), e)));
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::Inventory(e.to_string()))?;
            let is_file = entry
                .file_type()
                .map_err(|e| ConfigError::Inventory(e.to_string()))?
                .is_file();
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        info!(node = node_id, items = names.len(), "warehouse loaded");
        Ok(Self::from_items(names))
    }

    /// Build from a fixed list of item names
    pub fn from_items<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        Self {
            items: StaticInventory::new(items),
        }
    }

    /// Every item in the warehouse
    pub fn items(&self) -> &[String] {
        self.items.items()
    }
}

impl Inventory for DirectoryInventory {
    fn find_matching(&self, term: &str) -> Vec<String> {
        self.items.find_matching(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lists_files_only() {
        let root = TempDir::new().unwrap();
        let warehouse = root.path().join("3");
        fs::create_dir_all(warehouse.join("nested")).unwrap();
        fs::write(warehouse.join("ubuntu-22.iso"), b"").unwrap();
        fs::write(warehouse.join("Debian-12.iso"), b"").unwrap();
        fs::write(warehouse.join("nested").join("hidden.iso"), b"").unwrap();

        let inventory = DirectoryInventory::load(root.path(), 3).unwrap();
        assert_eq!(inventory.items(), ["Debian-12.iso", "ubuntu-22.iso"]);
        assert_eq!(inventory.find_matching("ISO").len(), 2);
        assert_eq!(inventory.find_matching("debian"), vec!["Debian-12.iso"]);
        assert!(inventory.find_matching("hidden").is_empty());
    }

    #[test]
    fn test_missing_warehouse_is_empty() {
        let root = TempDir::new().unwrap();
        let inventory = DirectoryInventory::load(root.path(), 7).unwrap();
        assert!(inventory.items().is_empty());
        assert!(inventory.find_matching("").is_empty());
    }

    #[test]
    fn test_warehouse_is_a_file() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("4"), b"oops").unwrap();
        assert!(matches!(
            DirectoryInventory::load(root.path(), 4),
            Err(ConfigError::Inventory(_))
        ));
    }
}
