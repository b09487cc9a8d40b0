//! ForgeBox init command
//!
//! 샌드박스 루트에 `.forgebox/forgebox.json`을 만듭니다.

use forgebox_foundation::{ForgeboxConfig, JsonStore, LimitsConfig, CONFIG_FILE};
use std::path::Path;

/// Initialize ForgeBox configuration in `root`
pub fn init_project(root: &Path, workspace_id: Option<&str>, force: bool) -> anyhow::Result<()> {
    let store = JsonStore::project(root);

    // Check if already initialized
    if store.exists(CONFIG_FILE) && !force {
        println!("✓ ForgeBox already initialized in {}", root.display());
        println!("  Use --force to reinitialize.");
        return Ok(());
    }

    let root = root.canonicalize()?;
    let mut config = ForgeboxConfig::new();
    config.sandbox.root = Some(root.clone());
    config.sandbox.workspace_id = Some(workspace_id.unwrap_or("default").to_string());
    config.limits = LimitsConfig::default().resolve().into();

    store.save(CONFIG_FILE, &config)?;
    println!("  Created {}", store.file_path(CONFIG_FILE).display());
    println!("✓ ForgeBox initialized for {}", root.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        init_project(dir.path(), Some("ws-3"), false).unwrap();

        let config = ForgeboxConfig::load_from(None, &JsonStore::project(dir.path())).unwrap();
        assert_eq!(config.sandbox.workspace_id.as_deref(), Some("ws-3"));
        assert_eq!(config.limits.max_tool_calls, Some(25));
        assert!(config.sandbox.build_policy().is_ok());
    }

    #[test]
    fn test_init_keeps_existing_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_project(dir.path(), Some("ws-1"), false).unwrap();
        init_project(dir.path(), Some("ws-2"), false).unwrap();

        let config = ForgeboxConfig::load_from(None, &JsonStore::project(dir.path())).unwrap();
        assert_eq!(config.sandbox.workspace_id.as_deref(), Some("ws-1"));
    }
}
