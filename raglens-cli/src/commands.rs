//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use raglens_core::config::{
    config_exists, default_config_toml, load_config, workspace_config_path,
};
use std::path::Path;

pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace).await,
    }
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(config_dir) = config_path.parent() {
                std::fs::create_dir_all(config_dir)?;
            }

            let toml_str = default_config_toml()?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            if !config_exists(Some(workspace)) {
                println!("# No configuration file found; showing built-in defaults.");
                println!("# Run `raglens config init` to create one.");
            }
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raglens_core::RagLensConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();

        let config_path = workspace.join(".raglens").join("config.toml");
        assert!(config_path.exists());

        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: RagLensConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, RagLensConfig::default());
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();
        let config_path = workspace_config_path(workspace);

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();
        std::fs::write(&config_path, "[input]\nlimit = 7\n").unwrap();

        // Second init leaves the edited file alone
        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace).await.unwrap();
        let content = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(content, "[input]\nlimit = 7\n");
    }

    #[tokio::test]
    async fn test_config_show_after_init() {
        let dir = TempDir::new().unwrap();
        assert!(!workspace_config_path(dir.path()).exists());
        handle_command(
            Commands::Config {
                action: ConfigAction::Init,
            },
            dir.path(),
        )
        .await
        .unwrap();
        assert!(config_exists(Some(dir.path())));
        handle_command(
            Commands::Config {
                action: ConfigAction::Show,
            },
            dir.path(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_config_show() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        handle_command(command, dir.path()).await.unwrap();
    }
}
