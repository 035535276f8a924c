//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "discovery-pipeline";
const PROJECT_FILES: [&str; 2] = ["discovery.toml", ".discovery.toml"];
const ENV_PREFIX: &str = "DISCOVERY_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Environment: `DISCOVERY_*`, `__` separating nested keys
    ///    (e.g. `DISCOVERY_PIPELINE__MAX_PHASE_RETRIES=3`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./discovery.toml` or `./.discovery.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/discovery-pipeline/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(Self::global_config_path(), Self::project_config_path(), config_path)
            .extract()
            .map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    fn figment(
        global: Option<PathBuf>,
        project: Option<PathBuf>,
        explicit: Option<&Path>,
    ) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }
        if let Some(project_path) = project {
            figment = figment.merge(Toml::file(project_path));
        }
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the global config file path
    ///
    /// `$XDG_CONFIG_HOME/discovery-pipeline/config.toml` on Linux, the
    /// platform config directory elsewhere.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(explicit: Option<&Path>) {
        println!("Configuration sources (in priority order):");

        println!("  [  ENV] Environment: {}* (nested keys split on '__')", ENV_PREFIX);

        if let Some(path) = explicit {
            let mark = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{:>5}] Explicit: {}", mark, path.display());
        }

        match Self::project_config_path() {
            Some(path) => println!("  [FOUND] Project: {}", path.display()),
            None => println!("  [     ] Project: ./discovery.toml or ./.discovery.toml"),
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileOutputFormat;
    use std::fs;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert!(config.phases.is_empty());
        assert_eq!(config.pipeline.max_phase_retries, 2);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains(APP_DIR));
    }

    #[test]
    fn test_later_files_override_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("discovery.toml");
        let explicit = dir.path().join("explicit.toml");
        fs::write(
            &global,
            "[pipeline]\nmax_phase_retries = 5\nrecovery_mode = \"auto_retry\"\n",
        )
        .unwrap();
        fs::write(&project, "[pipeline]\nmax_phase_retries = 4\n").unwrap();
        fs::write(&explicit, "[output]\nformat = \"json\"\n").unwrap();

        let config: FileConfig =
            ConfigLoader::figment(Some(global), Some(project), Some(explicit.as_path()))
                .extract()
                .unwrap();

        assert_eq!(config.pipeline.max_phase_retries, 4);
        assert_eq!(config.pipeline.recovery_mode, "auto_retry");
        assert_eq!(config.output.format, FileOutputFormat::Json);
        assert_eq!(config.pipeline.intervention_mode, "interactive");
    }

    #[test]
    fn test_missing_global_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config: FileConfig =
            ConfigLoader::figment(Some(dir.path().join("absent.toml")), None, None)
                .extract()
                .unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_phases_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phases.toml");
        fs::write(
            &path,
            "[[phases]]\nid = \"research\"\n\n[[phases]]\nid = \"output\"\nrequired = false\n",
        )
        .unwrap();

        let file: FileConfig = ConfigLoader::figment(None, None, Some(path.as_path()))
            .extract()
            .unwrap();
        let config = file.into_discovery_config().unwrap();
        assert_eq!(config.phases.len(), 2);
        assert!(!config.phases[1].required);
    }
}
