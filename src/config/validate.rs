// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::ModuleGraph;
use crate::errors::{OrchestratorError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = OrchestratorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.modules))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_modules(cfg)?;
    validate_global_config(cfg)?;
    validate_module_names(cfg)?;
    validate_module_inputs(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_modules(cfg: &RawConfigFile) -> Result<()> {
    if cfg.modules.is_empty() {
        return Err(OrchestratorError::ConfigError(
            "manifest must contain at least one [[module]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(OrchestratorError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.listing_concurrency == 0 {
        return Err(OrchestratorError::ConfigError(
            "[config].listing_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.chunk_size == Some(0) {
        return Err(OrchestratorError::ConfigError(
            "[config].chunk_size must be >= 1 when set (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_module_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for module in cfg.modules.iter() {
        if module.name.trim().is_empty() {
            return Err(OrchestratorError::ConfigError(
                "module name must not be empty".to_string(),
            ));
        }
        if !seen.insert(module.name.as_str()) {
            return Err(OrchestratorError::ConfigError(format!(
                "module '{}' is declared more than once",
                module.name
            )));
        }
        if module.is_store() && module.output_type.trim().is_empty() {
            return Err(OrchestratorError::ConfigError(format!(
                "store module '{}' must declare its value type in `output_type`",
                module.name
            )));
        }
    }
    Ok(())
}

fn validate_module_inputs(cfg: &RawConfigFile) -> Result<()> {
    let names: HashSet<&str> = cfg.modules.iter().map(|m| m.name.as_str()).collect();

    for module in cfg.modules.iter() {
        for dep in module.dependency_names() {
            if dep == module.name {
                return Err(OrchestratorError::ConfigError(format!(
                    "module '{}' cannot take itself as input",
                    module.name
                )));
            }
            if !names.contains(dep) {
                return Err(OrchestratorError::ConfigError(format!(
                    "module '{}' has unknown input module '{}'",
                    module.name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Graph construction rejects cycles; the graph itself is rebuilt by
    // whoever needs it.
    ModuleGraph::new(cfg.modules.clone()).map(|_| ())
}
