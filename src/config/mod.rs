use std::fs;
use std::net::SocketAddr;

use log::{debug, trace};
use pingora::server::configuration::{Opt, ServerConf};
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Config::validate_log"))]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,

    #[validate(length(min = 1))]
    pub listeners: Vec<Listener>,

    #[serde(default)]
    pub log: Option<Log>,

    #[validate(nested)]
    #[serde(default)]
    pub storage: Storage,

    #[validate(nested)]
    #[serde(default)]
    pub pager: PagerDefaults,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_yaml_with_opt_override(opt: &Opt) -> Result<Self> {
        if let Some(path) = &opt.conf {
            let mut conf = Self::load_from_yaml(path)?;
            conf.merge_with_opt(opt);
            Ok(conf)
        } else {
            Error::e_explain(ReadError, "No path specified")
        }
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");

        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if opt.daemon {
            self.pingora.daemon = true;
        }
    }

    fn validate_log(&self) -> Result<(), ValidationError> {
        match &self.log {
            Some(log) if log.path.trim().is_empty() => Err(ValidationError::new("log_path_required")),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Listener {
    pub address: SocketAddr,
}

/// Optional file sink for log records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Log {
    pub path: String,
}

/// Backend selection and the tables created in it at startup. Without a
/// `path` rows live in memory only.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Storage {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub path: Option<String>,

    #[serde(default = "Storage::default_tables")]
    #[validate(length(min = 1))]
    pub tables: Vec<String>,
}

impl Storage {
    fn default_tables() -> Vec<String> {
        vec!["users".to_string()]
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: None,
            tables: Self::default_tables(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct PagerDefaults {
    #[serde(default = "PagerDefaults::default_page_size")]
    #[validate(range(min = 1))]
    pub page_size: u32,
}

impl PagerDefaults {
    fn default_page_size() -> u32 {
        500
    }
}

impl Default for PagerDefaults {
    fn default() -> Self {
        Self {
            page_size: Self::default_page_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_load_minimal_config() {
        init_log();
        let conf_str = r#"
---
listeners:
  - address: 0.0.0.0:8080
        "#;
        let conf = Config::from_yaml(conf_str).unwrap();
        assert_eq!(1, conf.listeners.len());
        assert!(conf.log.is_none());
        assert!(conf.storage.path.is_none());
        assert_eq!(conf.storage.tables, ["users"]);
        assert_eq!(500, conf.pager.page_size);
    }

    #[test]
    fn test_load_full_config() {
        init_log();
        let conf_str = r#"
---
pingora:
  version: 1
  threads: 2

listeners:
  - address: 0.0.0.0:8080
  - address: "[::1]:8080"

log:
  path: /var/log/pingrest/access.log

storage:
  path: ./data/database.db
  tables: [users, audits]

pager:
  page_size: 50
        "#;
        let conf = Config::from_yaml(conf_str).unwrap();
        assert_eq!(1, conf.pingora.version);
        assert_eq!(2, conf.pingora.threads);
        assert_eq!(2, conf.listeners.len());
        assert_eq!(
            conf.log.map(|log| log.path).as_deref(),
            Some("/var/log/pingrest/access.log")
        );
        assert_eq!(conf.storage.path.as_deref(), Some("./data/database.db"));
        assert_eq!(conf.storage.tables, ["users", "audits"]);
        assert_eq!(50, conf.pager.page_size);
    }

    #[test]
    fn test_listeners_required() {
        init_log();
        let conf_str = r#"
---
listeners: []
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_invalid_page_size() {
        init_log();
        let conf_str = r#"
---
listeners:
  - address: 0.0.0.0:8080
pager:
  page_size: 0
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_empty_log_path() {
        init_log();
        let conf_str = r#"
---
listeners:
  - address: 0.0.0.0:8080
log:
  path: ""
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_empty_storage_path() {
        init_log();
        let conf_str = r#"
---
listeners:
  - address: 0.0.0.0:8080
storage:
  path: ""
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }
}
