use crate::cli::OracleKind;
use crate::config::AuditConfig;
use crate::error::Result;
use crate::oracle::{GoListOracle, GoProxyOracle, VersionOracle};
use std::sync::Arc;

pub struct OracleFactory;

impl OracleFactory {
    pub fn create(config: &AuditConfig) -> Result<Arc<dyn VersionOracle>> {
        let oracle: Arc<dyn VersionOracle> = match config.oracle {
            OracleKind::GoList => Arc::new(GoListOracle::new(&config.go_binary, config.timeout)),
            OracleKind::GoProxy => Arc::new(GoProxyOracle::new(&config.goproxy, config.timeout)?),
        };
        Ok(oracle)
    }
}
