//! TOML run configuration.

use backlab_core::config::{BacktestConfig, FeedConfig};
use backlab_core::strategy::{BuyAndHold, SmaCrossover, Strategy};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level run configuration loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub data: DataSection,
    #[serde(default)]
    pub engine: EngineSection,
    pub strategy: StrategySection,
}

/// Where the bars come from.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSection {
    pub directory: PathBuf,
    /// Symbols to subscribe, in subscription (tiebreak) order. Empty means
    /// every symbol in the directory.
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub end_time: i64,
    #[serde(default)]
    pub replay_speed: f64,
}

/// Engine knobs; every field falls back to the engine default.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: f64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: f64,
    #[serde(default = "default_fill_volume_limit")]
    pub fill_volume_limit: f64,
    #[serde(default)]
    pub allow_short: bool,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

fn default_initial_cash() -> f64 {
    100_000.0
}
fn default_commission_rate() -> f64 {
    0.001
}
fn default_slippage_bps() -> f64 {
    5.0
}
fn default_fill_volume_limit() -> f64 {
    1.0
}
fn default_risk_free_rate() -> f64 {
    0.02
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            initial_cash: default_initial_cash(),
            commission_rate: default_commission_rate(),
            slippage_bps: default_slippage_bps(),
            fill_volume_limit: default_fill_volume_limit(),
            allow_short: false,
            risk_free_rate: default_risk_free_rate(),
        }
    }
}

/// Strategy selection: a type name plus numeric parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySection {
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    Parse(String),

    #[error("unknown strategy type '{0}'")]
    UnknownStrategy(String),

    #[error("strategy '{strategy}' is missing parameter '{param}'")]
    MissingParam { strategy: String, param: String },
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_cash: self.engine.initial_cash,
            commission_rate: self.engine.commission_rate,
            slippage_bps: self.engine.slippage_bps,
            start_time: self.data.start_time,
            end_time: self.data.end_time,
            fill_volume_limit: self.engine.fill_volume_limit,
            allow_short: self.engine.allow_short,
            risk_free_rate: self.engine.risk_free_rate,
        }
    }

    pub fn to_feed_config(&self) -> FeedConfig {
        FeedConfig {
            data_directory: self.data.directory.clone(),
            start_time: self.data.start_time,
            end_time: self.data.end_time,
            replay_speed: self.data.replay_speed,
            loop_replay: false,
            ..FeedConfig::default()
        }
    }

    /// Instantiate the configured strategy.
    ///
    /// Single-symbol strategies trade the first configured symbol.
    pub fn build_strategy(&self) -> Result<Box<dyn Strategy>, ConfigError> {
        let symbol = self.data.symbols.first().cloned().unwrap_or_default();
        let param = |name: &str| -> Result<f64, ConfigError> {
            self.strategy.params.get(name).copied().ok_or_else(|| ConfigError::MissingParam {
                strategy: self.strategy.strategy_type.clone(),
                param: name.to_string(),
            })
        };

        match self.strategy.strategy_type.as_str() {
            "buy_and_hold" => Ok(Box::new(BuyAndHold::new(symbol, param("quantity")?))),
            "sma_crossover" => Ok(Box::new(SmaCrossover::new(
                symbol,
                param("quantity")?,
                param("fast_period")? as usize,
                param("slow_period")? as usize,
            ))),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_TOML: &str = r#"
[data]
directory = "data"
symbols = ["SPY", "QQQ"]
start_time = 1000
end_time = 2000
replay_speed = 0.0

[engine]
initial_cash = 50000.0
commission_rate = 0.002
slippage_bps = 10.0
allow_short = true

[strategy]
type = "sma_crossover"
params = { quantity = 100.0, fast_period = 20.0, slow_period = 50.0 }
"#;

    const MINIMAL_TOML: &str = r#"
[data]
directory = "data"
symbols = ["SPY"]

[strategy]
type = "buy_and_hold"
params = { quantity = 10.0 }
"#;

    #[test]
    fn parses_full_config() {
        let config = RunConfig::from_toml(FULL_TOML).unwrap();
        assert_eq!(config.data.symbols, vec!["SPY", "QQQ"]);

        let engine = config.to_backtest_config();
        assert_eq!(engine.initial_cash, 50_000.0);
        assert_eq!(engine.commission_rate, 0.002);
        assert!(engine.allow_short);
        assert_eq!(engine.start_time, 1000);

        let strategy = config.build_strategy().unwrap();
        assert_eq!(strategy.name(), "sma_crossover");
    }

    #[test]
    fn minimal_config_gets_engine_defaults() {
        let config = RunConfig::from_toml(MINIMAL_TOML).unwrap();
        let engine = config.to_backtest_config();
        assert_eq!(engine.initial_cash, 100_000.0);
        assert_eq!(engine.commission_rate, 0.001);
        assert_eq!(engine.slippage_bps, 5.0);
        assert!(!engine.allow_short);
        assert_eq!(config.build_strategy().unwrap().name(), "buy_and_hold");
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let toml_str = MINIMAL_TOML.replace("buy_and_hold", "martingale");
        let config = RunConfig::from_toml(&toml_str).unwrap();
        assert!(matches!(
            config.build_strategy(),
            Err(ConfigError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn missing_param_names_the_gap() {
        let toml_str = r#"
[data]
directory = "data"
symbols = ["SPY"]

[strategy]
type = "sma_crossover"
params = { quantity = 100.0 }
"#;
        let config = RunConfig::from_toml(toml_str).unwrap();
        let err = config.build_strategy().err().expect("build should fail");
        match err {
            ConfigError::MissingParam { param, .. } => assert_eq!(param, "fast_period"),
            other => panic!("expected MissingParam, got {other}"),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            RunConfig::from_toml("not [valid"),
            Err(ConfigError::Parse(_))
        ));
    }
}
