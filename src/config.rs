use crate::aggregate::ScoreWeights;
use crate::band::{BandPlan, BandRange};
use crate::cli::CliArgs;
use crate::errors::AppError;
use crate::spot_stream::DEFAULT_LOGIN_PROMPT;
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_UDP_PORT: u16 = 2237;
pub const DEFAULT_CLUSTER_HOST: &str = "telnet.reversebeacon.net";
pub const DEFAULT_CLUSTER_PORT: u16 = 7000;

/// Optional JSON overlay. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub udp_port: Option<u16>,
    pub cluster_host: Option<String>,
    pub cluster_port: Option<u16>,
    pub login: Option<String>,
    pub login_prompt: Option<String>,
    pub bands: Option<Vec<BandRange>>,
    pub weights: Option<ScoreWeights>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::IO(format!("read config {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, AppError> {
        serde_json::from_str(text).map_err(|e| AppError::Config(format!("{}", e)))
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub udp_port: u16,
    pub cluster_host: String,
    pub cluster_port: u16,
    /// Credential line; spots are disabled when empty.
    pub login: String,
    pub login_prompt: String,
    pub band_plan: BandPlan,
    pub weights: ScoreWeights,
    pub store_path: PathBuf,
    pub roster_path: Option<PathBuf>,
    pub spots_enabled: bool,
    pub start_paused: bool,
}

impl TrackerConfig {
    /// CLI flags win over the file, the file wins over built-in defaults.
    pub fn resolve(args: &CliArgs, file: FileConfig) -> Result<Self, AppError> {
        let band_plan = match file.bands {
            Some(ranges) => BandPlan::new(ranges)?,
            None => BandPlan::default(),
        };
        let login = args
            .login
            .clone()
            .or(file.login)
            .unwrap_or_default()
            .trim()
            .to_string();

        let mut spots_enabled = !args.no_spots;
        if spots_enabled && login.is_empty() {
            warn!("No --login callsign given; spot feed disabled");
            spots_enabled = false;
        }

        let cfg = Self {
            udp_port: args.udp_port.or(file.udp_port).unwrap_or(DEFAULT_UDP_PORT),
            cluster_host: args
                .cluster_host
                .clone()
                .or(file.cluster_host)
                .unwrap_or_else(|| DEFAULT_CLUSTER_HOST.to_string()),
            cluster_port: args.cluster_port.or(file.cluster_port).unwrap_or(DEFAULT_CLUSTER_PORT),
            login,
            login_prompt: args
                .prompt
                .clone()
                .or(file.login_prompt)
                .unwrap_or_else(|| DEFAULT_LOGIN_PROMPT.to_string()),
            band_plan,
            weights: file.weights.unwrap_or_default(),
            store_path: args.store.clone(),
            roster_path: args.roster.clone(),
            spots_enabled,
            start_paused: args.paused,
        };
        if cfg.login_prompt.is_empty() {
            return Err(AppError::Config("login prompt must not be empty".into()));
        }
        debug!("config: {:?}", cfg);
        Ok(cfg)
    }

    pub fn from_cli(args: &CliArgs) -> Result<Self, AppError> {
        let file = match &args.config {
            Some(p) => FileConfig::load(p)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Band;

    #[test]
    fn defaults_without_file() {
        let args = CliArgs { login: Some(" n0call ".into()), ..CliArgs::default() };
        let cfg = TrackerConfig::resolve(&args, FileConfig::default()).unwrap();
        assert_eq!(cfg.udp_port, 2237);
        assert_eq!(cfg.cluster_host, "telnet.reversebeacon.net");
        assert_eq!(cfg.cluster_port, 7000);
        assert_eq!(cfg.login, "n0call");
        assert!(cfg.spots_enabled);
        assert_eq!(cfg.weights, ScoreWeights::default());
        assert_eq!(cfg.band_plan, BandPlan::default());
    }

    #[test]
    fn spots_disabled_without_login() {
        let cfg = TrackerConfig::resolve(&CliArgs::default(), FileConfig::default()).unwrap();
        assert!(!cfg.spots_enabled);
    }

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let file = FileConfig::parse(
            r#"{
                "udp_port": 2238,
                "cluster_host": "dxc.example.net",
                "login": "K1ABC",
                "weights": { "cw": 3, "phone": 2, "digital_a": 1, "digital_b": 1 },
                "bands": [ { "band": "20", "low_hz": 14000000, "high_hz": 14070000 } ]
            }"#,
        )
        .unwrap();
        let args = CliArgs { udp_port: Some(2239), ..CliArgs::default() };
        let cfg = TrackerConfig::resolve(&args, file).unwrap();
        assert_eq!(cfg.udp_port, 2239);
        assert_eq!(cfg.cluster_host, "dxc.example.net");
        assert_eq!(cfg.login, "K1ABC");
        assert_eq!(cfg.weights.cw, 3);
        assert_eq!(cfg.band_plan.classify(14_025_000), Some(Band::B20));
        assert_eq!(cfg.band_plan.classify(14_074_000), None);
    }

    #[test]
    fn bad_file_is_config_error() {
        assert!(matches!(FileConfig::parse(r#"{ "udp_prot": 1 }"#), Err(AppError::Config(_))));
        let file = FileConfig::parse(
            r#"{ "bands": [
                { "band": "20", "low_hz": 14000000, "high_hz": 14350000 },
                { "band": "17", "low_hz": 14300000, "high_hz": 18168000 } ] }"#,
        )
        .unwrap();
        assert!(TrackerConfig::resolve(&CliArgs::default(), file).is_err());
    }
}
