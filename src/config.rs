use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// Every section falls back to its `Default`, so an empty configuration
/// reproduces the stock thresholds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub composer: ComposerConfig,
    #[serde(default)]
    pub harness: HarnessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Heuristic scoring weights for the decision engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub win_rate_weight: f64,
    pub place_rate_weight: f64,
    pub surface_weight: f64,
    pub distance_weight: f64,
    /// Flat credit for an entrant with no history
    pub cold_start_score: f64,
    pub form_win_points: f64,
    pub form_second_points: f64,
    pub form_place_points: f64,
    /// Weight lost per step back in the form list (index 0 = most recent)
    pub form_decay: f64,
    pub low_risk_win_rate: f64,
    pub low_risk_min_form: usize,
    pub med_risk_place_rate: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            win_rate_weight: 1.5,
            place_rate_weight: 0.5,
            surface_weight: 0.5,
            distance_weight: 0.3,
            cold_start_score: 15.0,
            form_win_points: 15.0,
            form_second_points: 10.0,
            form_place_points: 5.0,
            form_decay: 0.1,
            low_risk_win_rate: 30.0,
            low_risk_min_form: 3,
            med_risk_place_rate: 50.0,
        }
    }
}

/// Profile accumulation constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Finish ranks kept in the form list
    pub form_length: usize,
    /// Ranks at or below this count as a place
    pub place_cutoff: u32,
    pub surprise_win_agf_max: f64,
    /// Win bonus is `surprise_win_base - agf`
    pub surprise_win_base: f64,
    pub surprise_place_agf_max: f64,
    pub surprise_place_bonus: f64,
    /// Multiplier applied to the surprise index after every ingested result
    pub surprise_decay: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            form_length: 5,
            place_cutoff: 4,
            surprise_win_agf_max: 10.0,
            surprise_win_base: 15.0,
            surprise_place_agf_max: 3.0,
            surprise_place_bonus: 3.0,
            surprise_decay: 0.95,
        }
    }
}

/// Per-race calibration thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub banko_percentile: f64,
    pub banko_top3_gap: f64,
    /// Dynamic gap threshold = base + scale / N
    pub gap_threshold_base: f64,
    pub gap_threshold_scale: f64,
    pub strong_favorite_percentile: f64,
    pub surprise_band_low: f64,
    pub surprise_band_high: f64,
    pub surprise_index_min: f64,
    /// Field size at which a narrow top gap marks the race risky
    pub crowded_field: usize,
    pub crowded_gap: f64,
    pub economy_cut: usize,
    pub economy_cut_risky: usize,
    pub wide_cut: usize,
    pub wide_cut_risky: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            banko_percentile: 0.97,
            banko_top3_gap: 0.15,
            gap_threshold_base: 0.05,
            gap_threshold_scale: 0.8,
            strong_favorite_percentile: 0.90,
            surprise_band_low: 0.60,
            surprise_band_high: 0.88,
            surprise_index_min: 5.0,
            crowded_field: 12,
            crowded_gap: 0.12,
            economy_cut: 2,
            economy_cut_risky: 3,
            wide_cut: 4,
            wide_cut_risky: 5,
        }
    }
}

/// Entropy/gap thresholds for race risk classification
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub entropy_low: f64,
    pub entropy_high: f64,
    pub gap_high: f64,
    pub gap_low: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            entropy_low: 1.5,
            entropy_high: 2.2,
            gap_high: 0.25,
            gap_low: 0.05,
        }
    }
}

/// Ticket composition settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    pub pseudo_agf_max: f64,
    pub pseudo_specialization_min: f64,
    pub pseudo_score_min: f64,
    pub pseudo_min_points: u32,
    pub max_rationale: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            pseudo_agf_max: 10.0,
            pseudo_specialization_min: 1.1,
            pseudo_score_min: 0.15,
            pseudo_min_points: 2,
            max_rationale: 5,
        }
    }
}

/// Walk-forward harness settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub checkpoint_path: PathBuf,
    pub output_dir: PathBuf,
    /// Build coupons for each date (calibration output is always produced)
    pub compose_coupons: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("outputs/sim/state.json"),
            output_dir: PathBuf::from("outputs/sim/daily"),
            compose_coupons: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON formatted logs
    pub json: bool,
    /// Directory for the daily rolling log file
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/backtest.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("GANYAN_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (GANYAN__CALIBRATION__BANKO_PERCENTILE, etc.)
            .add_source(
                Environment::with_prefix("GANYAN")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}
