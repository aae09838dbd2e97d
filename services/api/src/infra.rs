use chrono::NaiveDate;
use guideline_engine::config::RulesConfig;
use guideline_engine::error::AppError;
use guideline_engine::workflows::rulebook::RuleBook;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Loaded rule data plus the policy switches that govern how it is used.
#[derive(Clone)]
pub(crate) struct RuleState {
    pub(crate) book: Arc<RuleBook>,
    pub(crate) one_book_rule: bool,
}

impl RuleState {
    pub(crate) fn load(config: &RulesConfig) -> Result<Self, AppError> {
        let book = RuleBook::from_dir(&config.data_dir)?;
        info!(
            data_dir = %config.data_dir.display(),
            editions = book.len(),
            rejected = book.rejected().len(),
            one_book_rule = config.one_book_rule,
            "rule data ready"
        );
        Ok(Self {
            book: Arc::new(book),
            one_book_rule: config.one_book_rule,
        })
    }
}

/// Command-line `--data-dir` wins over `GUIDELINE_DATA_DIR`.
pub(crate) fn apply_data_dir(config: &mut RulesConfig, data_dir: Option<PathBuf>) {
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| AppError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
pub(crate) fn bundled_rules() -> RuleState {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data");
    RuleState::load(&RulesConfig {
        data_dir: PathBuf::from(dir),
        one_book_rule: true,
    })
    .expect("bundled rule data loads")
}
