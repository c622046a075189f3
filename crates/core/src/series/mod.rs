use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, SeaLevelError};

/// Label of a warming pathway, e.g. `"1.5"`.
pub type ScenarioId = String;

/// Horizontal reference line drawn behind the wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub value: f64,
    pub label: String,
}

/// Validated sea level dataset. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesDataset {
    pub region: String,
    pub timeline: Vec<i32>,
    pub scenarios: BTreeMap<ScenarioId, Vec<f64>>,
    pub audio_by_scenario: BTreeMap<ScenarioId, String>,
    pub thresholds: Vec<Threshold>,
}

impl SeriesDataset {
    /// Parses and validates a JSON document.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let root: Value = serde_json::from_slice(bytes)
            .map_err(|err| SeaLevelError::data(format!("malformed payload: {err}")))?;
        Self::from_value(&root)
    }

    fn from_value(root: &Value) -> Result<Self> {
        let object = root
            .as_object()
            .ok_or_else(|| SeaLevelError::data("invalid data format"))?;

        let region = object
            .get("region")
            .or_else(|| object.get("country"))
            .and_then(Value::as_str)
            .filter(|region| !region.is_empty())
            .ok_or_else(|| SeaLevelError::data("missing or invalid region field"))?
            .to_string();

        let timeline = parse_timeline(object)?;
        let scenarios = parse_scenarios(object, timeline.len())?;
        let audio_by_scenario = parse_audio(object)?;
        let thresholds = parse_thresholds(object)?;

        Ok(Self {
            region,
            timeline,
            scenarios,
            audio_by_scenario,
            thresholds,
        })
    }

    /// Number of points on the shared timeline. Never zero.
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.timeline.len().saturating_sub(1)
    }

    pub fn has_scenario(&self, id: &str) -> bool {
        self.scenarios.contains_key(id)
    }

    pub fn series(&self, id: &str) -> Option<&[f64]> {
        self.scenarios.get(id).map(Vec::as_slice)
    }

    pub fn value_at(&self, id: &str, index: usize) -> Option<f64> {
        self.series(id).and_then(|values| values.get(index).copied())
    }

    pub fn year_at(&self, index: usize) -> Option<i32> {
        self.timeline.get(index).copied()
    }

    /// Narration asset for the scenario. Absent audio is legal.
    pub fn audio_for(&self, id: &str) -> Option<&str> {
        self.audio_by_scenario
            .get(id)
            .map(String::as_str)
            .filter(|audio| !audio.is_empty())
    }

    /// Highest value in the scenario's series, or zero.
    pub fn peak(&self, id: &str) -> f64 {
        self.series(id)
            .map(|values| values.iter().copied().fold(0.0, f64::max))
            .unwrap_or(0.0)
    }

    /// Scenario labels ordered by their numeric value.
    pub fn scenario_ids(&self) -> Vec<ScenarioId> {
        list_scenarios(self)
    }
}

fn parse_timeline(object: &Map<String, Value>) -> Result<Vec<i32>> {
    let years = object
        .get("years")
        .or_else(|| object.get("timeline"))
        .and_then(Value::as_array)
        .filter(|years| !years.is_empty())
        .ok_or_else(|| SeaLevelError::data("missing or invalid years array"))?;

    let mut timeline = Vec::with_capacity(years.len());
    for year in years {
        let year = year
            .as_i64()
            .and_then(|year| i32::try_from(year).ok())
            .ok_or_else(|| SeaLevelError::data(format!("invalid year `{year}`")))?;
        if timeline.last().is_some_and(|previous| *previous >= year) {
            return Err(SeaLevelError::data(format!(
                "years must be strictly increasing (at {year})"
            )));
        }
        timeline.push(year);
    }
    Ok(timeline)
}

fn parse_scenarios(
    object: &Map<String, Value>,
    expected_len: usize,
) -> Result<BTreeMap<ScenarioId, Vec<f64>>> {
    let raw = object
        .get("scenarios")
        .and_then(Value::as_object)
        .filter(|scenarios| !scenarios.is_empty())
        .ok_or_else(|| SeaLevelError::data("missing or invalid scenarios object"))?;

    let mut scenarios = BTreeMap::new();
    for (id, values) in raw {
        let values = values
            .as_array()
            .filter(|values| values.len() == expected_len)
            .ok_or_else(|| {
                SeaLevelError::data(format!(
                    "scenario {id} data length doesn't match years array"
                ))
            })?;
        let values = values
            .iter()
            .map(|value| value.as_f64().filter(|value| value.is_finite()))
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| SeaLevelError::data(format!("scenario {id} has a non-numeric value")))?;
        scenarios.insert(id.clone(), values);
    }
    Ok(scenarios)
}

fn parse_audio(object: &Map<String, Value>) -> Result<BTreeMap<ScenarioId, String>> {
    let raw = object
        .get("audio")
        .and_then(Value::as_object)
        .ok_or_else(|| SeaLevelError::data("missing or invalid audio object"))?;

    raw.iter()
        .map(|(id, path)| {
            path.as_str()
                .map(|path| (id.clone(), path.to_string()))
                .ok_or_else(|| SeaLevelError::data(format!("audio for scenario {id} is not a path")))
        })
        .collect()
}

fn parse_thresholds(object: &Map<String, Value>) -> Result<Vec<Threshold>> {
    let raw = object
        .get("thresholds")
        .filter(|thresholds| thresholds.is_array())
        .ok_or_else(|| SeaLevelError::data("missing or invalid thresholds array"))?;

    serde_json::from_value(raw.clone())
        .map_err(|err| SeaLevelError::data(format!("invalid threshold: {err}")))
}

/// Scenario labels sorted by ascending numeric value, so `"2.5"` lands
/// between `"1.5"` and `"5"`. Labels that are not numbers go last, in
/// lexical order.
pub fn list_scenarios(dataset: &SeriesDataset) -> Vec<ScenarioId> {
    let mut ids: Vec<ScenarioId> = dataset.scenarios.keys().cloned().collect();
    ids.sort_by(|a, b| compare_labels(a, b));
    ids
}

fn compare_labels(a: &str, b: &str) -> Ordering {
    let parse = |label: &str| label.trim().parse::<f64>().ok().filter(|v| !v.is_nan());
    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Inserts `steps - 1` evenly spaced points between each pair of neighbours.
pub fn interpolate(values: &[f64], steps: usize) -> Vec<f64> {
    if values.len() < 2 || steps <= 1 {
        return values.to_vec();
    }

    let mut out = Vec::with_capacity((values.len() - 1) * steps + 1);
    for pair in values.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        out.push(start);
        for step in 1..steps {
            let t = step as f64 / steps as f64;
            out.push(start + (end - start) * t);
        }
    }
    out.extend(values.last().copied());
    out
}

/// Fetch-like access to raw dataset documents. Implementations perform no
/// retries; a failed fetch is reported once and the caller decides.
pub trait DataSource {
    fn fetch(&self, source: &str) -> Result<Vec<u8>>;
}

/// Reads dataset documents from the filesystem, optionally below a root.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl DataSource for FileSource {
    fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        let path = match &self.root {
            Some(root) => root.join(source.trim_start_matches('/')),
            None => PathBuf::from(source),
        };
        std::fs::read(&path)
            .map_err(|err| SeaLevelError::data(format!("{} is unreachable: {err}", path.display())))
    }
}

/// Loads datasets once per source and hands out shared, read-only copies.
#[derive(Debug)]
pub struct SeriesStore<S> {
    source: S,
    cache: HashMap<String, Arc<SeriesDataset>>,
}

impl<S: DataSource> SeriesStore<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    /// Returns the cached dataset for `source`, fetching and validating it
    /// on first use. Failures are not cached.
    pub fn load(&mut self, source: &str) -> Result<Arc<SeriesDataset>> {
        if let Some(dataset) = self.cache.get(source) {
            return Ok(Arc::clone(dataset));
        }

        let dataset = self
            .source
            .fetch(source)
            .map_err(|err| match err {
                SeaLevelError::Data { .. } => err,
                other => SeaLevelError::data(other.to_string()),
            })
            .and_then(|bytes| SeriesDataset::from_json_slice(&bytes))
            .map_err(|err| {
                tracing::warn!(source, error = %err, "rejected sea level dataset");
                err
            })?;

        tracing::debug!(
            source,
            region = %dataset.region,
            years = dataset.len(),
            scenarios = dataset.scenarios.len(),
            "loaded sea level dataset"
        );
        let dataset = Arc::new(dataset);
        self.cache.insert(source.to_string(), Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn is_cached(&self, source: &str) -> bool {
        self.cache.contains_key(source)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const THREE_YEARS: &str = r#"{
        "country": "Fiji",
        "years": [2020, 2030, 2040],
        "scenarios": {
            "5": [0.2, 0.5, 0.9],
            "1.5": [0.1, 0.2, 0.3],
            "2.5": [0.15, 0.3, 0.5]
        },
        "audio": { "1.5": "/sounds/1.5.mp3", "5": "/sounds/5.mp3" },
        "thresholds": [
            { "value": 0.5, "label": "Coastal flooding" },
            { "value": 1.0, "label": "Displacement" }
        ]
    }"#;

    pub fn dataset() -> SeriesDataset {
        SeriesDataset::from_json_slice(THREE_YEARS.as_bytes()).unwrap()
    }
}
