use kinerja::error::AppError;
use kinerja::pipeline::{load_directory_from_path, DirectoryEntry, PerformanceImporter};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Importer preconfigured with the directory snapshot and policy; each
    /// request layers its own level mappings on a clone.
    pub(crate) importer: Arc<PerformanceImporter>,
}

/// Load the directory export when one is configured. Without one, header
/// names need a resolution unless unmatched names are accepted as new.
pub(crate) fn load_directory_snapshot(
    path: Option<&Path>,
) -> Result<Vec<DirectoryEntry>, AppError> {
    match path {
        Some(path) => {
            let entries = load_directory_from_path(path)?;
            info!(path = %path.display(), entries = entries.len(), "loaded employee directory");
            Ok(entries)
        }
        None => {
            warn!("no employee directory configured; every name will need a resolution");
            Ok(Vec::new())
        }
    }
}

pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}
