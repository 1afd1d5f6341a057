use std::path::Path;

use anyhow::{Context, Result};
use tc_features::profiler::ProfiledFeatures;

/// Write a profiling run to the cache file, creating its directory.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn write_cache(path: &Path, data: &ProfiledFeatures) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create cache directory: {}", parent.display()))?;
    }
    let bytes = bincode::serialize(data).context("Cannot serialize profiled features")?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Cannot write cache: {}", path.display()))?;
    log::info!("Cache écrit : {}", path.display());
    Ok(())
}

/// Read the latest profiling run.
///
/// # Errors
/// Returns an error if the file is missing or was written by another layout.
pub fn read_cache(path: &Path) -> Result<ProfiledFeatures> {
    let bytes = std::fs::read(path).with_context(|| {
        format!(
            "Cannot read cache: {} (lancer avec --profile pour le générer)",
            path.display()
        )
    })?;
    let data: ProfiledFeatures = bincode::deserialize(&bytes)
        .with_context(|| format!("Corrupt cache: {}", path.display()))?;
    log::info!(
        "Cache lu : {} ({} classes)",
        path.display(),
        data.classes.len()
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::config::PipelineConfig;
    use tc_core::sample::{Sample, TrafficClass};
    use tc_features::profiler::Profiler;

    fn profiled() -> ProfiledFeatures {
        let mut config = PipelineConfig::default();
        config.window.obs_window = 40;
        config.window.slide_window = 20;
        config.features.scalogram_scales = vec![2];
        config.features.pca_components = 2;
        let profiler = Profiler::from_config(&config).expect("valid config");
        let samples: Vec<Sample> = (0..200u64)
            .map(|i| Sample::new((i * 71) % 900, i % 13, i % 3, 2))
            .collect();
        let a = profiler
            .profile_samples(TrafficClass::new(0, "a"), &samples)
            .expect("profile");
        let b = profiler
            .profile_samples(TrafficClass::new(1, "b"), &samples[10..])
            .expect("profile");
        profiler.assemble(vec![a, b]).expect("assemble")
    }

    #[test]
    fn cache_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("profiled-data").join("input_data.bin");
        let data = profiled();
        write_cache(&path, &data).expect("write");
        assert_eq!(read_cache(&path).expect("read"), data);
    }

    #[test]
    fn missing_cache_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(read_cache(&dir.path().join("absent.bin")).is_err());
    }
}
