//! Stage runners.
//!
//! Each runner walks its inputs in a fixed order, records one outcome per
//! item and keeps going after a failure. The caller decides the exit status
//! from the returned report.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::combine::{self, CombineError, Combiner};
use crate::config::Config;
use crate::dataset::DatasetStore;
use crate::extract::{ExtractError, Extractor};
use crate::normalize::{NormalizeStatus, Normalizer};
use crate::report::{Outcome, RunReport, Stage};

/// Workbook formats calamine can open
pub const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Workbooks in `dir`, sorted by file name. Lock files (`~$...`) and hidden
/// files are ignored.
pub fn list_workbooks(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let io_err = |source| ExtractError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut workbooks = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with("~$") || name.starts_with('.') || !path.is_file() {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| w.eq_ignore_ascii_case(ext)));
        if supported {
            workbooks.push(path);
        }
    }
    workbooks.sort();
    Ok(workbooks)
}

/// Item name relative to `root`, for report lines
fn item_name(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

pub fn run_extract(config: &Config) -> RunReport {
    let mut report = RunReport::new(Stage::Extract);
    let raw_dir = &config.raw_data_dir;

    let workbooks = match list_workbooks(raw_dir) {
        Ok(workbooks) => workbooks,
        Err(e) => {
            error!("Cannot list workbooks in {}: {}", raw_dir.display(), e);
            report.push(Outcome::failed(raw_dir.display().to_string(), &e));
            return report;
        }
    };
    info!("Found {} workbooks in {}", workbooks.len(), raw_dir.display());

    let extractor = Extractor::new(&config.processed_data_dir);
    let mut regions: HashSet<String> = HashSet::new();

    for path in workbooks {
        let item = item_name(&path, raw_dir);

        let region = match Extractor::region_for(&path) {
            Ok(region) => region,
            Err(e) => {
                warn!("Skipping {}: {}", item, e);
                report.push(Outcome::failed(item, &e));
                continue;
            }
        };
        // A region is claimed only by a workbook that extracted cleanly
        if regions.contains(&region) {
            let e = ExtractError::DuplicateRegion(region);
            warn!("Skipping {}: {}", item, e);
            report.push(Outcome::failed(item, &e));
            continue;
        }

        match extractor.extract_workbook(&path) {
            Ok(extraction) if extraction.year_files.is_empty() => {
                let emptied = item_name(&config.region_dir(&region), &config.processed_data_dir);
                regions.insert(region);
                report.push(Outcome::warning(
                    item,
                    format!("no year-blocks found, {emptied} emptied"),
                ));
            }
            Ok(extraction) => {
                info!(
                    "Extracted {} year-files into {}",
                    extraction.year_files.len(),
                    config.region_dir(&region).display()
                );
                regions.insert(region);
                report.push(Outcome::succeeded(item, extraction.year_files));
            }
            Err(e) => {
                warn!("Skipping {}: {}", item, e);
                report.push(Outcome::failed(item, &e));
            }
        }
    }

    report
}

pub fn run_normalize(config: &Config) -> RunReport {
    let mut report = RunReport::new(Stage::Normalize);
    let root = &config.processed_data_dir;
    let combiner = Combiner::new(root, &config.master_name);

    let region_dirs = match combiner.region_dirs() {
        Ok(dirs) => dirs,
        Err(e) => {
            error!("{}", e);
            report.push(Outcome::failed(root.display().to_string(), &e));
            return report;
        }
    };

    let normalizer = Normalizer::new();
    for dir in region_dirs {
        let files = match combine::year_files(&dir) {
            Ok(files) => files,
            Err(e) => {
                report.push(Outcome::failed(item_name(&dir, root), &e));
                continue;
            }
        };

        for path in files {
            let item = item_name(&path, root);
            match normalizer.normalize_file(&path) {
                Ok(NormalizeStatus::Normalized) => {
                    report.push(Outcome::succeeded(item, vec![path]));
                }
                Ok(NormalizeStatus::AlreadyNormalized) => {
                    report.push(Outcome::succeeded(item, Vec::new()));
                }
                Err(e) => {
                    warn!("Skipping {}: {}", item, e);
                    report.push(Outcome::failed(item, &e));
                }
            }
        }
    }

    report
}

pub fn run_combine(config: &Config) -> RunReport {
    let mut report = RunReport::new(Stage::Combine);
    let root = &config.processed_data_dir;
    let combiner = Combiner::new(root, &config.master_name);
    let master_item = item_name(combiner.master_path(), root);

    let region_dirs = match combiner.region_dirs() {
        Ok(dirs) => dirs,
        Err(e) => {
            error!("{}", e);
            report.push(Outcome::failed(root.display().to_string(), &e));
            return report;
        }
    };

    let mut tables = Vec::new();
    let mut failed_regions = Vec::new();

    for dir in region_dirs {
        let item = item_name(&dir, root);
        match combiner.combine_region(&dir) {
            Ok(Some(region)) => {
                let outputs = vec![region.combined.clone(), region.totals.clone()];
                tables.push(region);
                report.push(Outcome::succeeded(item, outputs));
            }
            Ok(None) => {
                report.push(Outcome::warning(item, "no year-files"));
            }
            Err(e) => {
                error!("Region {} failed: {}", item, e);
                report.push(Outcome::failed(item.clone(), &e));
                failed_regions.push(item);
            }
        }
    }

    if !failed_regions.is_empty() {
        let blocked = CombineError::MasterBlocked(failed_regions);
        error!("{}", blocked);
        if let Err(e) = combiner.remove_stale_master() {
            error!("{}", e);
        }
        report.push(Outcome::failed(master_item, &blocked));
        return report;
    }

    match combiner.build_master(&tables) {
        Ok(_) => {
            report.push(Outcome::succeeded(
                master_item,
                vec![combiner.master_path().to_path_buf()],
            ));
        }
        Err(e) => {
            error!("Master build failed: {}", e);
            report.push(Outcome::failed(master_item, &e));
        }
    }

    report
}

/// Extract, normalize and combine in order
pub fn run_all(config: &Config) -> Vec<RunReport> {
    vec![run_extract(config), run_normalize(config), run_combine(config)]
}

/// Load the master through `store` and attach its data-quality summary
pub fn inspect(config: &Config, store: &DatasetStore) -> RunReport {
    let mut report = RunReport::new(Stage::Inspect);
    let master = config.master_path();
    let item = master.display().to_string();

    match store.load(&master) {
        Ok(dataset) => {
            info!(
                "{} rows across {} regions and {} years",
                dataset.len(),
                dataset.regions().len(),
                dataset.years().len()
            );
            report.quality = Some(dataset.quality().clone());
            report.push(Outcome::succeeded(item, Vec::new()));
        }
        Err(e) => {
            error!("{}", e);
            report.push(Outcome::failed(item, &e));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_workbooks_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "west-midlands-residents-abi.xlsx",
            "east-of-england-residents-abi.xls",
            "~$east-of-england-residents-abi.xls",
            ".hidden.xlsx",
            "notes.txt",
        ] {
            fs::write(tmp.path().join(name), "").unwrap();
        }

        let names: Vec<String> = list_workbooks(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["east-of-england-residents-abi.xls", "west-midlands-residents-abi.xlsx"]
        );
    }

    #[test]
    fn test_extract_missing_raw_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let config = Config::new(tmp.path().join("nope"), tmp.path().join("out"), "England").unwrap();
        let report = run_extract(&config);
        assert!(report.has_failures());
    }

    #[test]
    fn test_inspect_without_master() {
        let tmp = TempDir::new().unwrap();
        let config = Config::new(tmp.path(), tmp.path(), "England").unwrap();
        let report = inspect(&config, &DatasetStore::new());
        assert!(report.has_failures());
        assert!(report.quality.is_none());
        assert!(report.outcomes[0]
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("combine"));
    }
}
