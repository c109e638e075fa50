use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::media::AssetId;

/// Pipeline stage that reports progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Download,
    Export,
    Compress,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::Export => "export",
            Stage::Compress => "compress",
        };
        f.write_str(name)
    }
}

/// Combines per-stage progress of every asset in a batch into one value.
///
/// Each stage keeps the last fraction seen per asset. Assets that have not
/// reached a stage contribute 0 to it. Finished assets are retired: their
/// entries leave the maps and their final contribution is kept in `settled`.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    download: HashMap<AssetId, f64>,
    export: HashMap<AssetId, f64>,
    compress: HashMap<AssetId, f64>,
    settled: f64,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the latest `fraction` for `asset` in `stage`, clamped to `[0, 1]`
    pub fn record(&mut self, stage: Stage, asset: &AssetId, fraction: f64) {
        let fraction = clamp_unit(fraction);
        self.stage_mut(stage).insert(asset.clone(), fraction);
    }

    /// Last recorded fraction, 0 when the asset has not reached the stage
    pub fn fraction(&self, stage: Stage, asset: &AssetId) -> f64 {
        self.stage(stage).get(asset).copied().unwrap_or(0.0)
    }

    /// `(download + export + compress) / 3` for one asset
    pub fn combined_for(&self, asset: &AssetId) -> f64 {
        let sum = self.fraction(Stage::Download, asset)
            + self.fraction(Stage::Export, asset)
            + self.fraction(Stage::Compress, asset);
        sum / 3.0
    }

    /// Library-wide value: average of the three stage sums over `total_selected`
    pub fn combined_fraction(&self, total_selected: usize) -> f64 {
        if total_selected == 0 {
            return 0.0;
        }

        let stage_sum = |map: &HashMap<AssetId, f64>| map.values().sum::<f64>();
        let live = (stage_sum(&self.download) + stage_sum(&self.export) + stage_sum(&self.compress)) / 3.0;

        clamp_unit((live + self.settled) / total_selected as f64)
    }

    /// Drop every entry of `asset`. A completed asset keeps a full share.
    pub fn retire(&mut self, asset: &AssetId, completed: bool) {
        self.download.remove(asset);
        self.export.remove(asset);
        self.compress.remove(asset);
        if completed {
            self.settled += 1.0;
        }
    }

    /// Number of assets with at least one live entry
    pub fn tracked(&self) -> usize {
        self.download
            .keys()
            .chain(self.export.keys())
            .chain(self.compress.keys())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn reset(&mut self) {
        self.download.clear();
        self.export.clear();
        self.compress.clear();
        self.settled = 0.0;
    }

    fn stage(&self, stage: Stage) -> &HashMap<AssetId, f64> {
        match stage {
            Stage::Download => &self.download,
            Stage::Export => &self.export,
            Stage::Compress => &self.compress,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut HashMap<AssetId, f64> {
        match stage {
            Stage::Download => &mut self.download,
            Stage::Export => &mut self.export,
            Stage::Compress => &mut self.compress,
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
