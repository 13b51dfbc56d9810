//! Run configuration: per-channel mask parameters, intersection parameters,
//! directory layout and the per-subject tables.
//!
//! Everything has a default that reproduces the March 2022 batch, so a YAML
//! file only needs to list what differs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::common::{Channel, DepthWindow};
use crate::error::{ColocError, Result};
use crate::labeling::Connectivity;
use crate::morphology::{MorphOp, StructuringElement};

/// Named morphological cleanup sequences.
///
/// Older batches used different orderings; they are kept here so historical
/// results can be regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupRecipe {
    /// Dilation then erosion.
    #[default]
    Closing,
    /// A single dilation.
    DilateOnly,
    /// Erosion then dilation, then dilation then erosion.
    OpenThenClose,
    /// Dilation then erosion, then erosion then dilation.
    CloseThenOpen,
    /// No smoothing at all.
    Skip,
    /// An explicit operator list, applied in order.
    Custom(Vec<MorphOp>),
}

impl CleanupRecipe {
    pub fn operators(&self) -> Vec<MorphOp> {
        match self {
            CleanupRecipe::Closing => vec![MorphOp::Close],
            CleanupRecipe::DilateOnly => vec![MorphOp::Dilate],
            CleanupRecipe::OpenThenClose => vec![MorphOp::Open, MorphOp::Close],
            CleanupRecipe::CloseThenOpen => vec![MorphOp::Close, MorphOp::Open],
            CleanupRecipe::Skip => Vec::new(),
            CleanupRecipe::Custom(ops) => ops.clone(),
        }
    }
}

/// How one channel's slices are turned into masks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskConfig {
    /// Directory holding this channel's slices inside a stack directory.
    pub dir_name: String,
    /// Components with fewer pixels than this are dropped.
    pub min_object_size: usize,
    pub recipe: CleanupRecipe,
    pub structuring_element: StructuringElement,
    pub connectivity: Connectivity,
    pub fill_holes: bool,
}

impl MaskConfig {
    pub fn signal() -> Self {
        Self {
            dir_name: "GFP".to_string(),
            min_object_size: 1000,
            ..Self::default()
        }
    }

    pub fn marker() -> Self {
        Self {
            dir_name: "RFP".to_string(),
            min_object_size: 150,
            ..Self::default()
        }
    }
}

/// A channel block as written in YAML. Missing fields keep the channel preset.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MaskOverrides {
    dir_name: Option<String>,
    min_object_size: Option<usize>,
    recipe: Option<CleanupRecipe>,
    structuring_element: Option<StructuringElement>,
    connectivity: Option<Connectivity>,
    fill_holes: Option<bool>,
}

impl MaskOverrides {
    fn apply(self, preset: MaskConfig) -> MaskConfig {
        MaskConfig {
            dir_name: self.dir_name.unwrap_or(preset.dir_name),
            min_object_size: self.min_object_size.unwrap_or(preset.min_object_size),
            recipe: self.recipe.unwrap_or(preset.recipe),
            structuring_element: self
                .structuring_element
                .unwrap_or(preset.structuring_element),
            connectivity: self.connectivity.unwrap_or(preset.connectivity),
            fill_holes: self.fill_holes.unwrap_or(preset.fill_holes),
        }
    }
}

fn signal_mask<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<MaskConfig, D::Error> {
    MaskOverrides::deserialize(d).map(|o| o.apply(MaskConfig::signal()))
}

fn marker_mask<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<MaskConfig, D::Error> {
    MaskOverrides::deserialize(d).map(|o| o.apply(MaskConfig::marker()))
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            dir_name: String::new(),
            min_object_size: 0,
            recipe: CleanupRecipe::default(),
            structuring_element: StructuringElement::default(),
            connectivity: Connectivity::Four,
            fill_holes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionConfig {
    /// Components of the intersection with fewer voxels than this are dropped.
    pub min_object_size: usize,
    /// Connectivity used when dropping small intersection components.
    pub connectivity: Connectivity,
    /// Connectivity used when extracting regions. `four`/`eight` label slice by slice.
    pub region_connectivity: Connectivity,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            min_object_size: 200,
            connectivity: Connectivity::Six,
            region_connectivity: Connectivity::TwentySix,
        }
    }
}

/// Directory naming of the acquisition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub subject_prefix: String,
    pub timepoint_prefix: String,
    pub position_prefix: String,
    /// Directory between a position and its channel directories.
    pub stack_subdir: String,
    /// Glob for slice files inside a channel directory.
    pub slice_pattern: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            subject_prefix: "Fish".to_string(),
            timepoint_prefix: "Timepoint".to_string(),
            position_prefix: "Pos".to_string(),
            stack_subdir: "zStack".to_string(),
            slice_pattern: "*.tif".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectEntry {
    pub depth_window: DepthWindow,
    /// Only the first `timepoints` timepoints are processed when set.
    #[serde(default)]
    pub timepoints: Option<usize>,
}

impl SubjectEntry {
    pub fn new(lo: usize, hi: usize, timepoints: Option<usize>) -> Self {
        Self {
            depth_window: DepthWindow::new(lo, hi),
            timepoints,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "signal_mask")]
    pub signal: MaskConfig,
    #[serde(deserialize_with = "marker_mask")]
    pub marker: MaskConfig,
    pub intersection: IntersectionConfig,
    pub layout: LayoutConfig,
    pub subjects: BTreeMap<String, SubjectEntry>,
}

impl Default for Config {
    fn default() -> Self {
        let subjects = [
            ("Fish1", SubjectEntry::new(130, 305, Some(5))),
            ("Fish2", SubjectEntry::new(140, 305, None)),
            ("Fish3", SubjectEntry::new(155, 300, None)),
            ("Fish4", SubjectEntry::new(160, 270, Some(4))),
            ("Fish5", SubjectEntry::new(150, 310, Some(5))),
        ]
        .into_iter()
        .map(|(name, entry)| (name.to_string(), entry))
        .collect();

        Self {
            signal: MaskConfig::signal(),
            marker: MaskConfig::marker(),
            intersection: IntersectionConfig::default(),
            layout: LayoutConfig::default(),
            subjects,
        }
    }
}

impl Config {
    /// Reads a YAML configuration; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ColocError::io(path, e))?;
        let config: Config = serde_yml::from_str(&text).map_err(|source| ColocError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        for channel in [Channel::Signal, Channel::Marker] {
            if self.mask(channel).dir_name.is_empty() {
                return Err(ColocError::invalid_config(format!(
                    "{channel} channel has no directory name"
                )));
            }
            if !self.mask(channel).connectivity.is_planar() {
                return Err(ColocError::invalid_config(format!(
                    "{channel} channel masks are 2-D, use four or eight connectivity"
                )));
            }
        }
        if self.signal.dir_name == self.marker.dir_name {
            return Err(ColocError::invalid_config(
                "signal and marker channels share a directory",
            ));
        }
        for (name, entry) in &self.subjects {
            if entry.depth_window.is_empty() {
                return Err(ColocError::invalid_config(format!(
                    "depth window {} of {name} is empty",
                    entry.depth_window
                )));
            }
        }
        Ok(())
    }

    /// Fails with every subject in `names` that has no table entry.
    pub fn check_subjects<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let mut missing: Vec<String> = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| !self.subjects.contains_key(*n))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        missing.dedup();
        Err(ColocError::MissingSubjects { subjects: missing })
    }

    pub fn mask(&self, channel: Channel) -> &MaskConfig {
        match channel {
            Channel::Signal => &self.signal,
            Channel::Marker => &self.marker,
        }
    }

    pub fn subject(&self, name: &str) -> Result<&SubjectEntry> {
        self.subjects
            .get(name)
            .ok_or_else(|| ColocError::MissingSubjects {
                subjects: vec![name.to_string()],
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_historical_tables() {
        let config = Config::default();
        assert_eq!(
            config.subject("Fish2").unwrap().depth_window,
            DepthWindow::new(140, 305)
        );
        assert_eq!(config.subject("Fish4").unwrap().timepoints, Some(4));
        assert_eq!(config.signal.min_object_size, 1000);
        assert_eq!(config.marker.min_object_size, 150);
        assert_eq!(config.intersection.min_object_size, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "
marker:
  dir_name: RFP
  min_object_size: 500
  recipe: dilate_only
  fill_holes: false
subjects:
  Fish9:
    depth_window: {lo: 10, hi: 20}
";
        let config: Config = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.marker.min_object_size, 500);
        assert_eq!(config.marker.recipe.operators(), vec![MorphOp::Dilate]);
        assert!(!config.marker.fill_holes);
        assert_eq!(config.signal, MaskConfig::signal());
        assert_eq!(config.subjects.len(), 1);
        assert_eq!(config.subject("Fish9").unwrap().timepoints, None);
    }

    #[test]
    fn partial_channel_block_keeps_channel_preset() {
        let config: Config = serde_yml::from_str("marker: {min_object_size: 500}\n").unwrap();
        assert_eq!(config.marker.dir_name, "RFP");
        assert_eq!(config.marker.min_object_size, 500);
        assert_eq!(config.marker.recipe, CleanupRecipe::Closing);
        assert!(config.marker.fill_holes);
        assert_eq!(config.signal, MaskConfig::signal());
        assert!(config.validate().is_ok());

        let config: Config = serde_yml::from_str("signal: {fill_holes: false}\n").unwrap();
        assert_eq!(config.signal.dir_name, "GFP");
        assert_eq!(config.signal.min_object_size, 1000);
        assert!(!config.signal.fill_holes);
    }

    #[test]
    fn missing_subjects_are_all_reported() {
        let config = Config::default();
        let err = config
            .check_subjects(&["Fish1", "Fish7", "Fish6", "Fish7"])
            .unwrap_err();
        match err {
            ColocError::MissingSubjects { subjects } => {
                assert_eq!(subjects, vec!["Fish6".to_string(), "Fish7".to_string()])
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(config.check_subjects(&["Fish3"]).is_ok());
    }

    #[test]
    fn empty_window_is_rejected() {
        let mut config = Config::default();
        config
            .subjects
            .insert("Fish6".to_string(), SubjectEntry::new(20, 20, None));
        assert!(config.validate().is_err());
    }

    #[test]
    fn shared_channel_dirs_are_rejected() {
        let mut config = Config::default();
        config.marker.dir_name = "GFP".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn recipes_expand_in_order() {
        assert_eq!(
            CleanupRecipe::CloseThenOpen.operators(),
            vec![MorphOp::Close, MorphOp::Open]
        );
        assert!(CleanupRecipe::Skip.operators().is_empty());
    }
}
