//! Finding acquisitions on disk and reading their slices.
//!
//! The expected tree is
//! `<root>/<Fish n>/<Timepoint n>/<Pos n>/<stack dir>/<channel dir>/<slices>`,
//! with the prefixes and the stack directory taken from [`crate::config::LayoutConfig`].

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use log::{debug, info, warn};
use ndarray::Array2;

use crate::common::{AcquisitionId, Channel, GraySlice};
use crate::config::Config;
use crate::error::{ColocError, Result};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Text(String),
    Number(u128),
}

fn natural_key(s: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;
    for ch in s.chars() {
        let is_digit = ch.is_ascii_digit();
        if !current.is_empty() && is_digit != in_digits {
            chunks.push(to_chunk(&current, in_digits));
            current.clear();
        }
        in_digits = is_digit;
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(to_chunk(&current, in_digits));
    }
    chunks
}

fn to_chunk(s: &str, digits: bool) -> Chunk {
    if digits {
        // digit runs too long for u128 fall back to text
        s.parse::<u128>()
            .map(Chunk::Number)
            .unwrap_or_else(|_| Chunk::Text(s.to_string()))
    } else {
        Chunk::Text(s.to_string())
    }
}

/// Compares two strings the way a person would: digit runs by value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b)).then_with(|| a.cmp(b))
}

/// Sorts paths so that `img2` comes before `img10`.
pub fn natural_sort(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
}

fn glob_paths(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern)
        .map_err(|source| ColocError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .collect();
    Ok(paths)
}

fn escaped(dir: &Path) -> String {
    Pattern::escape(&dir.to_string_lossy())
}

/// Lists the slice files of one channel directory in natural order.
pub fn list_slices(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ColocError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "channel directory not found"),
        ));
    }
    let full = format!("{}/{}", escaped(dir), pattern);
    let mut paths: Vec<PathBuf> = glob_paths(&full)?
        .into_iter()
        .filter(|p| p.is_file())
        .collect();
    natural_sort(&mut paths);
    debug!("Found {} slices in {}", paths.len(), dir.display());
    Ok(paths)
}

/// Reads a single-slice image as 16-bit intensities.
///
/// 8-bit images keep their values; colour images are converted to luma.
pub fn read_slice(path: &Path) -> Result<GraySlice> {
    let img = image::open(path).map_err(|source| ColocError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    let data: Vec<u16> = match img {
        image::DynamicImage::ImageLuma16(buf) => buf.into_raw(),
        image::DynamicImage::ImageLuma8(buf) => {
            buf.into_raw().into_iter().map(u16::from).collect()
        }
        other => other.to_luma16().into_raw(),
    };
    let samples = data.len();
    Array2::from_shape_vec((height, width), data).map_err(|_| ColocError::ShapeMismatch {
        left: vec![height, width],
        right: vec![samples],
    })
}

/// One fish/timepoint/position directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    pub id: AcquisitionId,
    /// The position directory.
    pub dir: PathBuf,
}

impl Acquisition {
    pub fn channel_dir(&self, config: &Config, channel: Channel) -> PathBuf {
        self.dir
            .join(&config.layout.stack_subdir)
            .join(&config.mask(channel).dir_name)
    }

    pub fn slices(&self, config: &Config, channel: Channel) -> Result<Vec<PathBuf>> {
        list_slices(
            &self.channel_dir(config, channel),
            &config.layout.slice_pattern,
        )
    }
}

/// Splits `Fish12_extra` into (`Fish12`, 12) when the prefix is `Fish`.
fn parse_token(name: &str, prefix: &str) -> Option<(String, u64)> {
    let rest = name.strip_prefix(prefix)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let number = digits.parse::<u64>().ok()?;
    Some((format!("{prefix}{digits}"), number))
}

/// Sub-directories of `dir` whose name carries `prefix` followed by a number.
fn tagged_dirs(dir: &Path, prefix: &str) -> Result<Vec<(String, u64, PathBuf)>> {
    let mut paths: Vec<PathBuf> = glob_paths(&format!("{}/*", escaped(dir)))?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();
    natural_sort(&mut paths);
    Ok(paths
        .into_iter()
        .filter_map(|p| {
            let name = p.file_name()?.to_str()?.to_string();
            let (token, number) = parse_token(&name, prefix)?;
            Some((token, number, p))
        })
        .collect())
}

/// Enumerates every acquisition to process.
///
/// `selected` limits the run to those subjects; an empty list means every
/// subject found. All subjects that would be processed must have an entry in
/// the subject table, which is checked before anything is returned.
pub fn discover_acquisitions(
    root: &Path,
    config: &Config,
    selected: &[String],
) -> Result<Vec<Acquisition>> {
    if !root.is_dir() {
        return Err(ColocError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "data root not found"),
        ));
    }
    let layout = &config.layout;
    let subjects: Vec<(String, u64, PathBuf)> = tagged_dirs(root, &layout.subject_prefix)?
        .into_iter()
        .filter(|(name, _, _)| selected.is_empty() || selected.contains(name))
        .collect();

    let names: Vec<&str> = subjects.iter().map(|(name, _, _)| name.as_str()).collect();
    config.check_subjects(&names)?;
    for wanted in selected {
        if !names.contains(&wanted.as_str()) {
            warn!("Subject {} was requested but not found in {}", wanted, root.display());
        }
    }

    let mut acquisitions = Vec::new();
    for (subject, _, subject_dir) in subjects {
        let entry = config.subject(&subject)?;
        let timepoints = tagged_dirs(&subject_dir, &layout.timepoint_prefix)?;
        for (timepoint, number, timepoint_dir) in timepoints {
            if let Some(limit) = entry.timepoints {
                if number as usize > limit {
                    debug!("Skipping {}/{}: {} has {} timepoints", subject, timepoint, subject, limit);
                    continue;
                }
            }
            let positions = tagged_dirs(&timepoint_dir, &layout.position_prefix)?;
            for (position, _, position_dir) in positions {
                acquisitions.push(Acquisition {
                    id: AcquisitionId::new(&subject, &timepoint, &position),
                    dir: position_dir,
                });
            }
        }
    }
    info!("Found {} acquisitions under {}", acquisitions.len(), root.display());
    Ok(acquisitions)
}
