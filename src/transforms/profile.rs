//! # Normalization Profiles
//!
//! Fixed per-domain (mean, std) statistics and their inverses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::TransformError;

// ImageNet RGB statistics
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const STANDARD_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
pub const STANDARD_STD: [f32; 3] = [0.5, 0.5, 0.5];

// Log-mel spectrogram statistics (single channel)
pub const VOX_MEL_MEAN: [f32; 1] = [10.9915];
pub const VOX_MEL_STD: [f32; 1] = [3.1661];

/// Supported normalization methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMethod {
    #[default]
    Imagenet,
    Standard,
    VoxMel,
}

impl NormalizeMethod {
    pub const ALL: [NormalizeMethod; 3] = [
        NormalizeMethod::Imagenet,
        NormalizeMethod::Standard,
        NormalizeMethod::VoxMel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NormalizeMethod::Imagenet => "imagenet",
            NormalizeMethod::Standard => "standard",
            NormalizeMethod::VoxMel => "vox_mel",
        }
    }

    pub fn profile(self) -> Profile {
        match self {
            NormalizeMethod::Imagenet => Profile {
                mean: &IMAGENET_MEAN,
                std: &IMAGENET_STD,
            },
            NormalizeMethod::Standard => Profile {
                mean: &STANDARD_MEAN,
                std: &STANDARD_STD,
            },
            NormalizeMethod::VoxMel => Profile {
                mean: &VOX_MEL_MEAN,
                std: &VOX_MEL_STD,
            },
        }
    }
}

impl fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizeMethod {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NormalizeMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| TransformError::UnknownMethod(s.to_string()))
    }
}

/// Per-channel statistics of one normalization method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile {
    pub mean: &'static [f32],
    pub std: &'static [f32],
}

/// Vectors that undo a [`Profile`]: `-mean` and `1 / std`.
#[derive(Debug, Clone, PartialEq)]
pub struct InverseProfile {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Profile {
    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    pub fn inverse(&self) -> InverseProfile {
        InverseProfile {
            mean: self.mean.iter().map(|m| -m).collect(),
            std: self.std.iter().map(|s| 1.0 / s).collect(),
        }
    }
}
