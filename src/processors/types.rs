//! Small enums shared by the image processing helpers.

use serde::{Deserialize, Serialize};

/// Specifies how to limit the size of an image during resizing operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LimitType {
    /// Scale up until the shorter side reaches the limit
    Min,
    /// Scale down until the longer side fits the limit
    #[default]
    Max,
}

/// Specifies the color channel order in an image tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorOrder {
    /// Red, Green, Blue order (the layout of `image::RgbImage`)
    RGB,
    /// Blue, Green, Red order (used by OpenCV and PaddlePaddle models)
    #[default]
    BGR,
}
