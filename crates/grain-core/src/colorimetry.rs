//! Named colorimetry tags.
//!
//! Frames carry a colorimetry tag rather than raw coefficients. The numeric
//! meaning of each tag (primaries, transfer curve, Y'CbCr weights) lives in
//! `grain-color`; this module only names them and parses the flow tags.
//!
//! BT.601 is split by line structure because the 625-line (EBU) and 525-line
//! (SMPTE C) systems use different primaries. [`Colorimetry::from_tag`] picks
//! the variant from the frame height the same way broadcast equipment does.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Colorimetry of a video flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Colorimetry {
    /// ITU-R BT.601, 625-line (EBU primaries).
    #[serde(rename = "BT601-625")]
    Bt601_625,
    /// ITU-R BT.601, 525-line (SMPTE C primaries).
    #[serde(rename = "BT601-525")]
    Bt601_525,
    /// ITU-R BT.709 (HDTV). Also the working space of the pipeline.
    #[default]
    #[serde(rename = "BT709")]
    Bt709,
    /// ITU-R BT.2020 (UHDTV, SDR transfer).
    #[serde(rename = "BT2020")]
    Bt2020,
    /// ITU-R BT.2100 with the HLG transfer.
    #[serde(rename = "BT2100-HLG")]
    Bt2100Hlg,
    /// IEC 61966-2-1 sRGB, used for computer-graphics RGBA sources.
    #[serde(rename = "sRGB")]
    Srgb,
}

impl Colorimetry {
    /// All supported tags.
    pub const ALL: [Colorimetry; 6] = [
        Self::Bt601_625,
        Self::Bt601_525,
        Self::Bt709,
        Self::Bt2020,
        Self::Bt2100Hlg,
        Self::Srgb,
    ];

    /// Parse a flow colorimetry tag, resolving BT.601 by frame height.
    ///
    /// Accepts `BT601`, `BT709`, `BT2020`, `BT2100` (HLG) and `sRGB`,
    /// case-insensitively.
    pub fn from_tag(tag: &str, height: u32) -> Result<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "BT601" => Ok(if height == 576 || height == 288 {
                Self::Bt601_625
            } else {
                Self::Bt601_525
            }),
            "BT601-625" => Ok(Self::Bt601_625),
            "BT601-525" => Ok(Self::Bt601_525),
            "BT709" => Ok(Self::Bt709),
            "BT2020" => Ok(Self::Bt2020),
            "BT2100" | "BT2100-HLG" => Ok(Self::Bt2100Hlg),
            "SRGB" => Ok(Self::Srgb),
            _ => Err(Error::UnsupportedFormat(format!("colorimetry '{tag}'"))),
        }
    }

    /// Short display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bt601_625 => "BT601-625",
            Self::Bt601_525 => "BT601-525",
            Self::Bt709 => "BT709",
            Self::Bt2020 => "BT2020",
            Self::Bt2100Hlg => "BT2100-HLG",
            Self::Srgb => "sRGB",
        }
    }
}

impl std::fmt::Display for Colorimetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_601_by_height() {
        assert_eq!(Colorimetry::from_tag("BT601", 576).unwrap(), Colorimetry::Bt601_625);
        assert_eq!(Colorimetry::from_tag("bt601", 486).unwrap(), Colorimetry::Bt601_525);
    }

    #[test]
    fn test_from_tag_names_roundtrip() {
        for c in Colorimetry::ALL {
            assert_eq!(Colorimetry::from_tag(c.name(), 1080).unwrap(), c);
        }
    }

    #[test]
    fn test_unknown_tag() {
        let err = Colorimetry::from_tag("XYZ", 1080).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
