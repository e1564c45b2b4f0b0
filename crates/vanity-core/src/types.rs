use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("opacity must be in [0, 1], got {0}")]
    OpacityOutOfRange(f32),
    #[error("malformed hex color: {0:?} (expected #RRGGBB)")]
    BadHexColor(String),
}

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#RRGGBB` color as pushed by the configuration UI.
    /// The leading `#` is optional.
    pub fn from_hex(hex: &str) -> Result<Self, OptionsError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(OptionsError::BadHexColor(hex.to_string()));
        }
        let parse = |s: &str| u8::from_str_radix(s, 16).expect("checked hex digits");
        Ok(Self {
            r: parse(&digits[0..2]),
            g: parse(&digits[2..4]),
            b: parse(&digits[4..6]),
        })
    }
}

/// Color and opacity for one makeup zone.
///
/// Opacity is validated at construction; everything downstream may
/// assume it lies in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawZoneStyle")]
pub struct ZoneStyle {
    color: Rgb,
    opacity: f32,
}

/// Wire shape for [`ZoneStyle`], funneling deserialization through validation.
#[derive(Deserialize)]
struct RawZoneStyle {
    color: Rgb,
    opacity: f32,
}

impl TryFrom<RawZoneStyle> for ZoneStyle {
    type Error = OptionsError;

    fn try_from(raw: RawZoneStyle) -> Result<Self, OptionsError> {
        ZoneStyle::new(raw.color, raw.opacity)
    }
}

impl ZoneStyle {
    pub fn new(color: Rgb, opacity: f32) -> Result<Self, OptionsError> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(OptionsError::OpacityOutOfRange(opacity));
        }
        Ok(Self { color, opacity })
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }
}

/// The whole makeup configuration, replaced atomically by the caller.
/// The pipeline reads one consistent snapshot per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MakeupOptions {
    pub lipstick: Option<ZoneStyle>,
    pub eyeshadow: Option<ZoneStyle>,
}

impl MakeupOptions {
    /// Style configured for a zone, if any.
    pub fn style_for(&self, zone: Zone) -> Option<&ZoneStyle> {
        match zone {
            Zone::Lips => self.lipstick.as_ref(),
            Zone::LeftEyelid | Zone::RightEyelid => self.eyeshadow.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lipstick.is_none() && self.eyeshadow.is_none()
    }
}

/// A 2D point in frame-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Named anatomical landmark group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupId {
    LipsUpperOuter,
    LipsLowerOuter,
    LeftEyeUpper,
    RightEyeUpper,
}

/// Landmarks for one detected face: named group → ordered contour points.
///
/// Transient, consumed within a single tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandmarkSet {
    groups: HashMap<GroupId, Vec<Point>>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: GroupId, points: Vec<Point>) {
        self.groups.insert(group, points);
    }

    pub fn get(&self, group: GroupId) -> Option<&[Point]> {
        self.groups.get(&group).map(Vec::as_slice)
    }
}

/// A makeup zone the region builder knows how to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Lips,
    LeftEyelid,
    RightEyelid,
}

/// A closed polygon (last point implicitly connects to the first) tagged
/// with the style to paint it in. Built per face per zone per tick.
#[derive(Debug, Clone)]
pub struct Region {
    pub points: Vec<Point>,
    pub style: ZoneStyle,
}

/// The compositor's result: the input pixels when no regions were painted
/// (borrowed, no copy), or a freshly blended buffer otherwise.
pub struct OutputSurface<'a> {
    pub data: Cow<'a, [u8]>,
    pub width: u32,
    pub height: u32,
}

impl OutputSurface<'_> {
    /// True when the surface is an untouched view of the input frame.
    pub fn is_passthrough(&self) -> bool {
        matches!(self.data, Cow::Borrowed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex_with_hash() {
        let c = Rgb::from_hex("#FF1493").unwrap();
        assert_eq!(c, Rgb::new(255, 20, 147));
    }

    #[test]
    fn test_from_hex_without_hash() {
        assert_eq!(Rgb::from_hex("00ff00").unwrap(), Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_from_hex_rejects_short() {
        assert!(Rgb::from_hex("#fff").is_err());
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(Rgb::from_hex("#zzzzzz").is_err());
    }

    #[test]
    fn test_zone_style_accepts_unit_range() {
        assert!(ZoneStyle::new(Rgb::new(1, 2, 3), 0.0).is_ok());
        assert!(ZoneStyle::new(Rgb::new(1, 2, 3), 1.0).is_ok());
        assert!(ZoneStyle::new(Rgb::new(1, 2, 3), 0.7).is_ok());
    }

    #[test]
    fn test_zone_style_rejects_out_of_range() {
        assert!(matches!(
            ZoneStyle::new(Rgb::new(0, 0, 0), 1.5),
            Err(OptionsError::OpacityOutOfRange(_))
        ));
        assert!(ZoneStyle::new(Rgb::new(0, 0, 0), -0.1).is_err());
        assert!(ZoneStyle::new(Rgb::new(0, 0, 0), f32::NAN).is_err());
    }

    #[test]
    fn test_zone_style_deserialize_validates() {
        let ok: Result<ZoneStyle, _> =
            serde_json::from_str(r#"{"color":{"r":255,"g":20,"b":147},"opacity":0.7}"#);
        assert!(ok.is_ok());

        let bad: Result<ZoneStyle, _> =
            serde_json::from_str(r#"{"color":{"r":255,"g":20,"b":147},"opacity":1.7}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_options_style_for_zone() {
        let style = ZoneStyle::new(Rgb::new(255, 20, 147), 0.7).unwrap();
        let options = MakeupOptions {
            lipstick: Some(style),
            eyeshadow: None,
        };
        assert_eq!(options.style_for(Zone::Lips), Some(&style));
        assert_eq!(options.style_for(Zone::LeftEyelid), None);
        assert_eq!(options.style_for(Zone::RightEyelid), None);
    }

    #[test]
    fn test_group_id_serde_names() {
        let name = serde_json::to_string(&GroupId::LipsUpperOuter).unwrap();
        assert_eq!(name, "\"lips-upper-outer\"");
    }

    #[test]
    fn test_landmark_set_missing_group() {
        let set = LandmarkSet::new();
        assert!(set.get(GroupId::LipsUpperOuter).is_none());
    }
}
