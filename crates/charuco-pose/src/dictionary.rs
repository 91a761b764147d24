//! Marker dictionary selection.
//!
//! The bit patterns themselves belong to the marker detector; this module only
//! names the dictionary and carries its size so boards can be validated.

use serde::{Deserialize, Serialize};

/// Standard marker dictionaries, numbered as in the common ArUco catalog.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredefinedDictionary {
    #[serde(rename = "DICT_4X4_50")]
    Dict4x4_50,
    #[serde(rename = "DICT_4X4_100")]
    Dict4x4_100,
    #[serde(rename = "DICT_4X4_250")]
    Dict4x4_250,
    #[serde(rename = "DICT_4X4_1000")]
    Dict4x4_1000,
    #[serde(rename = "DICT_5X5_50")]
    Dict5x5_50,
    #[serde(rename = "DICT_5X5_100")]
    Dict5x5_100,
    #[serde(rename = "DICT_5X5_250")]
    Dict5x5_250,
    #[serde(rename = "DICT_5X5_1000")]
    Dict5x5_1000,
    #[serde(rename = "DICT_6X6_50")]
    Dict6x6_50,
    #[serde(rename = "DICT_6X6_100")]
    Dict6x6_100,
    #[serde(rename = "DICT_6X6_250")]
    Dict6x6_250,
    #[serde(rename = "DICT_6X6_1000")]
    Dict6x6_1000,
    #[serde(rename = "DICT_7X7_50")]
    Dict7x7_50,
    #[serde(rename = "DICT_7X7_100")]
    Dict7x7_100,
    #[serde(rename = "DICT_7X7_250")]
    Dict7x7_250,
    #[serde(rename = "DICT_7X7_1000")]
    Dict7x7_1000,
    #[serde(rename = "DICT_ARUCO_ORIGINAL")]
    ArucoOriginal,
    #[serde(rename = "DICT_APRILTAG_16h5")]
    AprilTag16h5,
    #[serde(rename = "DICT_APRILTAG_25h9")]
    AprilTag25h9,
    #[serde(rename = "DICT_APRILTAG_36h10")]
    AprilTag36h10,
    #[serde(rename = "DICT_APRILTAG_36h11")]
    AprilTag36h11,
}

impl PredefinedDictionary {
    pub const ALL: [PredefinedDictionary; 21] = [
        Self::Dict4x4_50,
        Self::Dict4x4_100,
        Self::Dict4x4_250,
        Self::Dict4x4_1000,
        Self::Dict5x5_50,
        Self::Dict5x5_100,
        Self::Dict5x5_250,
        Self::Dict5x5_1000,
        Self::Dict6x6_50,
        Self::Dict6x6_100,
        Self::Dict6x6_250,
        Self::Dict6x6_1000,
        Self::Dict7x7_50,
        Self::Dict7x7_100,
        Self::Dict7x7_250,
        Self::Dict7x7_1000,
        Self::ArucoOriginal,
        Self::AprilTag16h5,
        Self::AprilTag25h9,
        Self::AprilTag36h10,
        Self::AprilTag36h11,
    ];

    /// Catalog id of this dictionary.
    pub fn id(self) -> i32 {
        Self::ALL
            .iter()
            .position(|&d| d == self)
            .map_or(-1, |i| i as i32)
    }

    /// Look up a dictionary by catalog id.
    pub fn from_id(id: i32) -> Option<Self> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Inner bits per marker side.
    pub fn bits_per_side(self) -> u32 {
        match self {
            Self::Dict4x4_50 | Self::Dict4x4_100 | Self::Dict4x4_250 | Self::Dict4x4_1000 => 4,
            Self::AprilTag16h5 => 4,
            Self::Dict5x5_50 | Self::Dict5x5_100 | Self::Dict5x5_250 | Self::Dict5x5_1000 => 5,
            Self::ArucoOriginal | Self::AprilTag25h9 => 5,
            Self::Dict6x6_50 | Self::Dict6x6_100 | Self::Dict6x6_250 | Self::Dict6x6_1000 => 6,
            Self::AprilTag36h10 | Self::AprilTag36h11 => 6,
            Self::Dict7x7_50 | Self::Dict7x7_100 | Self::Dict7x7_250 | Self::Dict7x7_1000 => 7,
        }
    }

    /// Number of distinct markers in the dictionary.
    pub fn marker_count(self) -> u32 {
        match self {
            Self::Dict4x4_50 | Self::Dict5x5_50 | Self::Dict6x6_50 | Self::Dict7x7_50 => 50,
            Self::Dict4x4_100 | Self::Dict5x5_100 | Self::Dict6x6_100 | Self::Dict7x7_100 => 100,
            Self::Dict4x4_250 | Self::Dict5x5_250 | Self::Dict6x6_250 | Self::Dict7x7_250 => 250,
            Self::Dict4x4_1000 | Self::Dict5x5_1000 | Self::Dict6x6_1000 | Self::Dict7x7_1000 => {
                1000
            }
            Self::ArucoOriginal => 1024,
            Self::AprilTag16h5 => 30,
            Self::AprilTag25h9 => 35,
            Self::AprilTag36h10 => 2320,
            Self::AprilTag36h11 => 587,
        }
    }
}

/// Opaque handle to the symbol dictionary printed on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictionarySpec {
    /// Entry of the standard catalog.
    Predefined(PredefinedDictionary),
    /// Dictionary generated on demand with the given size and bit depth.
    Custom {
        marker_count: u32,
        bits_per_side: u32,
    },
}

impl DictionarySpec {
    /// Resolve a catalog id; ids `<= 0` select a generated dictionary.
    ///
    /// Returns `None` for positive ids outside the catalog.
    pub fn from_config(dictionary_id: i32, marker_count: u32, bits_per_side: u32) -> Option<Self> {
        if dictionary_id > 0 {
            PredefinedDictionary::from_id(dictionary_id).map(Self::Predefined)
        } else {
            Some(Self::Custom {
                marker_count,
                bits_per_side,
            })
        }
    }

    pub fn marker_count(&self) -> u32 {
        match *self {
            Self::Predefined(d) => d.marker_count(),
            Self::Custom { marker_count, .. } => marker_count,
        }
    }

    pub fn bits_per_side(&self) -> u32 {
        match *self {
            Self::Predefined(d) => d.bits_per_side(),
            Self::Custom { bits_per_side, .. } => bits_per_side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_round_trip() {
        for (i, d) in PredefinedDictionary::ALL.iter().enumerate() {
            assert_eq!(d.id(), i as i32);
            assert_eq!(PredefinedDictionary::from_id(i as i32), Some(*d));
        }
        assert_eq!(PredefinedDictionary::from_id(21), None);
        assert_eq!(PredefinedDictionary::from_id(-1), None);
    }

    #[test]
    fn default_board_dictionary_is_6x6_250() {
        let d = DictionarySpec::from_config(10, 70, 6).expect("known id");
        assert_eq!(
            d,
            DictionarySpec::Predefined(PredefinedDictionary::Dict6x6_250)
        );
        assert_eq!(d.bits_per_side(), 6);
        assert_eq!(d.marker_count(), 250);
    }

    #[test]
    fn non_positive_id_generates_custom_dictionary() {
        assert_eq!(
            DictionarySpec::from_config(0, 70, 6),
            Some(DictionarySpec::Custom {
                marker_count: 70,
                bits_per_side: 6
            })
        );
        assert_eq!(DictionarySpec::from_config(99, 70, 6), None);
    }
}
