//! Calendar segmentation of an hourly index into (weighted) month groups.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SegmentType {
    /// One segment covering the whole index.
    Single,
    OneMonth,
    ThreeMonth,
    /// Centre month weighted 1.0, neighbouring months 0.5.
    ThreeMonthWeighted,
}

/// Per-segment row weights over a fixed index.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub segment_type: SegmentType,
    pub segment_names: Vec<String>,
    /// `weights[segment][row]`
    pub weights: Vec<Vec<f64>>,
}

impl Segmentation {
    pub fn len(&self) -> usize {
        self.segment_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segment_names.is_empty()
    }

    /// Rows of segment `segment` with a positive weight, as `(row, weight)`.
    pub fn rows(&self, segment: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.weights[segment]
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .map(|(i, w)| (i, *w))
    }
}

/// Name of the segment of `segment_type` centred on `month` (1-12).
pub fn segment_name(segment_type: SegmentType, month: u32) -> String {
    let m = (month as usize + 11) % 12;
    let prev = MONTHS[(m + 11) % 12];
    let next = MONTHS[(m + 1) % 12];
    match segment_type {
        SegmentType::Single => "all".to_string(),
        SegmentType::OneMonth => MONTHS[m].to_string(),
        SegmentType::ThreeMonth => format!("{}-{}-{}", prev, MONTHS[m], next),
        SegmentType::ThreeMonthWeighted => format!("{}-{}-{}-weighted", prev, MONTHS[m], next),
    }
}

/// Builds segment weights for every timestamp of `index`.
pub fn segment_time_series(index: &[DateTime<Utc>], segment_type: SegmentType) -> Segmentation {
    if segment_type == SegmentType::Single {
        return Segmentation {
            segment_type,
            segment_names: vec![segment_name(segment_type, 1)],
            weights: vec![vec![1.0; index.len()]],
        };
    }

    let months: Vec<u32> = index.iter().map(|ts| ts.month()).collect();
    let (segment_names, weights): (Vec<String>, Vec<Vec<f64>>) = (1..=12)
        .map(|centre| {
            let weights: Vec<f64> = months
                .iter()
                .map(|&m| month_weight(segment_type, centre, m))
                .collect();
            (segment_name(segment_type, centre), weights)
        })
        .unzip();

    Segmentation {
        segment_type,
        segment_names,
        weights,
    }
}

fn month_weight(segment_type: SegmentType, centre: u32, month: u32) -> f64 {
    let distance = (month as i32 - centre as i32).rem_euclid(12);
    let adjacent = distance == 1 || distance == 11;
    match segment_type {
        SegmentType::Single => 1.0,
        SegmentType::OneMonth => (distance == 0) as u8 as f64,
        SegmentType::ThreeMonth => (distance == 0 || adjacent) as u8 as f64,
        SegmentType::ThreeMonthWeighted if distance == 0 => 1.0,
        SegmentType::ThreeMonthWeighted if adjacent => 0.5,
        SegmentType::ThreeMonthWeighted => 0.0,
    }
}
