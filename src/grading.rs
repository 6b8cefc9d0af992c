use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Measurement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "Premium")]
    Premium,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Submedium")]
    Submedium,
    #[serde(rename = "Pecah")]
    Broken,
    #[serde(rename = "Data Tidak Lengkap")]
    Incomplete,
}

impl Grade {
    pub const ALL: [Grade; 5] = [
        Self::Premium,
        Self::Medium,
        Self::Submedium,
        Self::Broken,
        Self::Incomplete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Premium => "Premium",
            Self::Medium => "Medium",
            Self::Submedium => "Submedium",
            Self::Broken => "Pecah",
            Self::Incomplete => "Data Tidak Lengkap",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown grade label: {0:?}")]
pub struct UnknownGrade(pub String);

impl FromStr for Grade {
    type Err = UnknownGrade;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|grade| grade.as_str() == value)
            .ok_or_else(|| UnknownGrade(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
struct GradeRule {
    min_polish: f64,
    max_moisture: f64,
    max_chalky: f64,
    max_broken: f64,
    grade: Grade,
}

impl GradeRule {
    fn matches(&self, polish: f64, moisture: f64, broken: f64, chalky: f64) -> bool {
        polish >= self.min_polish
            && moisture <= self.max_moisture
            && chalky <= self.max_chalky
            && broken <= self.max_broken
    }
}

const GRADE_RULES: [GradeRule; 3] = [
    GradeRule {
        min_polish: 95.0,
        max_moisture: 14.0,
        max_chalky: 0.5,
        max_broken: 15.0,
        grade: Grade::Premium,
    },
    GradeRule {
        min_polish: 95.0,
        max_moisture: 14.0,
        max_chalky: 2.0,
        max_broken: 25.0,
        grade: Grade::Medium,
    },
    GradeRule {
        min_polish: 95.0,
        max_moisture: 14.0,
        max_chalky: 4.0,
        max_broken: 40.0,
        grade: Grade::Submedium,
    },
];

const FALLBACK_GRADE: Grade = Grade::Broken;

pub fn grade(polish: f64, moisture: f64, broken: f64, chalky: f64) -> Grade {
    GRADE_RULES
        .iter()
        .find(|rule| rule.matches(polish, moisture, broken, chalky))
        .map(|rule| rule.grade)
        .unwrap_or(FALLBACK_GRADE)
}

pub fn grade_measurement(measurement: &Measurement) -> Grade {
    grade(
        measurement.polish_degree,
        measurement.moisture_content,
        measurement.broken_grain_pct,
        measurement.chalky_grain_pct,
    )
}
