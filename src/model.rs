use serde::{Deserialize, Serialize};

use crate::grading::Grade;

pub const SOURCE_MANUAL: &str = "Manual";

pub fn file_source(filename: &str) -> String {
    format!("File: {filename}")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub polish_degree: f64,
    pub moisture_content: f64,
    pub broken_grain_pct: f64,
    pub chalky_grain_pct: f64,
}

impl Measurement {
    pub fn value(&self, field: MeasurementField) -> f64 {
        match field {
            MeasurementField::PolishDegree => self.polish_degree,
            MeasurementField::MoistureContent => self.moisture_content,
            MeasurementField::BrokenGrain => self.broken_grain_pct,
            MeasurementField::ChalkyGrain => self.chalky_grain_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementField {
    PolishDegree,
    MoistureContent,
    BrokenGrain,
    ChalkyGrain,
}

impl MeasurementField {
    pub const ALL: [MeasurementField; 4] = [
        Self::PolishDegree,
        Self::MoistureContent,
        Self::BrokenGrain,
        Self::ChalkyGrain,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Self::PolishDegree => "Derajat Sosoh",
            Self::MoistureContent => "Kadar Air",
            Self::BrokenGrain => "Butir Patah",
            Self::ChalkyGrain => "Butir Menir",
        }
    }

    pub fn form_name(self) -> &'static str {
        match self {
            Self::PolishDegree => "Derajat_Sosoh",
            Self::MoistureContent => "Kadar_Air",
            Self::BrokenGrain => "Butir_Patah",
            Self::ChalkyGrain => "Butir_Menir",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialMeasurement {
    pub polish_degree: Option<f64>,
    pub moisture_content: Option<f64>,
    pub broken_grain_pct: Option<f64>,
    pub chalky_grain_pct: Option<f64>,
}

impl PartialMeasurement {
    pub fn get(&self, field: MeasurementField) -> Option<f64> {
        match field {
            MeasurementField::PolishDegree => self.polish_degree,
            MeasurementField::MoistureContent => self.moisture_content,
            MeasurementField::BrokenGrain => self.broken_grain_pct,
            MeasurementField::ChalkyGrain => self.chalky_grain_pct,
        }
    }

    pub fn set(&mut self, field: MeasurementField, value: f64) {
        let slot = match field {
            MeasurementField::PolishDegree => &mut self.polish_degree,
            MeasurementField::MoistureContent => &mut self.moisture_content,
            MeasurementField::BrokenGrain => &mut self.broken_grain_pct,
            MeasurementField::ChalkyGrain => &mut self.chalky_grain_pct,
        };
        *slot = Some(value);
    }

    pub fn complete(&self) -> Option<Measurement> {
        Some(Measurement {
            polish_degree: self.polish_degree?,
            moisture_content: self.moisture_content?,
            broken_grain_pct: self.broken_grain_pct?,
            chalky_grain_pct: self.chalky_grain_pct?,
        })
    }
}

impl From<Measurement> for PartialMeasurement {
    fn from(value: Measurement) -> Self {
        Self {
            polish_degree: Some(value.polish_degree),
            moisture_content: Some(value.moisture_content),
            broken_grain_pct: Some(value.broken_grain_pct),
            chalky_grain_pct: Some(value.chalky_grain_pct),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewHistoryRecord {
    pub source: String,
    pub measurement: PartialMeasurement,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub timestamp: String,
    pub source: String,
    pub polish_degree: Option<f64>,
    pub moisture_content: Option<f64>,
    pub broken_grain_pct: Option<f64>,
    pub chalky_grain_pct: Option<f64>,
    pub grade: Grade,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadPaths {
    pub source_path: String,
    pub db_path: String,
    pub report_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadCounts {
    pub rows_total: usize,
    pub premium: usize,
    pub medium: usize,
    pub submedium: usize,
    pub broken: usize,
    pub incomplete: usize,
    pub history_appended: usize,
}

impl UploadCounts {
    pub fn tally(&mut self, grade: Grade) {
        self.rows_total += 1;
        match grade {
            Grade::Premium => self.premium += 1,
            Grade::Medium => self.medium += 1,
            Grade::Submedium => self.submedium += 1,
            Grade::Broken => self.broken += 1,
            Grade::Incomplete => self.incomplete += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub source_name: String,
    pub source_sha256: String,
    pub paths: UploadPaths,
    pub counts: UploadCounts,
    pub warnings: Vec<String>,
}
