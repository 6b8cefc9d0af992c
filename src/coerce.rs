use std::fmt;

use serde::Serialize;

use crate::grading::{Grade, grade_measurement};
use crate::model::{Measurement, MeasurementField, PartialMeasurement};

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Missing,
    Text(String),
    Number(f64),
    Unsupported(String),
}

impl RawValue {
    pub fn from_form(value: Option<&str>) -> Self {
        match value {
            Some(text) => Self::Text(text.to_string()),
            None => Self::Missing,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum IssueReason {
    Missing,
    NotNumeric(String),
    NotFinite,
    Negative(f64),
    Unsupported(String),
}

impl fmt::Display for IssueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("value is missing"),
            Self::NotNumeric(text) => write!(f, "{text:?} is not a number"),
            Self::NotFinite => f.write_str("value is not finite"),
            Self::Negative(value) => write!(f, "{value} is negative"),
            Self::Unsupported(kind) => write!(f, "{kind} cell cannot hold a measurement"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: MeasurementField,
    pub reason: IssueReason,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field.column_name(), self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionFailure {
    pub issues: Vec<FieldIssue>,
    pub partial: PartialMeasurement,
}

impl CoercionFailure {
    pub fn describe(&self) -> String {
        self.issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Coercion {
    Success(Measurement),
    Failure(CoercionFailure),
}

impl Coercion {
    pub fn grade(&self) -> Grade {
        match self {
            Self::Success(measurement) => grade_measurement(measurement),
            Self::Failure(_) => Grade::Incomplete,
        }
    }

    pub fn partial(&self) -> PartialMeasurement {
        match self {
            Self::Success(measurement) => PartialMeasurement::from(*measurement),
            Self::Failure(failure) => failure.partial,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub polish: RawValue,
    pub moisture: RawValue,
    pub broken: RawValue,
    pub chalky: RawValue,
}

impl RawRecord {
    fn get(&self, field: MeasurementField) -> &RawValue {
        match field {
            MeasurementField::PolishDegree => &self.polish,
            MeasurementField::MoistureContent => &self.moisture,
            MeasurementField::BrokenGrain => &self.broken,
            MeasurementField::ChalkyGrain => &self.chalky,
        }
    }
}

pub fn coerce(record: &RawRecord) -> Coercion {
    let mut partial = PartialMeasurement::default();
    let mut issues = Vec::new();

    for field in MeasurementField::ALL {
        match coerce_value(record.get(field)) {
            Ok(value) => partial.set(field, value),
            Err(reason) => issues.push(FieldIssue { field, reason }),
        }
    }

    match partial.complete() {
        Some(measurement) if issues.is_empty() => Coercion::Success(measurement),
        _ => Coercion::Failure(CoercionFailure { issues, partial }),
    }
}

pub fn classify(record: &RawRecord) -> (Coercion, Grade) {
    let coercion = coerce(record);
    let grade = coercion.grade();
    (coercion, grade)
}

pub fn coerce_value(raw: &RawValue) -> Result<f64, IssueReason> {
    let value = match raw {
        RawValue::Missing => return Err(IssueReason::Missing),
        RawValue::Unsupported(kind) => return Err(IssueReason::Unsupported(kind.clone())),
        RawValue::Number(value) => *value,
        RawValue::Text(text) => parse_decimal(text)?,
    };

    if !value.is_finite() {
        return Err(IssueReason::NotFinite);
    }
    if value < 0.0 {
        return Err(IssueReason::Negative(value));
    }
    // Normalizes -0.0.
    Ok(value + 0.0)
}

fn parse_decimal(text: &str) -> Result<f64, IssueReason> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(IssueReason::Missing);
    }

    let normalized = normalize_decimal_comma(trimmed);
    normalized
        .parse::<f64>()
        .map_err(|_| IssueReason::NotNumeric(trimmed.to_string()))
}

pub fn normalize_decimal_comma(text: &str) -> String {
    if text.contains('.') || text.matches(',').count() != 1 {
        return text.to_string();
    }
    text.replacen(',', ".", 1)
}
