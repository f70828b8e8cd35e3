use std::fmt;

use serde::{Deserialize, Serialize};

/// One measured device after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub equipment_type: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

impl EquipmentRecord {
    pub fn new(
        name: impl Into<String>,
        equipment_type: impl Into<String>,
        flowrate: f64,
        pressure: f64,
        temperature: f64,
    ) -> Self {
        Self {
            name: name.into(),
            equipment_type: equipment_type.into(),
            flowrate,
            pressure,
            temperature,
        }
    }

    pub fn value(&self, field: NumericField) -> f64 {
        match field {
            NumericField::Flowrate => self.flowrate,
            NumericField::Pressure => self.pressure,
            NumericField::Temperature => self.temperature,
        }
    }
}

/// The measured quantities of an [`EquipmentRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    Flowrate,
    Pressure,
    Temperature,
}

impl NumericField {
    pub const ALL: [NumericField; 3] = [
        NumericField::Flowrate,
        NumericField::Pressure,
        NumericField::Temperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericField::Flowrate => "flowrate",
            NumericField::Pressure => "pressure",
            NumericField::Temperature => "temperature",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NumericField::Flowrate => "Flowrate",
            NumericField::Pressure => "Pressure",
            NumericField::Temperature => "Temperature",
        }
    }

    pub fn column(&self) -> Column {
        match self {
            NumericField::Flowrate => Column::Flowrate,
            NumericField::Pressure => Column::Pressure,
            NumericField::Temperature => Column::Temperature,
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for NumericField {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "flowrate" => Ok(NumericField::Flowrate),
            "pressure" => Ok(NumericField::Pressure),
            "temperature" => Ok(NumericField::Temperature),
            other => Err(format!("unknown numeric field '{other}'")),
        }
    }
}

/// A required column of an equipment upload, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Name,
    Type,
    Flowrate,
    Pressure,
    Temperature,
}

impl Column {
    pub const REQUIRED: [Column; 5] = [
        Column::Name,
        Column::Type,
        Column::Flowrate,
        Column::Pressure,
        Column::Temperature,
    ];

    /// Header text as it appears in uploaded files.
    pub fn display_name(&self) -> &'static str {
        match self {
            Column::Name => "Equipment Name",
            Column::Type => "Type",
            Column::Flowrate => "Flowrate",
            Column::Pressure => "Pressure",
            Column::Temperature => "Temperature",
        }
    }

    /// Field name of the column on [`EquipmentRecord`].
    pub fn field_name(&self) -> &'static str {
        match self {
            Column::Name => "name",
            Column::Type => "type",
            Column::Flowrate => "flowrate",
            Column::Pressure => "pressure",
            Column::Temperature => "temperature",
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_field().is_some()
    }

    pub fn numeric_field(&self) -> Option<NumericField> {
        match self {
            Column::Flowrate => Some(NumericField::Flowrate),
            Column::Pressure => Some(NumericField::Pressure),
            Column::Temperature => Some(NumericField::Temperature),
            Column::Name | Column::Type => None,
        }
    }

    /// Whether an uploaded header names this column, ignoring case and
    /// surrounding whitespace.
    pub fn matches_header(&self, header: &str) -> bool {
        header.trim().eq_ignore_ascii_case(self.display_name())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
