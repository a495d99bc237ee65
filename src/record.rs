use serde::{Deserialize, Serialize};

// Well-known column positions of the 27-column configuration schema.
pub const COL_FIELD_CODE: usize = 0;
pub const COL_FIELD_TYPE: usize = 1;
pub const COL_DATA_KEY: usize = 2;
pub const COL_LABEL: usize = 3;
pub const COL_LIST_TYPE: usize = 8;
pub const COL_LIST_VALUE: usize = 9;
pub const COL_CUSTOMIZATION: usize = 26;

/// Number of verbatim header lines preceding the data records on disk.
pub const HEADER_ROW_COUNT: usize = 4;

/// Header line (0-indexed) carrying the column names / display labels.
pub const LABEL_HEADER_ROW: usize = 3;

pub const MARK_NEW: &str = "NEW";
pub const MARK_CHANGE: &str = "CHANGE";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Record {
    pub id: String,
    pub values: Vec<String>,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum FieldType {
    Tag,
    Nam,
    Qty,
    Cat,
    Gen,
    Img,
    Rem,
    Tim,
}

impl FieldType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "TAG" => Some(FieldType::Tag),
            "NAM" => Some(FieldType::Nam),
            "QTY" => Some(FieldType::Qty),
            "CAT" => Some(FieldType::Cat),
            "GEN" => Some(FieldType::Gen),
            "IMG" => Some(FieldType::Img),
            "REM" => Some(FieldType::Rem),
            "TIM" => Some(FieldType::Tim),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Tag => "TAG",
            FieldType::Nam => "NAM",
            FieldType::Qty => "QTY",
            FieldType::Cat => "CAT",
            FieldType::Gen => "GEN",
            FieldType::Img => "IMG",
            FieldType::Rem => "REM",
            FieldType::Tim => "TIM",
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, FieldType::Cat)
    }
}

/// List semantics of a CAT field, re-derivable from columns 8/9 at any time.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ListTypeState {
    pub list_type: String,
    pub values: Vec<String>,
}

impl Record {
    pub fn new(id: impl Into<String>, values: Vec<String>) -> Self {
        Record {
            id: id.into(),
            values,
        }
    }

    /// Column 0, the stable `fieldCode###` identifier (may be empty for
    /// marker rows).
    pub fn field_code(&self) -> &str {
        self.get(COL_FIELD_CODE)
    }

    pub fn field_type(&self) -> &str {
        self.get(COL_FIELD_TYPE)
    }

    pub fn data_key(&self) -> &str {
        self.get(COL_DATA_KEY)
    }

    pub fn label(&self) -> &str {
        self.get(COL_LABEL)
    }

    pub fn customization(&self) -> &str {
        self.get(COL_CUSTOMIZATION)
    }

    /// Positional read that treats a short record as padded with empties.
    pub fn get(&self, col: usize) -> &str {
        self.values.get(col).map(String::as_str).unwrap_or("")
    }

    /// Positional write, growing the record with empty fields as needed.
    pub fn set(&mut self, col: usize, value: impl Into<String>) {
        if self.values.len() <= col {
            self.values.resize(col + 1, String::new());
        }
        self.values[col] = value.into();
    }

    pub fn pad_to(&mut self, width: usize) {
        if self.values.len() < width {
            self.values.resize(width, String::new());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|v| v.trim().is_empty())
    }
}
