//! Function module metadata as reported by the RFC library.

use serde::Serialize;
use std::fmt;

/// Parameter direction, ordered the way metadata listings sort them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Importing,
    Exporting,
    Changing,
    Tables,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Importing => "IMPORTING",
            Direction::Exporting => "EXPORTING",
            Direction::Changing => "CHANGING",
            Direction::Tables => "TABLES",
        }
    }

    /// Parameters the function hands back to the caller.
    #[cfg_attr(not(feature = "nwrfc"), allow(dead_code))]
    pub fn is_output(&self) -> bool {
        !matches!(self, Direction::Importing)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ABAP data types exposed over RFC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RfcType {
    Char,
    Date,
    Bcd,
    Time,
    Byte,
    Table,
    Num,
    Float,
    Int,
    Int2,
    Int1,
    Null,
    AbapObject,
    Structure,
    DecF16,
    DecF34,
    XmlData,
    String,
    XString,
    Int8,
    UtcLong,
    UtcSecond,
    UtcMinute,
    DtDay,
    DtWeek,
    DtMonth,
    TSecond,
    TMinute,
    CDay,
    Unknown(i32),
}

impl RfcType {
    /// Map the SDK's numeric `RFCTYPE` code.
    #[cfg_attr(not(feature = "nwrfc"), allow(dead_code))]
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => RfcType::Char,
            1 => RfcType::Date,
            2 => RfcType::Bcd,
            3 => RfcType::Time,
            4 => RfcType::Byte,
            5 => RfcType::Table,
            6 => RfcType::Num,
            7 => RfcType::Float,
            8 => RfcType::Int,
            9 => RfcType::Int2,
            10 => RfcType::Int1,
            14 => RfcType::Null,
            16 => RfcType::AbapObject,
            17 => RfcType::Structure,
            23 => RfcType::DecF16,
            24 => RfcType::DecF34,
            28 => RfcType::XmlData,
            29 => RfcType::String,
            30 => RfcType::XString,
            31 => RfcType::Int8,
            32 => RfcType::UtcLong,
            33 => RfcType::UtcSecond,
            34 => RfcType::UtcMinute,
            35 => RfcType::DtDay,
            36 => RfcType::DtWeek,
            37 => RfcType::DtMonth,
            38 => RfcType::TSecond,
            39 => RfcType::TMinute,
            40 => RfcType::CDay,
            other => RfcType::Unknown(other),
        }
    }

    pub fn name(&self) -> String {
        let s = match self {
            RfcType::Char => "RFCTYPE_CHAR",
            RfcType::Date => "RFCTYPE_DATE",
            RfcType::Bcd => "RFCTYPE_BCD",
            RfcType::Time => "RFCTYPE_TIME",
            RfcType::Byte => "RFCTYPE_BYTE",
            RfcType::Table => "RFCTYPE_TABLE",
            RfcType::Num => "RFCTYPE_NUM",
            RfcType::Float => "RFCTYPE_FLOAT",
            RfcType::Int => "RFCTYPE_INT",
            RfcType::Int2 => "RFCTYPE_INT2",
            RfcType::Int1 => "RFCTYPE_INT1",
            RfcType::Null => "RFCTYPE_NULL",
            RfcType::AbapObject => "RFCTYPE_ABAPOBJECT",
            RfcType::Structure => "RFCTYPE_STRUCTURE",
            RfcType::DecF16 => "RFCTYPE_DECF16",
            RfcType::DecF34 => "RFCTYPE_DECF34",
            RfcType::XmlData => "RFCTYPE_XMLDATA",
            RfcType::String => "RFCTYPE_STRING",
            RfcType::XString => "RFCTYPE_XSTRING",
            RfcType::Int8 => "RFCTYPE_INT8",
            RfcType::UtcLong => "RFCTYPE_UTCLONG",
            RfcType::UtcSecond => "RFCTYPE_UTCSECOND",
            RfcType::UtcMinute => "RFCTYPE_UTCMINUTE",
            RfcType::DtDay => "RFCTYPE_DTDAY",
            RfcType::DtWeek => "RFCTYPE_DTWEEK",
            RfcType::DtMonth => "RFCTYPE_DTMONTH",
            RfcType::TSecond => "RFCTYPE_TSECOND",
            RfcType::TMinute => "RFCTYPE_TMINUTE",
            RfcType::CDay => "RFCTYPE_CDAY",
            RfcType::Unknown(code) => return format!("RFCTYPE_{code}"),
        };
        s.to_string()
    }

    /// Fixed-length character-like types whose values come back blank-padded.
    #[cfg_attr(not(feature = "nwrfc"), allow(dead_code))]
    pub fn is_padded_text(&self) -> bool {
        matches!(self, RfcType::Char | RfcType::Num)
    }
}

impl fmt::Display for RfcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Serialize for RfcType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescription {
    pub name: String,
    pub field_type: RfcType,
    pub nuc_length: u32,
    pub nuc_offset: u32,
    pub uc_length: u32,
    pub uc_offset: u32,
    pub decimals: u32,
    /// Name of a nested structure/table line type, if any.
    pub type_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDescription {
    pub name: String,
    pub nuc_length: u32,
    pub uc_length: u32,
    pub fields: Vec<FieldDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDescription {
    pub name: String,
    pub parameter_type: RfcType,
    pub direction: Direction,
    pub nuc_length: u32,
    pub uc_length: u32,
    pub decimals: u32,
    pub default_value: String,
    pub optional: bool,
    pub type_description: Option<TypeDescription>,
    pub parameter_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDescription {
    pub name: String,
    pub parameters: Vec<ParameterDescription>,
}

impl FunctionDescription {
    /// Parameters sorted by direction, then name.
    pub fn sorted_parameters(&self) -> Vec<&ParameterDescription> {
        let mut params: Vec<&ParameterDescription> = self.parameters.iter().collect();
        params.sort_by(|a, b| (a.direction, &a.name).cmp(&(b.direction, &b.name)));
        params
    }
}

/// Subset of the partner attributes reported after logon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionAttributes {
    pub sys_id: String,
    pub host: String,
    pub partner_host: String,
    pub sys_number: String,
    pub client: String,
    pub user: String,
    pub language: String,
    pub partner_release: String,
    pub kernel_release: String,
}
