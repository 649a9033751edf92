use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One product card as found in the markup. Every field is free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProductRecord {
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Price")]
    pub price_text: Option<String>,
    #[serde(rename = "Rating")]
    pub rating_text: Option<String>,
    #[serde(rename = "Colors")]
    pub colors_text: Option<String>,
    #[serde(rename = "Size")]
    pub size_text: Option<String>,
    #[serde(rename = "Gender")]
    pub gender_text: Option<String>,
    pub timestamp: String,
}

/// A fully typed row ready for the sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanProductRecord {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Price")]
    pub price_idr: f64,
    #[serde(rename = "Rating")]
    pub rating: f64,
    #[serde(rename = "Colors")]
    pub colors: i32,
    #[serde(rename = "Size")]
    pub size: Size,
    #[serde(rename = "Gender")]
    pub gender: Gender,
    pub timestamp: String,
}

pub const COLUMNS: [&str; 7] = ["Title", "Price", "Rating", "Colors", "Size", "Gender", "timestamp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Size {
    XS,
    S,
    M,
    L,
    XL,
    XXL,
}

impl Size {
    pub const ALL: [Size; 6] = [Size::XS, Size::S, Size::M, Size::L, Size::XL, Size::XXL];

    pub fn as_str(self) -> &'static str {
        match self {
            Size::XS => "XS",
            Size::S => "S",
            Size::M => "M",
            Size::L => "L",
            Size::XL => "XL",
            Size::XXL => "XXL",
        }
    }
}

impl FromStr for Size {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Size::ALL.into_iter().find(|v| v.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Men,
    Women,
    Unisex,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Men, Gender::Women, Gender::Unisex];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Men => "Men",
            Gender::Women => "Women",
            Gender::Unisex => "Unisex",
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::ALL.into_iter().find(|v| v.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
