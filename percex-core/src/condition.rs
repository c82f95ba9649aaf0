use serde::{Deserialize, Serialize};

/// Visual encoding a condition presents its bars with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// White bars with black outlines
    Bw,
    /// Each bar a different color, order shuffled per trial
    Multicolor,
    /// Fill color mapped from value, with a legend
    Gradient,
}

/// One experimental condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub hypothesis: String,
    pub encoding: Encoding,
}

impl Condition {
    pub fn new(id: &str, label: &str, hypothesis: &str, encoding: Encoding) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            hypothesis: hypothesis.to_string(),
            encoding,
        }
    }

    /// The three encodings of the replication, in presentation-table order
    pub fn standard_set() -> Vec<Condition> {
        vec![
            Condition::new(
                "bw",
                "Bar Chart (B&W)",
                "Position along a common scale gives the lowest error (baseline)",
                Encoding::Bw,
            ),
            Condition::new(
                "multicolor",
                "Bar Chart (Multi-Color)",
                "Color coding aids identification but may inflate error vs B&W",
                Encoding::Multicolor,
            ),
            Condition::new(
                "gradient",
                "Bar Chart (Gradient)",
                "Gradient fill may hinder accurate length estimation vs solid fill",
                Encoding::Gradient,
            ),
        ]
    }
}
