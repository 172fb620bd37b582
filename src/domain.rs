use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MgsError;

/// Analysis tools whose output the parser layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolType {
    Kraken,
    KrakenHll,
    Metaphlan2,
    HmpSites,
    MicrobeCensus,
    ShortbredAmrs,
    ResistomeAmrs,
    ReadClassProportions,
    ReadStats,
    MicrobeDirectory,
    AlphaDiversity,
    BetaDiversity,
    Humann2,
    Humann2Normalized,
    Methyltransferases,
    Vfdb,
    HumanAncestry,
    Macrobes,
}

impl ToolType {
    pub const ALL: [ToolType; 18] = [
        ToolType::Kraken,
        ToolType::KrakenHll,
        ToolType::Metaphlan2,
        ToolType::HmpSites,
        ToolType::MicrobeCensus,
        ToolType::ShortbredAmrs,
        ToolType::ResistomeAmrs,
        ToolType::ReadClassProportions,
        ToolType::ReadStats,
        ToolType::MicrobeDirectory,
        ToolType::AlphaDiversity,
        ToolType::BetaDiversity,
        ToolType::Humann2,
        ToolType::Humann2Normalized,
        ToolType::Methyltransferases,
        ToolType::Vfdb,
        ToolType::HumanAncestry,
        ToolType::Macrobes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::Kraken => "kraken_taxonomy_profiling",
            ToolType::KrakenHll => "krakenhll_taxonomy_profiling",
            ToolType::Metaphlan2 => "metaphlan2_taxonomy_profiling",
            ToolType::HmpSites => "hmp_site_dists",
            ToolType::MicrobeCensus => "microbe_census",
            ToolType::ShortbredAmrs => "shortbred_amr_profiling",
            ToolType::ResistomeAmrs => "resistome_amrs",
            ToolType::ReadClassProportions => "read_classification_proportions",
            ToolType::ReadStats => "read_stats",
            ToolType::MicrobeDirectory => "microbe_directory_annotate",
            ToolType::AlphaDiversity => "alpha_diversity_stats",
            ToolType::BetaDiversity => "beta_diversity_stats",
            ToolType::Humann2 => "humann2_functional_profiling",
            ToolType::Humann2Normalized => "humann2_normalize_genes",
            ToolType::Methyltransferases => "align_to_methyltransferases",
            ToolType::Vfdb => "vfdb_quantify",
            ToolType::HumanAncestry => "human_ancestry",
            ToolType::Macrobes => "macrobe_abundance",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|tool| tool.as_str() == trimmed)
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ToolType {
    type Err = MgsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_name(value).ok_or_else(|| MgsError::UnparsableResultType {
            tool_type: value.to_string(),
            schema: "{}".to_string(),
        })
    }
}

/// Periods are reserved by the storage layer, so keys carry underscores instead.
pub fn normalize_key(key: &str) -> String {
    key.replace('.', "_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Error,
}

/// Recorded status of one attempted per-sample, per-result upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    #[serde(rename = "type")]
    pub kind: OutcomeKind,
    pub sample_name: String,
    pub sample_uuid: Option<String>,
    pub result_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl UploadOutcome {
    pub fn success(sample_name: &str, sample_uuid: Option<&str>, result_type: &str) -> Self {
        Self {
            kind: OutcomeKind::Success,
            sample_name: sample_name.to_string(),
            sample_uuid: sample_uuid.map(str::to_string),
            result_type: result_type.to_string(),
            exception: None,
        }
    }

    pub fn error(
        sample_name: &str,
        sample_uuid: Option<&str>,
        result_type: &str,
        exception: impl fmt::Display,
    ) -> Self {
        Self {
            kind: OutcomeKind::Error,
            sample_name: sample_name.to_string(),
            sample_uuid: sample_uuid.map(str::to_string),
            result_type: result_type.to_string(),
            exception: Some(exception.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == OutcomeKind::Error
    }
}
