//! Fingerprint entities consumed by the codec and the concordance engine.

use crate::utils::{open_text_reader, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Disposition {
    Pass,
    Fail,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Fluidigm,
    GeneralArray,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenomeBuild {
    Hg18,
    Hg19,
    Hg37,
    Hg38,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "U")]
    Unknown,
}

impl Gender {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Unknown => "U",
        }
    }
}

/// One genotype call of a fingerprint, keyed by SNP name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintCall {
    pub rsid: String,
    pub genotype: String,
    #[serde(default)]
    pub call_confidence: Option<f64>,
}

impl FingerprintCall {
    pub fn new(rsid: &str, genotype: &str) -> Self {
        FingerprintCall {
            rsid: rsid.to_string(),
            genotype: genotype.to_string(),
            call_confidence: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub sample_id: String,
    pub disposition: Disposition,
    pub platform: Platform,
    pub genome_build: GenomeBuild,
    pub snp_list_name: String,
    pub gender: Gender,
    #[serde(with = "date_format")]
    pub date_generated: NaiveDateTime,
    pub calls: Vec<FingerprintCall>,
}

impl Fingerprint {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = open_text_reader(path)?;
        let fingerprint: Fingerprint = serde_json::from_reader(reader)?;
        log::debug!(
            "Loaded fingerprint {} with {} calls from {}",
            fingerprint.sample_id,
            fingerprint.calls.len(),
            path.display()
        );
        Ok(fingerprint)
    }
}

/// A control sample. Its reference fingerprint is what observed control
/// fingerprints are scored against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub name: String,
    #[serde(default)]
    pub reference_fingerprint: Option<Fingerprint>,
}

impl Control {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = open_text_reader(path)?;
        Ok(serde_json::from_reader(reader)?)
    }
}

mod date_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FINGERPRINT_JSON: &str = r#"{
        "sampleId": "SM-1",
        "disposition": "PASS",
        "platform": "GENERAL_ARRAY",
        "genomeBuild": "HG19",
        "snpListName": "FLUIDIGM_FP_V2",
        "gender": "F",
        "dateGenerated": "2024-03-05T14:07:09",
        "calls": [
            {"rsid": "rs1", "genotype": "AG", "callConfidence": 0.99},
            {"rsid": "rs2", "genotype": "--"}
        ]
    }"#;

    #[test]
    fn test_deserialize_fingerprint() {
        let fingerprint: Fingerprint = serde_json::from_str(FINGERPRINT_JSON).unwrap();
        assert_eq!(fingerprint.sample_id, "SM-1");
        assert_eq!(fingerprint.platform, Platform::GeneralArray);
        assert_eq!(fingerprint.genome_build, GenomeBuild::Hg19);
        assert_eq!(fingerprint.gender, Gender::Female);
        assert_eq!(fingerprint.calls.len(), 2);
        assert_eq!(fingerprint.calls[0].call_confidence, Some(0.99));
        assert_eq!(fingerprint.calls[1].call_confidence, None);
        assert_eq!(
            fingerprint.date_generated.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-03-05 14:07:09"
        );
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let fingerprint: Fingerprint = serde_json::from_str(FINGERPRINT_JSON).unwrap();
        let value = serde_json::to_value(&fingerprint).unwrap();
        assert_eq!(value["dateGenerated"], "2024-03-05T14:07:09");
        assert_eq!(value["disposition"], "PASS");
        assert_eq!(value["gender"], "F");
        assert_eq!(value["snpListName"], "FLUIDIGM_FP_V2");
        assert_eq!(value["calls"][0]["callConfidence"], 0.99);
    }

    #[test]
    fn test_rejects_bad_date() {
        let json = FINGERPRINT_JSON.replace("2024-03-05T14:07:09", "05/03/2024");
        assert!(serde_json::from_str::<Fingerprint>(&json).is_err());
    }

    #[test]
    fn test_control_without_reference() {
        let control: Control = serde_json::from_str(r#"{"name": "NA12878"}"#).unwrap();
        assert!(control.reference_fingerprint.is_none());
    }
}
