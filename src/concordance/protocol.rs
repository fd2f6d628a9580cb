//! Request and response documents exchanged with a scoring engine over its
//! standard input and output.

use crate::fingerprint::Fingerprint;
use crate::utils::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonMode {
    /// `observed[i]` is scored against `expected[i]`.
    OneToOne,
    /// Every observed fingerprint is scored against every expected one.
    Matrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcordanceRequest {
    pub comparison_mode: ComparisonMode,
    pub observed_fingerprints: Vec<Fingerprint>,
    pub expected_fingerprints: Vec<Fingerprint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LodScore {
    pub observed_sample: String,
    pub expected_sample: String,
    pub lod_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcordanceResponse {
    pub lod_scores: Vec<LodScore>,
}

impl ConcordanceRequest {
    pub fn new(
        comparison_mode: ComparisonMode,
        observed_fingerprints: Vec<Fingerprint>,
        expected_fingerprints: Vec<Fingerprint>,
    ) -> Self {
        ConcordanceRequest {
            comparison_mode,
            observed_fingerprints,
            expected_fingerprints,
        }
    }

    /// Number of scores a well-behaved engine answers with.
    pub fn expected_score_count(&self) -> usize {
        match self.comparison_mode {
            ComparisonMode::OneToOne => self.observed_fingerprints.len(),
            ComparisonMode::Matrix => {
                self.observed_fingerprints.len() * self.expected_fingerprints.len()
            }
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Protocol(format!("encoding request: {}", e)))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Protocol(format!("decoding request: {}", e)))
    }
}

impl ConcordanceResponse {
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Protocol(format!("encoding response: {}", e)))
    }

    /// Parses an engine response. Anything that is not a well-formed
    /// response document is a protocol failure.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Protocol(format!("malformed response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_wire_names() {
        let response = ConcordanceResponse::decode(
            br#"{"lodScores": [{"observedSample": "A", "expectedSample": "B", "lodScore": -3.5}]}"#,
        )
        .unwrap();
        assert_eq!(response.lod_scores.len(), 1);
        assert_eq!(response.lod_scores[0].observed_sample, "A");
        assert_eq!(response.lod_scores[0].lod_score, -3.5);
    }

    #[test]
    fn test_malformed_response_is_protocol_error() {
        assert!(matches!(
            ConcordanceResponse::decode(b"lod=3"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            ConcordanceResponse::decode(br#"{"scores": []}"#),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_request_mode_encoding() {
        let request = ConcordanceRequest::new(ComparisonMode::Matrix, vec![], vec![]);
        let value: serde_json::Value = serde_json::from_slice(&request.encode().unwrap()).unwrap();
        assert_eq!(value["comparisonMode"], "Matrix");
        assert!(value["observedFingerprints"].as_array().unwrap().is_empty());
        assert_eq!(request.expected_score_count(), 0);
    }
}
