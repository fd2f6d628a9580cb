//! Reference in-process LOD scoring, served by the `fpscore` engine binary.

use super::protocol::{ComparisonMode, ConcordanceRequest, ConcordanceResponse, LodScore};
use crate::fingerprint::Fingerprint;
use crate::genotype::{DiploidGenotype, DiploidHaplotype};
use crate::hapmap::HaplotypeMap;
use crate::utils::{Error, Result};
use rayon::prelude::*;
use std::collections::HashMap;

/// Probability that a genotype call differs from the true genotype.
pub const DEFAULT_ERROR_RATE: f64 = 0.01;

/// Minor allele frequency assumed for SNPs not described by a haplotype map.
const DEFAULT_MAF: f64 = 0.5;

pub struct LodScorer<'a> {
    map: Option<&'a HaplotypeMap>,
    error_rate: f64,
}

impl<'a> LodScorer<'a> {
    pub fn new(map: Option<&'a HaplotypeMap>) -> Self {
        LodScorer {
            map,
            error_rate: DEFAULT_ERROR_RATE,
        }
    }

    pub fn with_error_rate(mut self, error_rate: f64) -> Self {
        self.error_rate = error_rate;
        self
    }

    /// Log10 likelihood ratio of `observed` and `expected` coming from the
    /// same individual versus two unrelated individuals, summed over the SNPs
    /// called in both.
    pub fn score(&self, observed: &Fingerprint, expected: &Fingerprint) -> f64 {
        let expected_calls = decode_calls(expected);
        decode_calls(observed)
            .into_iter()
            .filter_map(|(rsid, observed_gt)| {
                let expected_gt = *expected_calls.get(rsid)?;
                self.snp_lod(rsid, observed_gt, expected_gt)
            })
            .sum()
    }

    fn snp_lod(&self, rsid: &str, observed: DiploidGenotype, expected: DiploidGenotype) -> Option<f64> {
        let population = self.population_frequency(rsid, observed)?;
        let same = if observed == expected {
            1.0 - self.error_rate
        } else {
            self.error_rate / 2.0
        };
        Some((same / population).log10())
    }

    /// Hardy-Weinberg frequency of `genotype` in the population.
    fn population_frequency(&self, rsid: &str, genotype: DiploidGenotype) -> Option<f64> {
        let snp = self.map.and_then(|map| map.snp_by_name(rsid));
        let Some(snp) = snp else {
            let q = DEFAULT_MAF;
            return Some(if genotype.is_heterozygous() {
                2.0 * q * (1.0 - q)
            } else {
                q * q
            });
        };
        let haplotype = snp.haplotype_of(genotype)?;
        let q = snp.maf();
        let p = 1.0 - q;
        let frequency = match haplotype {
            DiploidHaplotype::HomozygousMajor => p * p,
            DiploidHaplotype::Heterozygous => 2.0 * p * q,
            DiploidHaplotype::HomozygousMinor => q * q,
        };
        (frequency > 0.0).then_some(frequency)
    }

    /// Answers a scoring request. Pairs are scored in parallel.
    pub fn respond(&self, request: &ConcordanceRequest) -> Result<ConcordanceResponse> {
        let observed = &request.observed_fingerprints;
        let expected = &request.expected_fingerprints;
        let pairs: Vec<(&Fingerprint, &Fingerprint)> = match request.comparison_mode {
            ComparisonMode::OneToOne => {
                if observed.len() != expected.len() {
                    return Err(Error::Protocol(format!(
                        "one-to-one comparison of {} observed and {} expected fingerprints",
                        observed.len(),
                        expected.len()
                    )));
                }
                observed.iter().zip(expected).collect()
            }
            ComparisonMode::Matrix => observed
                .iter()
                .flat_map(|o| expected.iter().map(move |e| (o, e)))
                .collect(),
        };
        log::debug!("Scoring {} fingerprint pairs", pairs.len());

        let lod_scores = pairs
            .par_iter()
            .map(|(o, e)| LodScore {
                observed_sample: o.sample_id.clone(),
                expected_sample: e.sample_id.clone(),
                lod_score: self.score(o, e),
            })
            .collect();
        Ok(ConcordanceResponse { lod_scores })
    }
}

/// Calls of a fingerprint that decode to a genotype; the first call of a
/// SNP wins.
fn decode_calls(fingerprint: &Fingerprint) -> HashMap<&str, DiploidGenotype> {
    let mut calls = HashMap::with_capacity(fingerprint.calls.len());
    for call in &fingerprint.calls {
        match call.genotype.parse::<DiploidGenotype>() {
            Ok(genotype) => {
                calls.entry(call.rsid.as_str()).or_insert(genotype);
            }
            Err(_) => log::trace!(
                "Ignoring call {}={} of {}",
                call.rsid,
                call.genotype,
                fingerprint.sample_id
            ),
        }
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintCall;
    use crate::genotype::Snp;
    use crate::hapmap::{HaplotypeBlock, SequenceDictionary, SequenceRecord};
    use approx::assert_relative_eq;

    fn fingerprint(sample_id: &str, calls: &[(&str, &str)]) -> Fingerprint {
        let mut fingerprint: Fingerprint = serde_json::from_str(&format!(
            r#"{{"sampleId": "{}", "disposition": "PASS", "platform": "FLUIDIGM",
                "genomeBuild": "HG19", "snpListName": "FP", "gender": "U",
                "dateGenerated": "2024-01-01T00:00:00", "calls": []}}"#,
            sample_id
        ))
        .unwrap();
        fingerprint.calls = calls
            .iter()
            .map(|(rsid, gt)| FingerprintCall::new(rsid, gt))
            .collect();
        fingerprint
    }

    #[test]
    fn test_concordant_and_discordant() {
        let scorer = LodScorer::new(None);
        let a = fingerprint("A", &[("rs1", "AG"), ("rs2", "CC"), ("rs3", "TT")]);
        let b = fingerprint("B", &[("rs1", "GA"), ("rs2", "CC"), ("rs3", "TT")]);
        let c = fingerprint("C", &[("rs1", "AA"), ("rs2", "CT"), ("rs3", "GG")]);

        let expected = (0.99f64 / 0.5).log10() + 2.0 * (0.99f64 / 0.25).log10();
        assert_relative_eq!(scorer.score(&a, &b), expected, epsilon = 1e-9);
        assert!(scorer.score(&a, &c) < -4.0);
    }

    #[test]
    fn test_uncalled_and_unshared_snps_are_ignored() {
        let scorer = LodScorer::new(None);
        let a = fingerprint("A", &[("rs1", "AG"), ("rs2", "--")]);
        let b = fingerprint("B", &[("rs2", "CC"), ("rs3", "TT")]);
        assert_relative_eq!(scorer.score(&a, &b), 0.0);
    }

    #[test]
    fn test_uses_map_frequencies() {
        let snp = Snp::new("rs1", "1", 10, b'A', b'G', 0.1, vec![]).unwrap();
        let dictionary =
            SequenceDictionary::from_sequences(vec![SequenceRecord::new("1", None)]).unwrap();
        let map = HaplotypeMap::from_blocks(dictionary, [HaplotypeBlock::new(0.1, [snp]).unwrap()])
            .unwrap();
        let scorer = LodScorer::new(Some(&map));

        let minor = fingerprint("A", &[("rs1", "GG")]);
        assert_relative_eq!(
            scorer.score(&minor, &minor),
            (0.99f64 / 0.01).log10(),
            epsilon = 1e-9
        );
        // a genotype foreign to the snp carries no information
        let foreign = fingerprint("B", &[("rs1", "CC")]);
        assert_relative_eq!(scorer.score(&foreign, &foreign), 0.0);
    }

    #[test]
    fn test_respond() {
        let scorer = LodScorer::new(None);
        let a = fingerprint("A", &[("rs1", "AG")]);
        let b = fingerprint("B", &[("rs1", "AG")]);

        let matrix = ConcordanceRequest::new(
            ComparisonMode::Matrix,
            vec![a.clone(), b.clone()],
            vec![a.clone(), b.clone()],
        );
        let response = scorer.respond(&matrix).unwrap();
        assert_eq!(response.lod_scores.len(), 4);
        assert_eq!(response.lod_scores[1].observed_sample, "A");
        assert_eq!(response.lod_scores[1].expected_sample, "B");

        let mismatched = ConcordanceRequest::new(ComparisonMode::OneToOne, vec![a, b.clone()], vec![b]);
        assert!(matches!(scorer.respond(&mismatched), Err(Error::Protocol(_))));
    }
}
