use crate::cli::ScoreArgs;
use crate::concordance::{
    write_lod_matrix, write_lod_table, ConcordanceEngine, EngineConfig, LodScore,
};
use crate::fingerprint::{Control, Fingerprint};
use crate::utils::{Error, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time;

pub fn score(args: ScoreArgs) -> Result<()> {
    let start_timer = time::Instant::now();

    let mut config = EngineConfig::new(&args.engine).with_args(args.engine_args.iter().cloned());
    if let Some(timeout) = args.timeout {
        config = config.with_timeout(timeout);
    }
    let engine = ConcordanceEngine::new(config);
    let observed = load_fingerprints(&args.observed)?;

    let scores = if let Some(control_path) = &args.control {
        let control = Control::from_path(control_path)?;
        let mut scores = Vec::with_capacity(observed.len());
        for fingerprint in &observed {
            let lod_score = engine.score_against_control(fingerprint, &control)?;
            scores.push(LodScore {
                observed_sample: fingerprint.sample_id.clone(),
                expected_sample: control.name.clone(),
                lod_score,
            });
        }
        scores
    } else {
        let expected = load_fingerprints(&args.expected)?;
        if args.matrix {
            engine.score_matrix(&observed, &expected)?
        } else {
            if observed.len() != expected.len() {
                return Err(format!(
                    "One-to-one scoring needs as many expected ({}) as observed ({}) fingerprints, use --matrix to score all pairs",
                    expected.len(),
                    observed.len()
                )
                .into());
            }
            let mut scores = Vec::with_capacity(observed.len());
            for (o, e) in observed.iter().zip(&expected) {
                scores.push(LodScore {
                    observed_sample: o.sample_id.clone(),
                    expected_sample: e.sample_id.clone(),
                    lod_score: engine.score_one_to_one(o, e)?,
                });
            }
            scores
        }
    };
    log::info!("Computed {} LOD scores", scores.len());

    let mut out: Box<dyn Write> = match &args.output_path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).map_err(|e| Error::io(path, e))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let written = if args.matrix {
        write_lod_matrix(&scores, &mut out)
    } else {
        write_lod_table(&scores, &mut out)
    };
    written.map_err(|e| Error::io(args.output_path.clone().unwrap_or_default(), e))?;

    log::info!("Total execution time: {:.2?}", start_timer.elapsed());
    Ok(())
}

fn load_fingerprints(paths: &[PathBuf]) -> Result<Vec<Fingerprint>> {
    paths.iter().map(|path| Fingerprint::from_path(path)).collect()
}
