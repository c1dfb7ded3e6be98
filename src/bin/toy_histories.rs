//! Smoke run on a three-state toy table.
//!
//! Usage: `toy_histories [n] [length] [seed]` (defaults 10000, 1000, 1).

use std::collections::BTreeMap;
use std::time::Instant;

use chargewalk::core::{ChargeHistoryGenerator, EventKind, InitialCharge, MfpTable};
use chargewalk::error::{Error, Result};
use rand::{rngs::StdRng, SeedableRng};

fn arg<T: std::str::FromStr>(args: &[String], i: usize, default: T) -> Result<T> {
    match args.get(i) {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::InvalidParam(format!("could not parse argument '{raw}'"))),
        None => Ok(default),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let n: usize = arg(&args, 1, 10_000)?;
    let length: f64 = arg(&args, 2, 1000.0)?;
    let seed: u64 = arg(&args, 3, 1)?;

    let table = MfpTable::from_labeled([
        ("1->2", 1.0),
        ("2->1", 1.0),
        ("2->3", 2.0),
        ("3->2", 2.0),
    ])?;
    table.check_coverage()?;
    let generator = ChargeHistoryGenerator::new(table);
    let mut rng = StdRng::seed_from_u64(seed);

    let started = Instant::now();
    let histories = generator.generate(
        &InitialCharge::Uniform(1),
        length,
        n,
        &mut rng,
        None,
        false,
    )?;
    let elapsed = started.elapsed();

    let transitions: usize = histories
        .iter()
        .map(|h| h.iter().filter(|e| e.kind.charge_delta() != 0).count())
        .sum();
    let mut finals: BTreeMap<i32, usize> = BTreeMap::new();
    for h in &histories {
        if let Some(last) = h.last() {
            debug_assert_eq!(last.kind, EventKind::Post);
            *finals.entry(last.charge).or_insert(0) += 1;
        }
    }

    log::info!(
        "{} particles to length {} in {:.3}s ({} transitions)",
        n,
        length,
        elapsed.as_secs_f64(),
        transitions
    );
    for (q, count) in &finals {
        log::info!("final charge {q}: {count} ({:.3})", *count as f64 / n as f64);
    }
    Ok(())
}
