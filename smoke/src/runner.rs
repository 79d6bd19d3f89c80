//! # Round-Trip Runner
//!
//! One run per container kind:
//!
//! 1. Build a container of `size` random entries owned by account `A`,
//!    mirroring what went in.
//! 2. Read every entry back and walk the container twice.
//! 3. Transfer the tree to account `B` and compare.
//! 4. Deep-remove both trees and the mirror.
//! 5. Check the store against the baseline taken before step 1.
//!
//! Any divergence aborts the run with the seed in the error message.

use anyhow::{bail, ensure, Context, Result};
use serde::Serialize;
use tracing::info;

use strata_runtime::storage::StorageStats;
use strata_runtime::types::{Address, CompositeKind, StaticType};
use strata_runtime::value::DictionaryValue;
use strata_runtime::workload::{Generator, ValueMap, WorkloadConfig};
use strata_runtime::{Session, Value};

use crate::cli::WorkloadKind;

const OWNER_A: Address = Address([0, 0, 0, 0, 0, 0, 0, b'A']);
const OWNER_B: Address = Address([0, 0, 0, 0, 0, 0, 0, b'B']);

/// Outcome of one workload.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub seed: u64,
    pub kind: String,
    pub size: usize,
    pub baseline_slabs: usize,
    pub baseline_bytes: usize,
    pub peak_slabs: usize,
    pub peak_bytes: usize,
    pub final_slabs: usize,
    pub final_bytes: usize,
}

impl Report {
    fn new(seed: u64, kind: &str, size: usize, baseline: StorageStats) -> Self {
        Self {
            seed,
            kind: kind.to_string(),
            size,
            baseline_slabs: baseline.slab_count,
            baseline_bytes: baseline.total_size,
            peak_slabs: 0,
            peak_bytes: 0,
            final_slabs: 0,
            final_bytes: 0,
        }
    }

    fn peak(&mut self, stats: StorageStats) {
        self.peak_slabs = stats.slab_count;
        self.peak_bytes = stats.total_size;
    }

    fn finish(&mut self, stats: StorageStats) -> Result<()> {
        self.final_slabs = stats.slab_count;
        self.final_bytes = stats.total_size;
        ensure!(
            self.final_slabs == self.baseline_slabs && self.final_bytes == self.baseline_bytes,
            "seed {}: {} leaked storage: baseline {} slabs / {} bytes, final {} slabs / {} bytes",
            self.seed,
            self.kind,
            self.baseline_slabs,
            self.baseline_bytes,
            self.final_slabs,
            self.final_bytes,
        );
        Ok(())
    }
}

/// Run the selected workloads against `session`.
pub fn run(
    session: &mut Session,
    seed: u64,
    size: usize,
    kind: WorkloadKind,
) -> Result<Vec<Report>> {
    let mut generator = Generator::new(seed, WorkloadConfig::default());
    let kinds: &[WorkloadKind] = match kind {
        WorkloadKind::All => &[
            WorkloadKind::Dictionary,
            WorkloadKind::Array,
            WorkloadKind::Composite,
        ],
        WorkloadKind::Array => &[WorkloadKind::Array],
        WorkloadKind::Dictionary => &[WorkloadKind::Dictionary],
        WorkloadKind::Composite => &[WorkloadKind::Composite],
    };

    let mut reports = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let report = match kind {
            WorkloadKind::Dictionary => dictionary(session, &mut generator, seed, size),
            WorkloadKind::Array => array(session, &mut generator, seed, size),
            WorkloadKind::Composite => composite(session, &mut generator, seed, size),
            WorkloadKind::All => bail!("nested workload selection"),
        }
        .with_context(|| format!("workload {kind:?} failed (seed {seed})"))?;

        info!(
            kind = %report.kind,
            peak_slabs = report.peak_slabs,
            peak_bytes = report.peak_bytes,
            "workload passed"
        );
        reports.push(report);
    }
    Ok(reports)
}

fn check_equal(session: &Session, seed: u64, what: &str, a: &Value, b: &Value) -> Result<()> {
    ensure!(a.equal(session, b)?, "seed {seed}: {what} differs");
    Ok(())
}

/// Transfer `original` to `B`, compare and deep-remove both trees.
fn transfer_and_remove(session: &mut Session, seed: u64, original: Value) -> Result<()> {
    let copy = original.transfer(session, Some(OWNER_B), false)?;
    check_equal(session, seed, "transferred copy", &copy, &original)?;
    ensure!(
        copy.owner() == Some(OWNER_B),
        "seed {seed}: copy is not owned by the target"
    );

    copy.deep_remove(session)?;
    original.deep_remove(session)?;
    Ok(())
}

fn dictionary(
    session: &mut Session,
    generator: &mut Generator,
    seed: u64,
    size: usize,
) -> Result<Report> {
    let mut report = Report::new(seed, "dictionary", size, session.stats()?);
    let owner = Some(OWNER_A);

    let mut expected = ValueMap::new();
    let mut entries = Vec::with_capacity(size);
    for _ in 0..size {
        let key = generator.hashable_value(session, owner)?;
        let value = generator.storable_value(session, owner, 0)?;
        expected.put(session, &key, &value)?;
        entries.push((key, value));
    }

    let dictionary = DictionaryValue::new(
        session,
        StaticType::dictionary(StaticType::any_struct(), StaticType::any_struct()),
        owner,
        entries,
    )?;
    ensure!(
        dictionary.count(session)? == expected.len(),
        "seed {seed}: dictionary count differs from the mirror"
    );

    for (key, value) in expected.iter() {
        let Some(stored) = dictionary.get(session, key)? else {
            bail!("seed {seed}: key missing from dictionary");
        };
        check_equal(session, seed, "dictionary value", &stored, value)?;
    }

    for _ in 0..2 {
        let mut visited = 0;
        for entry in dictionary.iter(session)? {
            let (key, value) = entry?;
            let Some(mirrored) = expected.get(session, &key)? else {
                bail!("seed {seed}: iteration produced an unknown key");
            };
            check_equal(session, seed, "iterated value", &value, mirrored)?;
            visited += 1;
        }
        ensure!(
            visited == expected.len(),
            "seed {seed}: iteration visited {visited} of {} entries",
            expected.len()
        );
    }

    report.peak(session.stats()?);
    transfer_and_remove(session, seed, Value::Dictionary(dictionary))?;
    expected.clear(session)?;
    report.finish(session.stats()?)?;
    Ok(report)
}

fn array(
    session: &mut Session,
    generator: &mut Generator,
    seed: u64,
    size: usize,
) -> Result<Report> {
    let mut report = Report::new(seed, "array", size, session.stats()?);

    let array = generator.array_of_size(session, Some(OWNER_A), 0, size)?;
    ensure!(
        array.count(session)? == size,
        "seed {seed}: array count differs"
    );

    let first = array.iter(session)?.collect::<strata_runtime::Result<Vec<_>>>()?;
    let second = array.iter(session)?.collect::<strata_runtime::Result<Vec<_>>>()?;
    ensure!(first.len() == second.len(), "seed {seed}: iteration length differs");
    for (index, (a, b)) in first.iter().zip(&second).enumerate() {
        check_equal(session, seed, &format!("element {index}"), a, b)?;
        check_equal(session, seed, &format!("element {index}"), a, &array.get(session, index)?)?;
    }

    report.peak(session.stats()?);
    transfer_and_remove(session, seed, Value::Array(array))?;
    report.finish(session.stats()?)?;
    Ok(report)
}

fn composite(
    session: &mut Session,
    generator: &mut Generator,
    seed: u64,
    size: usize,
) -> Result<Report> {
    let mut report = Report::new(seed, "composite", size, session.stats()?);

    let composite =
        generator.composite_with_fields(session, CompositeKind::Structure, Some(OWNER_A), 0, size)?;

    let names = composite.field_names(session)?;
    let mut visited = Vec::with_capacity(names.len());
    composite.for_each_field(session, |name, _| {
        visited.push(name.to_string());
        true
    })?;
    ensure!(visited == names, "seed {seed}: field order differs");

    report.peak(session.stats()?);

    // Strip the copy field by field before removing it.
    let Value::Composite(copy) =
        Value::Composite(composite).transfer(session, Some(OWNER_B), false)?
    else {
        bail!("seed {seed}: transfer changed the value kind");
    };
    for name in &names {
        ensure!(
            copy.remove_field(session, name)?,
            "seed {seed}: field {name} missing from copy"
        );
    }
    ensure!(
        composite.field_count(session)? == names.len(),
        "seed {seed}: removing fields from the copy touched the original"
    );
    Value::Composite(copy).deep_remove(session)?;

    transfer_and_remove(session, seed, Value::Composite(composite))?;
    report.finish(session.stats()?)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_runtime::config::RuntimeConfig;
    use strata_runtime::storage::SledSlabStorage;

    #[test]
    fn all_workloads_pass_in_memory() {
        let mut session = Session::in_memory();
        let reports = run(&mut session, 17, 25, WorkloadKind::All).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.final_slabs == r.baseline_slabs));
    }

    #[test]
    fn dictionary_workload_passes_on_sled() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SledSlabStorage::open(dir.path()).unwrap();
        let mut session = Session::new(Box::new(storage), RuntimeConfig::default());
        let reports = run(&mut session, 3, 10, WorkloadKind::Dictionary).unwrap();
        assert_eq!(reports[0].kind, "dictionary");
        assert_eq!(reports[0].final_bytes, reports[0].baseline_bytes);
    }
}
