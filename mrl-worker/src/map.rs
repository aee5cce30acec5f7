use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Error};
use bytes::Bytes;
use tracing::info;

use common::files::{reduce_name, split_name, write_pairs};
use common::{ihash, KeyValue, Workload};

/// Run map job `job_number` over its input split and partition the output
/// into one intermediate file per reduce job.
pub fn perform_map(
    workload: &Workload,
    file: &Path,
    job_number: usize,
    n_reduce: usize,
) -> Result<(), Error> {
    if n_reduce == 0 {
        return Err(anyhow!("map job {job_number} has no reduce partitions"));
    }

    let split = split_name(file, job_number);
    let contents = fs::read(&split).with_context(|| format!("reading {}", split.display()))?;
    info!(split = %split.display(), bytes = contents.len(), "starting map task");

    let input = KeyValue::new(split.display().to_string(), contents);
    let mut partitions: Vec<Vec<KeyValue>> = vec![Vec::new(); n_reduce];
    for kv in (workload.map_fn)(input, Bytes::new())? {
        let kv = kv?;
        let partition = ihash(&kv.key) as usize % n_reduce;
        partitions[partition].push(kv);
    }

    for (reduce_job, pairs) in partitions.into_iter().enumerate() {
        write_pairs(&reduce_name(file, job_number, reduce_job), pairs)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::files::read_pairs;

    #[test]
    fn every_pair_lands_in_its_partition() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("input.txt");
        fs::write(split_name(&file, 0), "the cat saw the dog").unwrap();
        let wc = workload::try_named("wc").unwrap();

        perform_map(&wc, &file, 0, 3).unwrap();

        let mut total = 0;
        for reduce_job in 0..3 {
            for kv in read_pairs(&reduce_name(&file, 0, reduce_job)).unwrap() {
                assert_eq!(ihash(&kv.key) as usize % 3, reduce_job);
                total += 1;
            }
        }
        assert_eq!(total, 5);
    }

    #[test]
    fn missing_split_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let wc = workload::try_named("wc").unwrap();

        assert!(perform_map(&wc, &dir.path().join("input.txt"), 0, 1).is_err());
    }
}
