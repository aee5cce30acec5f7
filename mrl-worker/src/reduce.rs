use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Error;
use bytes::Bytes;
use tracing::info;

use common::files::{merge_name, read_pairs, reduce_name, write_pairs};
use common::{KeyValue, Workload};

/// Run reduce job `job_number`: gather its partition from every map job,
/// group values by key and write one output pair per key, in key order.
pub fn perform_reduce(
    workload: &Workload,
    file: &Path,
    job_number: usize,
    n_map: usize,
) -> Result<(), Error> {
    let mut grouped: BTreeMap<Bytes, Vec<Bytes>> = BTreeMap::new();
    for map_job in 0..n_map {
        for kv in read_pairs(&reduce_name(file, map_job, job_number))? {
            grouped.entry(kv.key).or_default().push(kv.value);
        }
    }
    info!(reduce_job = job_number, keys = grouped.len(), "starting reduce task");

    let mut output = Vec::with_capacity(grouped.len());
    for (key, values) in grouped {
        let value = (workload.reduce_fn)(key.clone(), Box::new(values.into_iter()), Bytes::new())?;
        output.push(KeyValue::new(key, value));
    }

    write_pairs(&merge_name(file, job_number), output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_values_across_map_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("input.txt");
        write_pairs(
            &reduce_name(&file, 0, 1),
            vec![KeyValue::new("the", "1"), KeyValue::new("cat", "1")],
        )
        .unwrap();
        write_pairs(&reduce_name(&file, 1, 1), vec![KeyValue::new("the", "1")]).unwrap();
        let wc = workload::try_named("wc").unwrap();

        perform_reduce(&wc, &file, 1, 2).unwrap();

        assert_eq!(
            read_pairs(&merge_name(&file, 1)).unwrap(),
            vec![KeyValue::new("cat", "1"), KeyValue::new("the", "2")]
        );
    }
}
