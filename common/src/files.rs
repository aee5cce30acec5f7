//! On-disk layout shared by the master and the workers.
//!
//! Every file lives next to the input file and is named after it:
//!
//! - `mrtmp.<file>-<m>`: input split for map job `m`.
//! - `mrtmp.<file>-<m>-<r>`: output of map job `m` destined for reduce job `r`.
//! - `mrtmp.<file>-res-<r>`: output of reduce job `r`.
//! - `mrtmp.<file>`: the merged, key-sorted result.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::KeyValue;

/// One line of an intermediate or reduce output file.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    value: String,
}

impl TryFrom<KeyValue> for Record {
    type Error = anyhow::Error;

    fn try_from(kv: KeyValue) -> Result<Self> {
        Ok(Self {
            key: String::from_utf8(kv.key.to_vec()).context("key is not valid UTF-8")?,
            value: String::from_utf8(kv.value.to_vec()).context("value is not valid UTF-8")?,
        })
    }
}

impl From<Record> for KeyValue {
    fn from(record: Record) -> Self {
        KeyValue::new(record.key, record.value)
    }
}

fn tmp_path(file: &Path, suffix: &str) -> PathBuf {
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    file.with_file_name(format!("mrtmp.{name}{suffix}"))
}

/// Input split of map job `map_job`.
pub fn split_name(file: &Path, map_job: usize) -> PathBuf {
    tmp_path(file, &format!("-{map_job}"))
}

/// Intermediate file written by `map_job` for `reduce_job`.
pub fn reduce_name(file: &Path, map_job: usize, reduce_job: usize) -> PathBuf {
    tmp_path(file, &format!("-{map_job}-{reduce_job}"))
}

/// Output of reduce job `reduce_job`.
pub fn merge_name(file: &Path, reduce_job: usize) -> PathBuf {
    tmp_path(file, &format!("-res-{reduce_job}"))
}

/// Final merged output.
pub fn output_name(file: &Path) -> PathBuf {
    tmp_path(file, "")
}

/// Write key-value pairs as JSON lines.
pub fn write_pairs(path: &Path, pairs: impl IntoIterator<Item = KeyValue>) -> Result<()> {
    let out = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(out);

    for kv in pairs {
        let record = Record::try_from(kv)?;
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    Ok(())
}

/// Read key-value pairs written by [`write_pairs`].
pub fn read_pairs(path: &Path) -> Result<Vec<KeyValue>> {
    let input = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    BufReader::new(input)
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.is_empty()))
        .map(|line| -> Result<KeyValue> {
            let record: Record = serde_json::from_str(&line?)?;
            Ok(record.into())
        })
        .collect()
}

/// Split `file` into `n_map` chunks, cutting only at line boundaries.
///
/// Every chunk file is created, even when the input has fewer lines than
/// `n_map`.
pub fn split(file: &Path, n_map: usize) -> Result<()> {
    if n_map == 0 {
        return Err(anyhow!("cannot split {} into zero chunks", file.display()));
    }

    let contents =
        fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let chunk_size = contents.len() / n_map;

    let mut chunks = vec![String::new(); n_map];
    let mut current = 0;
    let mut written = 0;
    for line in contents.split_inclusive('\n') {
        if written > (current + 1) * chunk_size && current + 1 < n_map {
            current += 1;
        }
        chunks[current].push_str(line);
        written += line.len();
    }

    for (map_job, chunk) in chunks.iter().enumerate() {
        let path = split_name(file, map_job);
        fs::write(&path, chunk).with_context(|| format!("writing {}", path.display()))?;
        debug!(split = %path.display(), bytes = chunk.len(), "wrote input split");
    }

    info!(file = %file.display(), n_map, "split input");
    Ok(())
}

/// Merge the reduce outputs into one key-sorted file and return its path.
pub fn merge(file: &Path, n_reduce: usize) -> Result<PathBuf> {
    let mut pairs = Vec::new();
    for reduce_job in 0..n_reduce {
        pairs.extend(read_pairs(&merge_name(file, reduce_job))?);
    }
    pairs.sort_by(|a, b| a.key.cmp(&b.key));

    let path = output_name(file);
    let out = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(out);
    for kv in &pairs {
        writeln!(out, "{kv}")?;
    }
    out.flush()?;

    info!(output = %path.display(), keys = pairs.len(), "merged reduce output");
    Ok(path)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Remove splits, intermediate files and reduce outputs. The merged result
/// is kept.
pub fn clean(file: &Path, n_map: usize, n_reduce: usize) -> Result<()> {
    for map_job in 0..n_map {
        remove_if_present(&split_name(file, map_job))?;
        for reduce_job in 0..n_reduce {
            remove_if_present(&reduce_name(file, map_job, reduce_job))?;
        }
    }
    for reduce_job in 0..n_reduce {
        remove_if_present(&merge_name(file, reduce_job))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_sit_next_to_the_input() {
        let file = Path::new("/data/kjv12.txt");
        assert_eq!(split_name(file, 2), Path::new("/data/mrtmp.kjv12.txt-2"));
        assert_eq!(
            reduce_name(file, 2, 1),
            Path::new("/data/mrtmp.kjv12.txt-2-1")
        );
        assert_eq!(merge_name(file, 0), Path::new("/data/mrtmp.kjv12.txt-res-0"));
        assert_eq!(output_name(file), Path::new("/data/mrtmp.kjv12.txt"));
    }

    #[test]
    fn split_keeps_every_line_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("input.txt");
        let lines: Vec<String> = (0..100).map(|i| format!("line number {i}\n")).collect();
        fs::write(&file, lines.concat()).unwrap();

        split(&file, 4).unwrap();

        let mut rejoined = String::new();
        for map_job in 0..4 {
            let chunk = fs::read_to_string(split_name(&file, map_job)).unwrap();
            assert!(!chunk.is_empty());
            assert!(chunk.ends_with('\n'));
            rejoined.push_str(&chunk);
        }
        assert_eq!(rejoined, lines.concat());
    }

    #[test]
    fn split_creates_empty_chunks_for_short_input() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("short.txt");
        fs::write(&file, "only line\n").unwrap();

        split(&file, 3).unwrap();

        assert_eq!(fs::read_to_string(split_name(&file, 0)).unwrap(), "only line\n");
        assert!(fs::read_to_string(split_name(&file, 2)).unwrap().is_empty());
    }

    #[test]
    fn split_rejects_zero_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("input.txt");
        fs::write(&file, "a\n").unwrap();

        assert!(split(&file, 0).is_err());
    }

    #[test]
    fn pairs_survive_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs");
        let pairs = vec![
            KeyValue::new("he said \"hi\"", "1"),
            KeyValue::new("line\nbreak", "2"),
        ];

        write_pairs(&path, pairs.clone()).unwrap();

        assert_eq!(read_pairs(&path).unwrap(), pairs);
    }

    #[test]
    fn merge_sorts_by_key_and_clean_keeps_the_result() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("input.txt");
        write_pairs(
            &merge_name(&file, 0),
            vec![KeyValue::new("pear", "2"), KeyValue::new("apple", "5")],
        )
        .unwrap();
        write_pairs(&merge_name(&file, 1), vec![KeyValue::new("fig", "1")]).unwrap();

        let output = merge(&file, 2).unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "apple: 5\nfig: 1\npear: 2\n"
        );

        clean(&file, 1, 2).unwrap();
        assert!(!merge_name(&file, 0).exists());
        assert!(output.exists());
    }
}
