//! Word count.
//!
//! A word starts with an ASCII letter and runs through letters, hyphens and
//! apostrophes. Trailing hyphens are not part of the word.

use anyhow::Result;
use bytes::Bytes;

use common::{KeyValue, MapOutput};

fn is_letter(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_word_byte(b: u8) -> bool {
    is_letter(b) || b == b'-' || b == b'\''
}

fn words(text: &[u8]) -> Vec<Bytes> {
    let mut words = Vec::new();
    let mut i = 0;

    while i < text.len() {
        while i < text.len() && !is_letter(text[i]) {
            i += 1;
        }
        let start = i;
        while i < text.len() && is_word_byte(text[i]) {
            i += 1;
        }

        let mut end = i;
        while end > start && text[end - 1] == b'-' {
            end -= 1;
        }
        if end > start {
            words.push(Bytes::copy_from_slice(&text[start..end]));
        }
    }

    words
}

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let iter = words(&kv.value)
        .into_iter()
        .map(|word| Ok::<_, anyhow::Error>(KeyValue::new(word, "1")));
    Ok(Box::new(iter))
}

pub fn reduce(
    _key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let mut count = 0u64;

    for value in values {
        count += std::str::from_utf8(&value)?.parse::<u64>()?;
    }

    Ok(Bytes::from(count.to_string()))
}
