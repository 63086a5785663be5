use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use data_encoding::HEXLOWER;
use rand::rngs::StdRng;
use rand::SeedableRng;
use doc_sort::generator::Generator;

pub fn setup() {
    // several tests share the process, only the first logger registration succeeds
    let _ = simple_logger::init_with_level(log::Level::Warn);
}

#[allow(dead_code)]
pub fn read_lines(path: &Path) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &Path) -> PathBuf {
    let mut result = dir.to_path_buf();
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

#[allow(dead_code)]
pub fn generate(path: &Path, size: u64, seed: u64) -> Result<(), anyhow::Error> {
    let mut generator = Generator::new(StdRng::seed_from_u64(seed));
    generator.with_number_range(-100_000, 100_000);
    generator.generate(path, size)
}

/// Sort `lines` in memory the way a document sort orders them.
#[allow(dead_code)]
pub fn expected_order(mut lines: Vec<String>, delimiter: &str) -> Vec<String> {
    lines.sort_by(|a, b| {
        let (a_prefix, a_field) = a.split_once(delimiter).unwrap();
        let (b_prefix, b_field) = b.split_once(delimiter).unwrap();
        a_field.cmp(b_field)
            .then(a_prefix.chars().count().cmp(&b_prefix.chars().count()))
            .then(a_prefix.cmp(b_prefix))
    });
    lines
}
