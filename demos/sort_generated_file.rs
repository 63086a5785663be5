use std::path::{Path, PathBuf};

use anyhow::Error;
use doc_sort::generator::Generator;
use doc_sort::sort::Sort;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn generate(path: &Path, size: u64) -> Result<(), Error> {
    let mut generator = Generator::new(StdRng::seed_from_u64(2023));
    generator.with_number_range(-1_000_000, 1_000_000);
    generator.generate(path, size)
}

fn sort_document(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    let mut document_sort = Sort::new(input_path.to_path_buf(), output_path.to_path_buf());
    document_sort.with_tmp_dir(PathBuf::from("./target/demo-tmp"));
    document_sort.with_chunk_size_bytes(4 * 1024 * 1024);
    document_sort.sort()
}

// cargo run -r --example sort_generated_file
pub fn main() -> Result<(), Error> {
    simple_logger::init_with_level(log::Level::Info)?;

    let input_path = PathBuf::from("./target/generated-64m.txt");
    let output_path = PathBuf::from("./target/sorted-64m.txt");

    generate(&input_path, 64 * 1024 * 1024)?;
    sort_document(&input_path, &output_path)?;

    let check = Sort::new(output_path.clone(), PathBuf::new());
    log::info!("{} is sorted: {}", output_path.display(), check.check()?);
    Ok(())
}
