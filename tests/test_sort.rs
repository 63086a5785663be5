use std::fs;

use rstest::rstest;
use doc_sort::sort::Sort;

mod common;

#[rstest]
#[case(1024, 256)]
#[case(1024 * 1024, 64 * 1024)]
#[case(10 * 1024 * 1024, 512 * 1024)]
fn test_sort_generated(#[case] size: u64, #[case] chunk_size: u64) -> Result<(), anyhow::Error> {
    common::setup();
    let dir = tempfile::tempdir()?;
    let input_path = common::temp_file_name(dir.path());
    let output_path = common::temp_file_name(dir.path());
    common::generate(&input_path, size, size)?;

    let mut document_sort = Sort::new(input_path.clone(), output_path.clone());
    document_sort.with_tasks(4);
    document_sort.with_tmp_dir(dir.path().join("tmp"));
    document_sort.with_chunk_size_bytes(chunk_size);
    document_sort.sort()?;

    assert_eq!(fs::metadata(&output_path)?.len(), size);
    let expected = common::expected_order(common::read_lines(&input_path)?, ". ");
    assert_eq!(common::read_lines(&output_path)?, expected);
    assert!(!dir.path().join("tmp").exists());
    Ok(())
}

#[test]
fn test_field_then_prefix_order() -> Result<(), anyhow::Error> {
    common::setup();
    let dir = tempfile::tempdir()?;
    let input_path = dir.path().join("input.txt");
    let output_path = dir.path().join("output.txt");
    fs::write(
        &input_path,
        "415. Apple\n30432. Something something something\n1. Apple\n32. Cherry is the best\n2. Banana is yellow\n",
    )?;

    let mut document_sort = Sort::new(input_path, output_path.clone());
    document_sort.with_tmp_dir(dir.path().join("tmp"));
    document_sort.sort()?;

    assert_eq!(
        fs::read_to_string(&output_path)?,
        "1. Apple\n415. Apple\n2. Banana is yellow\n32. Cherry is the best\n30432. Something something something\n",
    );
    Ok(())
}

#[test]
fn test_prefix_tie_break_is_textual() -> Result<(), anyhow::Error> {
    common::setup();
    let dir = tempfile::tempdir()?;
    let input_path = dir.path().join("input.txt");
    let output_path = dir.path().join("output.txt");
    fs::write(&input_path, "12. Apple\n-5. Apple\n3. Apple\n10. Apple\n")?;

    let mut document_sort = Sort::new(input_path, output_path.clone());
    document_sort.with_tmp_dir(dir.path().join("tmp"));
    document_sort.sort()?;

    // shorter prefix first, equal lengths compared character by character
    assert_eq!(fs::read_to_string(&output_path)?, "3. Apple\n-5. Apple\n10. Apple\n12. Apple\n");
    Ok(())
}

#[test]
fn test_single_character_delimiter() -> Result<(), anyhow::Error> {
    common::setup();
    let dir = tempfile::tempdir()?;
    let input_path = dir.path().join("input.txt");
    let output_path = dir.path().join("output.txt");
    fs::write(&input_path, "2.apple\n1.apple\n")?;

    let mut document_sort = Sort::new(input_path, output_path.clone());
    document_sort.with_delimiter(".");
    document_sort.with_tmp_dir(dir.path().join("tmp"));
    document_sort.sort()?;

    assert_eq!(fs::read_to_string(&output_path)?, "1.apple\n2.apple\n");
    Ok(())
}

#[test]
fn test_sorting_sorted_output_is_identity() -> Result<(), anyhow::Error> {
    common::setup();
    let dir = tempfile::tempdir()?;
    let input_path = dir.path().join("input.txt");
    let first_path = dir.path().join("first.txt");
    let second_path = dir.path().join("second.txt");
    common::generate(&input_path, 200 * 1024, 11)?;

    for (from, to) in [(&input_path, &first_path), (&first_path, &second_path)] {
        let mut document_sort = Sort::new(from.clone(), to.clone());
        document_sort.with_tasks(3);
        document_sort.with_files_per_merge(2);
        document_sort.with_chunk_size_bytes(16 * 1024);
        document_sort.with_tmp_dir(dir.path().join("tmp"));
        document_sort.sort()?;
    }

    assert_eq!(fs::read(&first_path)?, fs::read(&second_path)?);
    Ok(())
}

#[test]
fn test_tiny_cache_gives_same_result() -> Result<(), anyhow::Error> {
    common::setup();
    let dir = tempfile::tempdir()?;
    let input_path = dir.path().join("input.txt");
    let cached_path = dir.path().join("cached.txt");
    let uncached_path = dir.path().join("uncached.txt");
    common::generate(&input_path, 100 * 1024, 5)?;

    for (output, capacity) in [(&cached_path, 1024 * 1024), (&uncached_path, 0)] {
        let mut document_sort = Sort::new(input_path.clone(), output.clone());
        document_sort.with_cache_capacity(capacity);
        document_sort.with_chunk_size_bytes(8 * 1024);
        document_sort.with_tmp_dir(dir.path().join("tmp"));
        document_sort.sort()?;
    }

    assert_eq!(fs::read(&cached_path)?, fs::read(&uncached_path)?);
    Ok(())
}

#[test]
fn test_single_line() -> Result<(), anyhow::Error> {
    common::setup();
    let dir = tempfile::tempdir()?;
    let input_path = dir.path().join("input.txt");
    let output_path = dir.path().join("output.txt");
    fs::write(&input_path, "7. Lonely line\n")?;

    let mut document_sort = Sort::new(input_path, output_path.clone());
    document_sort.with_tmp_dir(dir.path().join("tmp"));
    document_sort.sort()?;

    assert_eq!(fs::read_to_string(&output_path)?, "7. Lonely line\n");
    Ok(())
}
