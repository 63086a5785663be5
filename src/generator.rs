use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use rand::Rng;

use crate::encoding::Encoding;
use crate::error::SortError;

const PHRASES: &[&str] = &[
    "Apple",
    "Banana is yellow",
    "Cherry is the best",
    "Something something something",
    "Measure twice, cut once",
    "The map is not the territory",
    "Slow is smooth and smooth is fast",
    "Every river reaches the sea",
    "Lanterns burn brighter at the harbor",
    "A quiet engine runs the longest",
    "North wind, clear sky",
    "Stone soup for everyone",
];

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Generates input files of an exact byte size for sorting.
///
/// Every line has the form `<number><delimiter><phrase><terminator>`. The last line is padded
/// with random letters so that the file is exactly as large as requested.
///
/// # Examples
/// ```
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use doc_sort::generator::Generator;
///
/// fn generate(path: &std::path::Path) -> Result<(), anyhow::Error> {
///     let mut generator = Generator::new(StdRng::seed_from_u64(7));
///     generator.with_number_range(-1000, 1000);
///     generator.generate(path, 1024 * 1024)
/// }
/// ```
pub struct Generator<R: Rng> {
    rng: R,
    encoding: Encoding,
    delimiter: String,
    line_terminator: String,
    number_from: i64,
    number_to: i64,
}

impl<R: Rng> Generator<R> {
    /// Create a generator drawing from `rng`, with `". "` as delimiter, `"\n"` as terminator,
    /// UTF-8 encoding and numbers in `0..1_000_000`.
    pub fn new(rng: R) -> Generator<R> {
        Generator {
            rng,
            encoding: Encoding::Utf8,
            delimiter: ". ".to_string(),
            line_terminator: "\n".to_string(),
            number_from: 0,
            number_to: 1_000_000,
        }
    }

    pub fn with_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    pub fn with_delimiter(&mut self, delimiter: &str) {
        self.delimiter = delimiter.to_string();
    }

    pub fn with_line_terminator(&mut self, line_terminator: &str) {
        self.line_terminator = line_terminator.to_string();
    }

    /// Numbers are drawn from `from..to`.
    pub fn with_number_range(&mut self, from: i64, to: i64) {
        self.number_from = from;
        self.number_to = to;
    }

    /// Write a file of exactly `size` bytes to `path`.
    pub fn generate(&mut self, path: &Path, size: u64) -> Result<(), anyhow::Error> {
        let shortest = self.encoded_len(&format!("0{}a{}", self.delimiter, self.line_terminator));
        if size % self.encoding.symbol_size() as u64 != 0 {
            return Err(SortError::InvalidConfig(format!("size {} is not a multiple of the symbol size", size)).into());
        }
        if size > 0 && size < shortest {
            return Err(SortError::InvalidConfig(format!("size {} is smaller than the shortest line ({} bytes)", size, shortest)).into());
        }
        if self.number_from >= self.number_to {
            return Err(SortError::InvalidConfig(format!("empty number range {}..{}", self.number_from, self.number_to)).into());
        }

        let file = File::create(path).with_context(|| format!("path: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let mut written = 0;
        let mut lines = 0;
        while written < size {
            let remaining = size - written;
            let number = self.rng.gen_range(self.number_from..self.number_to);
            let phrase = PHRASES[self.rng.gen_range(0..PHRASES.len())];
            let line = format!("{}{}{}{}", number, self.delimiter, phrase, self.line_terminator);
            let mut encoded = self.encoding.encode(&line);
            let length = encoded.len() as u64;
            if length != remaining && length + shortest > remaining {
                encoded = self.padded_line(remaining);
            }
            writer.write_all(&encoded).with_context(|| format!("path: {}", path.display()))?;
            written += encoded.len() as u64;
            lines += 1;
        }
        writer.flush().with_context(|| format!("path: {}", path.display()))?;
        log::info!("Generated {} lines, {} bytes into {}", lines, size, path.display());
        Ok(())
    }

    /// A line of exactly `length` bytes made of a single digit and random letters.
    fn padded_line(&mut self, length: u64) -> Vec<u8> {
        let digit = self.rng.gen_range(0..10);
        let frame = self.encoded_len(&format!("{}{}{}", digit, self.delimiter, self.line_terminator));
        let letters = ((length - frame) / self.encoding.symbol_size() as u64) as usize;
        let fill: String = (0..letters)
            .map(|_| LETTERS[self.rng.gen_range(0..LETTERS.len())] as char)
            .collect();
        self.encoding.encode(&format!("{}{}{}{}", digit, self.delimiter, fill, self.line_terminator))
    }

    fn encoded_len(&self, s: &str) -> u64 {
        self.encoding.encode(s).len() as u64
    }
}
