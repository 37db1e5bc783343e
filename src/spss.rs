// src/spss.rs
//
// Reader for the common shape of SPSS system files (.sav): `$FL2` header in
// either byte order, type-2 variable records (numeric and short string),
// bytecode-compressed or uncompressed case data. Value labels, documents and
// extension records are skipped; zlib-compressed (`$FL3`) files and very long
// string variables are rejected.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::data_types::TableData;

const HEADER_MAGIC: &[u8; 4] = b"$FL2";
const ZSAV_MAGIC: &[u8; 4] = b"$FL3";

const REC_VARIABLE: i32 = 2;
const REC_VALUE_LABELS: i32 = 3;
const REC_VALUE_LABEL_VARS: i32 = 4;
const REC_DOCUMENTS: i32 = 6;
const REC_EXTENSION: i32 = 7;
const REC_DICT_END: i32 = 999;

#[derive(Debug, Error)]
pub enum SavError {
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an SPSS system file")]
    BadMagic,

    #[error("zlib-compressed system files are not supported")]
    ZlibCompressed,

    #[error("unsupported compression code {0}")]
    UnsupportedCompression(i32),

    #[error("unrecognized dictionary record type {0}")]
    UnexpectedRecord(i32),

    #[error("file ends in the middle of a {0}")]
    Truncated(&'static str),

    #[error("case data does not match the variable dictionary")]
    MalformedCase,
}

pub fn read_sav(path: &Path) -> Result<TableData, SavError> {
    let bytes = fs::read(path)?;
    parse(&bytes)
}

struct Variable {
    name: String,
    /// 0 for numeric, otherwise the declared string width in bytes.
    width: i32,
}

impl Variable {
    fn is_string(&self) -> bool {
        self.width > 0
    }

    /// Number of 8-byte data elements this variable occupies per case.
    fn elements(&self) -> usize {
        if self.width <= 0 {
            1
        } else {
            (self.width as usize + 7) / 8
        }
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], SavError> {
        if self.pos + n > self.buf.len() {
            return Err(SavError::Truncated(what));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize, what: &'static str) -> Result<(), SavError> {
        self.take(n, what).map(|_| ())
    }

    fn read_i32(&mut self, what: &'static str) -> Result<i32, SavError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4, what)?);
        Ok(if self.big_endian {
            i32::from_be_bytes(raw)
        } else {
            i32::from_le_bytes(raw)
        })
    }

    fn read_f64(&mut self, what: &'static str) -> Result<f64, SavError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8, what)?);
        Ok(self.decode_f64(raw))
    }

    fn decode_f64(&self, raw: [u8; 8]) -> f64 {
        if self.big_endian {
            f64::from_be_bytes(raw)
        } else {
            f64::from_le_bytes(raw)
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

fn parse(bytes: &[u8]) -> Result<TableData, SavError> {
    let mut cur = Cursor {
        buf: bytes,
        pos: 0,
        big_endian: false,
    };

    let magic = cur.take(4, "header")?;
    if magic == ZSAV_MAGIC {
        return Err(SavError::ZlibCompressed);
    }
    if magic != HEADER_MAGIC {
        return Err(SavError::BadMagic);
    }
    cur.skip(60, "header")?;

    // The layout code is a small positive integer; if it only makes sense
    // byte-swapped, the whole file is in the opposite byte order.
    let layout = cur.read_i32("header")?;
    if !(1..=3).contains(&layout) {
        if (1..=3).contains(&layout.swap_bytes()) {
            cur.big_endian = true;
        } else {
            return Err(SavError::BadMagic);
        }
    }

    let _nominal_case_size = cur.read_i32("header")?;
    let compression = cur.read_i32("header")?;
    let _weight_index = cur.read_i32("header")?;
    let ncases = cur.read_i32("header")?;
    let bias = cur.read_f64("header")?;
    // creation date, creation time, file label, padding
    cur.skip(9 + 8 + 64 + 3, "header")?;

    match compression {
        0 | 1 => {}
        2 => return Err(SavError::ZlibCompressed),
        other => return Err(SavError::UnsupportedCompression(other)),
    }

    let mut variables: Vec<Variable> = Vec::new();
    loop {
        let rec_type = cur.read_i32("dictionary record")?;
        match rec_type {
            REC_VARIABLE => read_variable_record(&mut cur, &mut variables)?,
            REC_VALUE_LABELS => {
                let count = cur.read_i32("value labels")?;
                for _ in 0..count.max(0) {
                    cur.skip(8, "value labels")?;
                    let label_len = *cur.take(1, "value labels")?.first().unwrap_or(&0) as usize;
                    // value + length byte + label are padded to 8-byte units
                    let padded = (label_len + 1 + 7) / 8 * 8 - 1;
                    cur.skip(padded, "value labels")?;
                }
            }
            REC_VALUE_LABEL_VARS => {
                let count = cur.read_i32("value label variables")?;
                cur.skip(count.max(0) as usize * 4, "value label variables")?;
            }
            REC_DOCUMENTS => {
                let lines = cur.read_i32("documents")?;
                cur.skip(lines.max(0) as usize * 80, "documents")?;
            }
            REC_EXTENSION => {
                let _subtype = cur.read_i32("extension record")?;
                let size = cur.read_i32("extension record")?.max(0) as usize;
                let count = cur.read_i32("extension record")?.max(0) as usize;
                cur.skip(size * count, "extension record")?;
            }
            REC_DICT_END => {
                cur.skip(4, "dictionary terminator")?;
                break;
            }
            other => return Err(SavError::UnexpectedRecord(other)),
        }
    }

    let mut data = TableData::empty();
    data.headers = variables.iter().map(|v| v.name.clone()).collect();
    if variables.is_empty() {
        return Ok(data);
    }

    let mut elements: Box<dyn ElementSource + '_> = if compression == 1 {
        Box::new(CompressedSource::new(cur, bias))
    } else {
        Box::new(RawSource { cur })
    };

    loop {
        if ncases >= 0 && data.rows.len() as i32 >= ncases {
            break;
        }
        match read_case(&variables, elements.as_mut())? {
            Some(row) => data.rows.push(row),
            None => break,
        }
    }

    Ok(data)
}

fn read_variable_record(cur: &mut Cursor<'_>, variables: &mut Vec<Variable>) -> Result<(), SavError> {
    let typ = cur.read_i32("variable record")?;
    let has_label = cur.read_i32("variable record")?;
    let n_missing = cur.read_i32("variable record")?;
    cur.skip(8, "variable record")?; // print and write formats
    let raw_name = cur.take(8, "variable record")?;

    if has_label != 0 {
        let len = cur.read_i32("variable label")?.max(0) as usize;
        cur.skip((len + 3) / 4 * 4, "variable label")?;
    }
    if n_missing != 0 {
        cur.skip(n_missing.unsigned_abs() as usize * 8, "missing values")?;
    }

    // typ == -1 marks a continuation slot of the preceding string variable;
    // it occupies case data but is not a variable of its own.
    if typ >= 0 {
        let name = String::from_utf8_lossy(raw_name)
            .trim_end_matches([' ', '\0'])
            .to_string();
        variables.push(Variable { name, width: typ });
    }
    Ok(())
}

/// One 8-byte unit of case data.
enum Element {
    Number(f64),
    Chunk([u8; 8]),
    Sysmis,
}

trait ElementSource {
    /// `None` only at a clean end of data, before a case has started.
    fn next(&mut self, numeric: bool) -> Result<Option<Element>, SavError>;
}

struct RawSource<'a> {
    cur: Cursor<'a>,
}

impl ElementSource for RawSource<'_> {
    fn next(&mut self, numeric: bool) -> Result<Option<Element>, SavError> {
        if self.cur.at_end() {
            return Ok(None);
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.cur.take(8, "case data")?);
        if numeric {
            let value = self.cur.decode_f64(raw);
            Ok(Some(if value == f64::MIN {
                Element::Sysmis
            } else {
                Element::Number(value)
            }))
        } else {
            Ok(Some(Element::Chunk(raw)))
        }
    }
}

/// Bytecode compression: command bytes come in blocks of eight, with the
/// literal 8-byte values for any `253` commands following their block.
struct CompressedSource<'a> {
    cur: Cursor<'a>,
    bias: f64,
    block: [u8; 8],
    next_code: usize,
    finished: bool,
}

impl<'a> CompressedSource<'a> {
    fn new(cur: Cursor<'a>, bias: f64) -> Self {
        CompressedSource {
            cur,
            bias,
            block: [0; 8],
            next_code: 8,
            finished: false,
        }
    }
}

impl ElementSource for CompressedSource<'_> {
    fn next(&mut self, numeric: bool) -> Result<Option<Element>, SavError> {
        loop {
            if self.finished {
                return Ok(None);
            }
            if self.next_code == 8 {
                if self.cur.at_end() {
                    return Ok(None);
                }
                self.block.copy_from_slice(self.cur.take(8, "case data")?);
                self.next_code = 0;
            }
            let code = self.block[self.next_code];
            self.next_code += 1;
            match code {
                0 => continue, // padding
                252 => {
                    self.finished = true;
                    return Ok(None);
                }
                253 => {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(self.cur.take(8, "case data")?);
                    return Ok(Some(if numeric {
                        Element::Number(self.cur.decode_f64(raw))
                    } else {
                        Element::Chunk(raw)
                    }));
                }
                254 => return Ok(Some(Element::Chunk(*b"        "))),
                255 => return Ok(Some(Element::Sysmis)),
                value => return Ok(Some(Element::Number(value as f64 - self.bias))),
            }
        }
    }
}

fn read_case(
    variables: &[Variable],
    elements: &mut dyn ElementSource,
) -> Result<Option<Vec<String>>, SavError> {
    let mut row = Vec::with_capacity(variables.len());
    for (i, var) in variables.iter().enumerate() {
        if var.is_string() {
            let mut raw = Vec::with_capacity(var.elements() * 8);
            for _ in 0..var.elements() {
                match elements.next(false)? {
                    Some(Element::Chunk(chunk)) => raw.extend_from_slice(&chunk),
                    Some(_) => return Err(SavError::MalformedCase),
                    None if i == 0 && raw.is_empty() => return Ok(None),
                    None => return Err(SavError::Truncated("case")),
                }
            }
            raw.truncate(var.width as usize);
            row.push(
                String::from_utf8_lossy(&raw)
                    .trim_end_matches([' ', '\0'])
                    .to_string(),
            );
        } else {
            match elements.next(true)? {
                Some(Element::Number(value)) => row.push(format_number(value)),
                Some(Element::Sysmis) => row.push(String::new()),
                Some(Element::Chunk(_)) => return Err(SavError::MalformedCase),
                None if i == 0 => return Ok(None),
                None => return Err(SavError::Truncated("case")),
            }
        }
    }
    Ok(Some(row))
}

/// Integral values render without a decimal point, everything else with
/// Rust's shortest float representation.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn header(case_size: i32, ncases: i32, compression: i32) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(HEADER_MAGIC);
        b.extend_from_slice(&[b' '; 60]);
        b.extend_from_slice(&2i32.to_le_bytes());
        b.extend_from_slice(&case_size.to_le_bytes());
        b.extend_from_slice(&compression.to_le_bytes());
        b.extend_from_slice(&0i32.to_le_bytes());
        b.extend_from_slice(&ncases.to_le_bytes());
        b.extend_from_slice(&100f64.to_le_bytes());
        b.extend_from_slice(&[b' '; 9 + 8 + 64]);
        b.extend_from_slice(&[0u8; 3]);
        b
    }

    fn variable(typ: i32, name: &str) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&REC_VARIABLE.to_le_bytes());
        b.extend_from_slice(&typ.to_le_bytes());
        b.extend_from_slice(&0i32.to_le_bytes()); // no label
        b.extend_from_slice(&0i32.to_le_bytes()); // no missing values
        b.extend_from_slice(&[0u8; 8]); // formats
        let mut padded = name.as_bytes().to_vec();
        padded.resize(8, b' ');
        b.extend_from_slice(&padded);
        b
    }

    fn string_variable(name: &str, width: i32) -> Vec<u8> {
        let mut b = variable(width, name);
        for _ in 1..(width as usize + 7) / 8 {
            b.extend_from_slice(&variable(-1, ""));
        }
        b
    }

    fn terminator() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&REC_DICT_END.to_le_bytes());
        b.extend_from_slice(&0i32.to_le_bytes());
        b
    }

    fn padded_str(s: &str, len: usize) -> Vec<u8> {
        let mut b = s.as_bytes().to_vec();
        b.resize(len, b' ');
        b
    }

    fn write_file(dir: &TempDir, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("data.sav");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn uncompressed_numeric_and_string() {
        let mut b = header(4, 2, 0);
        b.extend(string_variable("NAME", 10));
        b.extend(variable(0, "SCORE"));
        b.extend(variable(0, "BONUS"));
        b.extend(terminator());
        // case 1
        b.extend(padded_str("ada", 16));
        b.extend_from_slice(&3f64.to_le_bytes());
        b.extend_from_slice(&1.5f64.to_le_bytes());
        // case 2, bonus is system-missing
        b.extend(padded_str("grace", 16));
        b.extend_from_slice(&4f64.to_le_bytes());
        b.extend_from_slice(&f64::MIN.to_le_bytes());

        let dir = TempDir::new().unwrap();
        let data = read_sav(&write_file(&dir, &b)).unwrap();
        assert_eq!(data.headers, vec!["NAME", "SCORE", "BONUS"]);
        assert_eq!(
            data.rows,
            vec![
                vec!["ada", "3", "1.5"],
                vec!["grace", "4", ""],
            ]
        );
    }

    #[test]
    fn compressed_bias_literal_and_sysmis() {
        let mut b = header(1, 3, 1);
        b.extend(variable(0, "X"));
        b.extend(terminator());
        b.extend_from_slice(&[105, 253, 255, 252, 0, 0, 0, 0]);
        b.extend_from_slice(&0.5f64.to_le_bytes()); // literal for the 253

        let dir = TempDir::new().unwrap();
        let data = read_sav(&write_file(&dir, &b)).unwrap();
        assert_eq!(data.headers, vec!["X"]);
        assert_eq!(data.rows, vec![vec!["5"], vec!["0.5"], vec![""]]);
    }

    #[test]
    fn compressed_string_chunks() {
        let mut b = header(2, 1, 1);
        b.extend(string_variable("CITY", 12));
        b.extend(terminator());
        // two chunks: a literal followed by an all-spaces chunk
        b.extend_from_slice(&[253, 254, 252, 0, 0, 0, 0, 0]);
        b.extend_from_slice(b"helsinki");

        let dir = TempDir::new().unwrap();
        let data = read_sav(&write_file(&dir, &b)).unwrap();
        assert_eq!(data.rows, vec![vec!["helsinki"]]);
    }

    #[test]
    fn big_endian_file() {
        let mut b = Vec::new();
        b.extend_from_slice(HEADER_MAGIC);
        b.extend_from_slice(&[b' '; 60]);
        b.extend_from_slice(&2i32.to_be_bytes());
        b.extend_from_slice(&1i32.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&1i32.to_be_bytes());
        b.extend_from_slice(&100f64.to_be_bytes());
        b.extend_from_slice(&[b' '; 9 + 8 + 64]);
        b.extend_from_slice(&[0u8; 3]);
        b.extend_from_slice(&REC_VARIABLE.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&[0u8; 8]);
        b.extend_from_slice(&padded_str("Y", 8));
        b.extend_from_slice(&REC_DICT_END.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&7f64.to_be_bytes());

        let dir = TempDir::new().unwrap();
        let data = read_sav(&write_file(&dir, &b)).unwrap();
        assert_eq!(data.headers, vec!["Y"]);
        assert_eq!(data.rows, vec![vec!["7"]]);
    }

    #[test]
    fn skips_value_labels_documents_and_extensions() {
        let mut b = header(1, 1, 0);
        b.extend(variable(0, "X"));
        // value labels: one label, value 1.0, text "yes"
        b.extend_from_slice(&REC_VALUE_LABELS.to_le_bytes());
        b.extend_from_slice(&1i32.to_le_bytes());
        b.extend_from_slice(&1f64.to_le_bytes());
        b.push(3);
        b.extend(padded_str("yes", 7));
        b.extend_from_slice(&REC_VALUE_LABEL_VARS.to_le_bytes());
        b.extend_from_slice(&1i32.to_le_bytes());
        b.extend_from_slice(&1i32.to_le_bytes());
        // one document line
        b.extend_from_slice(&REC_DOCUMENTS.to_le_bytes());
        b.extend_from_slice(&1i32.to_le_bytes());
        b.extend(padded_str("a note", 80));
        // an extension record (e.g. machine integer info)
        b.extend_from_slice(&REC_EXTENSION.to_le_bytes());
        b.extend_from_slice(&3i32.to_le_bytes());
        b.extend_from_slice(&4i32.to_le_bytes());
        b.extend_from_slice(&2i32.to_le_bytes());
        b.extend_from_slice(&[0u8; 8]);
        b.extend(terminator());
        b.extend_from_slice(&9f64.to_le_bytes());

        let dir = TempDir::new().unwrap();
        let data = read_sav(&write_file(&dir, &b)).unwrap();
        assert_eq!(data.rows, vec![vec!["9"]]);
    }

    #[test]
    fn rejects_foreign_files() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, b"PK\x03\x04 definitely not a sav");
        assert!(matches!(read_sav(&path), Err(SavError::BadMagic)));
    }

    #[test]
    fn rejects_zlib_compressed() {
        let mut b = header(1, 1, 0);
        b[..4].copy_from_slice(ZSAV_MAGIC);
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_sav(&write_file(&dir, &b)),
            Err(SavError::ZlibCompressed)
        ));
    }
}
