//! Text-file persistence for shares and triple material.
//!
//! Scalar file: one decimal line. Vector file: a count line, then one decimal
//! per line. Triple file: a count line, then `a,b,c` lines. Writes replace
//! the target atomically (write to a sibling temp file, then rename) unless
//! append is requested.
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use log::trace;
use tempfile::NamedTempFile;

use crate::party::error::{MpcError, MpcResult};

use super::{BeaverTriple, SharePair, SharePairVec, TripleVec};

fn write_content(path: &Path, content: &str, append: bool) -> MpcResult<()> {
    if append {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(content.as_bytes())?;
    } else {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path).map_err(|persist_err| MpcError::IoError(persist_err.error))?;
    }
    trace!("wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

pub fn write_value(path: &Path, value: u32, append: bool) -> MpcResult<()> {
    write_content(path, &format!("{}\n", value), append)
}

pub fn write_vector(path: &Path, values: &[u32], append: bool) -> MpcResult<()> {
    let mut content = String::new();
    content.push_str(&values.len().to_string());
    content.push('\n');
    for value in values {
        content.push_str(&value.to_string());
        content.push('\n');
    }
    write_content(path, &content, append)
}

pub fn write_triples(path: &Path, triples: &[BeaverTriple], append: bool) -> MpcResult<()> {
    let mut content = String::new();
    content.push_str(&triples.len().to_string());
    content.push('\n');
    for t in triples {
        content.push_str(&format!("{},{},{}\n", t.a, t.b, t.c));
    }
    write_content(path, &content, append)
}

fn parse_word(token: &str) -> MpcResult<u32> {
    token
        .trim()
        .parse::<u32>()
        .map_err(|_| MpcError::ParseError(format!("invalid integer '{}'", token.trim())))
}

fn read_lines(path: &Path) -> MpcResult<Vec<String>> {
    let file = File::open(path)?;
    let lines: Result<Vec<String>, _> = BufReader::new(file).lines().collect();
    Ok(lines?)
}

fn read_count(lines: &[String], path: &Path) -> MpcResult<usize> {
    let first = lines.first().ok_or_else(|| {
        MpcError::ParseError(format!("{}: missing element count line", path.display()))
    })?;
    Ok(parse_word(first)? as usize)
}

pub fn read_value(path: &Path) -> MpcResult<u32> {
    let lines = read_lines(path)?;
    let first = lines
        .first()
        .ok_or_else(|| MpcError::ParseError(format!("{}: empty file", path.display())))?;
    parse_word(first)
}

pub fn read_vector(path: &Path) -> MpcResult<Vec<u32>> {
    let lines = read_lines(path)?;
    let count = read_count(&lines, path)?;
    if lines.len() < count + 1 {
        return Err(MpcError::ParseError(format!(
            "{}: expected {} values, found {}",
            path.display(),
            count,
            lines.len() - 1
        )));
    }
    lines[1..count + 1].iter().map(|line| parse_word(line)).collect()
}

pub fn read_triples(path: &Path) -> MpcResult<TripleVec> {
    let lines = read_lines(path)?;
    let count = read_count(&lines, path)?;
    if lines.len() < count + 1 {
        return Err(MpcError::ParseError(format!(
            "{}: expected {} triples, found {}",
            path.display(),
            count,
            lines.len() - 1
        )));
    }
    lines[1..count + 1]
        .iter()
        .map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 3 {
                return Err(MpcError::ParseError(format!(
                    "{}: expected 'a,b,c', got '{}'",
                    path.display(),
                    line
                )));
            }
            Ok(BeaverTriple::new(
                parse_word(fields[0])?,
                parse_word(fields[1])?,
                parse_word(fields[2])?,
            ))
        })
        .collect()
}

/// Writes one party's share to each path (dealer convenience).
pub fn export_share(path_p0: &Path, path_p1: &Path, share: &SharePair) -> MpcResult<()> {
    write_value(path_p0, share.0, false)?;
    write_value(path_p1, share.1, false)
}

pub fn export_share_vec(path_p0: &Path, path_p1: &Path, shares: &SharePairVec) -> MpcResult<()> {
    write_vector(path_p0, &shares.0, false)?;
    write_vector(path_p1, &shares.1, false)
}

pub fn export_triple_shares(
    path_p0: &Path,
    path_p1: &Path,
    shares: &(TripleVec, TripleVec),
) -> MpcResult<()> {
    write_triples(path_p0, &shares.0, false)?;
    write_triples(path_p1, &shares.1, false)
}

#[cfg(test)]
mod test {
    use std::fs;

    use rand::RngCore;
    use tempfile::tempdir;

    use crate::party::error::MpcError;
    use crate::rng::SecureRng;
    use crate::share::additive::AdditiveSharing;
    use crate::share::BeaverTriple;

    use super::*;

    #[test]
    fn value_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scalar.dat");
        write_value(&path, 0xDEADBEEF, false).unwrap();
        assert_eq!(read_value(&path).unwrap(), 0xDEADBEEF);
        // overwrite replaces, it does not extend
        write_value(&path, 7, false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "7\n");
    }

    #[test]
    fn vector_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vector.dat");
        let mut rng = SecureRng::seed_from_u64(99);
        let values: Vec<u32> = (0..1024).map(|_| rng.next_u32()).collect();
        write_vector(&path, &values, false).unwrap();
        assert_eq!(read_vector(&path).unwrap(), values);
    }

    #[test]
    fn triple_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("triples.dat");
        let engine = AdditiveSharing::new(32).unwrap();
        let mut rng = SecureRng::seed_from_u64(100);
        let triples = engine.generate_triples(&mut rng, 64);
        write_triples(&path, &triples, false).unwrap();
        assert_eq!(read_triples(&path).unwrap(), triples);
    }

    #[test]
    fn append_extends_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.dat");
        write_value(&path, 1, false).unwrap();
        write_value(&path, 2, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n2\n");
        // readers only consume the leading record
        assert_eq!(read_value(&path).unwrap(), 1);
    }

    #[test]
    fn export_writes_both_sides() {
        let dir = tempdir().unwrap();
        let p0 = dir.path().join("x.p0.dat");
        let p1 = dir.path().join("x.p1.dat");
        export_share(&p0, &p1, &(17, 25)).unwrap();
        assert_eq!(read_value(&p0).unwrap(), 17);
        assert_eq!(read_value(&p1).unwrap(), 25);

        let engine = AdditiveSharing::new(16).unwrap();
        let mut rng = SecureRng::seed_from_u64(101);
        let triples = engine.generate_triples(&mut rng, 8);
        let shared = engine.share_triples(&mut rng, &triples);
        let t0 = dir.path().join("bt.p0.dat");
        let t1 = dir.path().join("bt.p1.dat");
        export_triple_shares(&t0, &t1, &shared).unwrap();
        assert_eq!(read_triples(&t0).unwrap(), shared.0);
        assert_eq!(read_triples(&t1).unwrap(), shared.1);
    }

    #[test]
    fn malformed_files_are_parse_errors() {
        let dir = tempdir().unwrap();

        let not_a_number = dir.path().join("nan.dat");
        fs::write(&not_a_number, "forty-two\n").unwrap();
        assert!(matches!(read_value(&not_a_number), Err(MpcError::ParseError(_))));

        let short_vector = dir.path().join("short.dat");
        fs::write(&short_vector, "5\n1\n2\n").unwrap();
        assert!(matches!(read_vector(&short_vector), Err(MpcError::ParseError(_))));

        let short_triple = dir.path().join("pair.dat");
        fs::write(&short_triple, "1\n3,4\n").unwrap();
        assert!(matches!(read_triples(&short_triple), Err(MpcError::ParseError(_))));

        let empty = dir.path().join("empty.dat");
        fs::write(&empty, "").unwrap();
        assert!(matches!(read_value(&empty), Err(MpcError::ParseError(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.dat");
        assert!(matches!(read_value(&path), Err(MpcError::IoError(_))));
        assert!(matches!(read_vector(&path), Err(MpcError::IoError(_))));
        assert!(matches!(read_triples(&path), Err(MpcError::IoError(_))));
    }

    #[test]
    fn shared_vector_survives_persistence() {
        // dealer flow: split, export both sides, re-load, recombine
        let dir = tempdir().unwrap();
        let engine = AdditiveSharing::new(32).unwrap();
        let mut rng = SecureRng::seed_from_u64(102);
        let clear: Vec<u32> = (0..256).map(|_| rng.next_u32()).collect();
        let shares = engine.share_vec(&mut rng, &clear);
        let p0 = dir.path().join("vec.p0.dat");
        let p1 = dir.path().join("vec.p1.dat");
        export_share_vec(&p0, &p1, &shares).unwrap();
        let s_0 = read_vector(&p0).unwrap();
        let s_1 = read_vector(&p1).unwrap();
        let recombined: Vec<u32> = s_0
            .iter()
            .zip(&s_1)
            .map(|(a, b)| a.wrapping_add(*b))
            .collect();
        assert_eq!(recombined, clear);
    }

    #[test]
    fn triple_display_matches_file_row() {
        let t = BeaverTriple::new(3, 5, 15);
        assert_eq!(format!("{}", t), "(3, 5, 15)");
    }
}
