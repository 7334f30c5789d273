use super::hybrid36::{self, Hybrid36Error};
use crate::core::io::traits::StructureFile;
use crate::core::models::chain::{SecondaryStructure, Span, TraceChain};
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const SERIAL_WIDTH: usize = 5;
const RESIDUE_WIDTH: usize = 4;
const CHAIN_ID: char = 'A';

#[derive(Debug, Error)]
pub enum TraceFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: TraceParseErrorKind,
    },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Numbering error: {0}")]
    Numbering(#[from] Hybrid36Error),
}

#[derive(Debug, Error)]
pub enum TraceParseErrorKind {
    #[error("Invalid number in columns {columns}: {source}")]
    InvalidNumber {
        columns: &'static str,
        source: Hybrid36Error,
    },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat {
        columns: &'static str,
        value: String,
    },
    #[error("Line is too short for {record} record")]
    LineTooShort { record: &'static str },
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

fn parse_number(
    line: &str,
    line_num: usize,
    start: usize,
    end: usize,
    columns: &'static str,
) -> Result<i64, TraceFileError> {
    let field = line.get(start..end).unwrap_or("");
    hybrid36::decode(field, end - start).map_err(|source| TraceFileError::Parse {
        line: line_num,
        kind: TraceParseErrorKind::InvalidNumber { columns, source },
    })
}

fn parse_coordinate(
    line: &str,
    line_num: usize,
    start: usize,
    end: usize,
    columns: &'static str,
) -> Result<f64, TraceFileError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| TraceFileError::Parse {
        line: line_num,
        kind: TraceParseErrorKind::InvalidFloat {
            columns,
            value: value.into(),
        },
    })
}

fn close_chain(current: &mut TraceChain, chains: &mut Vec<TraceChain>) {
    if !current.is_empty() {
        chains.push(std::mem::take(current));
    }
}

struct PendingSpan {
    kind: SecondaryStructure,
    start: i64,
    end: i64,
    line: usize,
}

/// PDB-style Ca trace records.
///
/// Each chain is written as consecutive `ATOM` records followed by `TER`, and
/// helix and sheet annotations follow as `HELIX` and `SHEET` records that
/// reference residue numbers. Residue numbers run across the whole file and
/// skip one number between chains; serial and residue numbers switch to
/// hybrid-36 once they outgrow their decimal columns.
pub struct TraceRecordFile;

impl TraceRecordFile {
    fn format_atom(serial: i64, residue: i64, point: &Point3<f64>) -> Result<String, TraceFileError> {
        Ok(format!(
            "ATOM  {}  CA  GLY {}{}    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00           C  ",
            hybrid36::encode(serial, SERIAL_WIDTH)?,
            CHAIN_ID,
            hybrid36::encode(residue, RESIDUE_WIDTH)?,
            point.x,
            point.y,
            point.z
        ))
    }

    fn format_span(
        kind: SecondaryStructure,
        start: i64,
        end: i64,
    ) -> Result<String, TraceFileError> {
        let start = hybrid36::encode(start, RESIDUE_WIDTH)?;
        let end = hybrid36::encode(end, RESIDUE_WIDTH)?;
        Ok(match kind {
            SecondaryStructure::Helix => format!(
                "HELIX    1   1 GLY {CHAIN_ID} {start}  GLY {CHAIN_ID} {end}  1"
            ),
            SecondaryStructure::Sheet => format!(
                "SHEET    1   A 6 GLY {CHAIN_ID}{start}  GLY {CHAIN_ID}{end}  0"
            ),
        })
    }

    fn resolve_span(
        pending: &PendingSpan,
        residue_index: &HashMap<i64, (usize, usize)>,
    ) -> Result<(usize, Span), TraceFileError> {
        let lookup = |residue: i64| {
            residue_index.get(&residue).copied().ok_or_else(|| {
                TraceFileError::Inconsistency(format!(
                    "{} record on line {} references unknown residue {}",
                    pending.kind, pending.line, residue
                ))
            })
        };
        let (start_chain, start) = lookup(pending.start)?;
        let (end_chain, end) = lookup(pending.end)?;
        if start_chain != end_chain {
            return Err(TraceFileError::Inconsistency(format!(
                "{} record on line {} spans more than one chain",
                pending.kind, pending.line
            )));
        }
        if start > end {
            return Err(TraceFileError::Inconsistency(format!(
                "{} record on line {} ends before it starts",
                pending.kind, pending.line
            )));
        }
        Ok((start_chain, Span::new(start, end)))
    }
}

impl StructureFile for TraceRecordFile {
    type Data = Vec<TraceChain>;
    type Error = TraceFileError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Data, Self::Error> {
        let mut chains: Vec<TraceChain> = Vec::new();
        let mut current = TraceChain::default();
        let mut last_residue: Option<i64> = None;
        let mut residue_index: HashMap<i64, (usize, usize)> = HashMap::new();
        let mut pending_spans = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            match slice_and_trim(&line, 0, 6) {
                "ATOM" => {
                    if line.len() < 54 {
                        return Err(TraceFileError::Parse {
                            line: line_num,
                            kind: TraceParseErrorKind::LineTooShort { record: "ATOM" },
                        });
                    }
                    let residue = parse_number(&line, line_num, 22, 26, "23-26")?;
                    let x = parse_coordinate(&line, line_num, 30, 38, "31-38")?;
                    let y = parse_coordinate(&line, line_num, 38, 46, "39-46")?;
                    let z = parse_coordinate(&line, line_num, 46, 54, "47-54")?;

                    if last_residue.is_some_and(|prev| residue != prev + 1) {
                        close_chain(&mut current, &mut chains);
                    }
                    let position = (chains.len(), current.len());
                    if residue_index.insert(residue, position).is_some() {
                        return Err(TraceFileError::Inconsistency(format!(
                            "Duplicate residue number {} on line {}",
                            residue, line_num
                        )));
                    }
                    current.points.push(Point3::new(x, y, z));
                    last_residue = Some(residue);
                }
                "TER" => {
                    close_chain(&mut current, &mut chains);
                    last_residue = None;
                }
                "HELIX" | "SHEET" => {
                    if line.len() < 37 {
                        return Err(TraceFileError::Parse {
                            line: line_num,
                            kind: TraceParseErrorKind::LineTooShort {
                                record: "HELIX/SHEET",
                            },
                        });
                    }
                    let (kind, start) = if line.starts_with("HELIX") {
                        (
                            SecondaryStructure::Helix,
                            parse_number(&line, line_num, 21, 25, "22-25")?,
                        )
                    } else {
                        (
                            SecondaryStructure::Sheet,
                            parse_number(&line, line_num, 22, 26, "23-26")?,
                        )
                    };
                    let end = parse_number(&line, line_num, 33, 37, "34-37")?;
                    pending_spans.push(PendingSpan {
                        kind,
                        start,
                        end,
                        line: line_num,
                    });
                }
                "END" => break,
                _ => {}
            }
        }
        close_chain(&mut current, &mut chains);

        for pending in &pending_spans {
            let (chain_index, span) = Self::resolve_span(pending, &residue_index)?;
            chains[chain_index].spans_mut(pending.kind).push(span);
        }
        Ok(chains)
    }

    fn write_to(data: &Self::Data, writer: &mut impl Write) -> Result<(), Self::Error> {
        let mut serial = 1;
        let mut offset = 0i64;
        let mut annotations = Vec::new();

        for chain in data {
            for (i, point) in chain.points.iter().enumerate() {
                writeln!(writer, "{}", Self::format_atom(serial, offset + i as i64 + 1, point)?)?;
                serial += 1;
            }
            writeln!(writer, "TER")?;

            for kind in [SecondaryStructure::Helix, SecondaryStructure::Sheet] {
                for span in chain.spans(kind) {
                    if span.end >= chain.len() || span.is_empty() {
                        return Err(TraceFileError::Inconsistency(format!(
                            "{} span {}-{} lies outside a chain of {} points",
                            kind,
                            span.start,
                            span.end,
                            chain.len()
                        )));
                    }
                    annotations.push((
                        kind,
                        offset + span.start as i64 + 1,
                        offset + span.end as i64 + 1,
                    ));
                }
            }
            offset += chain.len() as i64 + 1;
        }

        // All helices first, then all sheets.
        annotations.sort_by_key(|(kind, _, _)| *kind == SecondaryStructure::Sheet);
        for (kind, start, end) in annotations {
            writeln!(writer, "{}", Self::format_span(kind, start, end)?)?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_to_string(chains: &[TraceChain]) -> String {
        let mut buffer = Vec::new();
        TraceRecordFile::write_to(&chains.to_vec(), &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    fn read_from_str(content: &str) -> Result<Vec<TraceChain>, TraceFileError> {
        TraceRecordFile::read_from(&mut Cursor::new(content.as_bytes()))
    }

    fn straight_chain(n: usize, y: f64) -> TraceChain {
        TraceChain::new(
            (0..n)
                .map(|i| Point3::new(i as f64 * 3.8, y, -1.25))
                .collect(),
        )
    }

    #[test]
    fn atom_records_use_fixed_columns() {
        let chain = TraceChain::new(vec![Point3::new(1.5, -22.25, 103.0)]);
        let text = write_to_string(&[chain]);
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            "ATOM      1  CA  GLY A   1       1.500 -22.250 103.000  1.00  0.00           C  "
        );
        assert_eq!(&first[22..26], "   1");
        assert_eq!(&first[30..38], "   1.500");
    }

    #[test]
    fn residue_numbers_skip_one_between_chains() {
        let text = write_to_string(&[straight_chain(3, 0.0), straight_chain(2, 5.0)]);
        let residues: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("ATOM"))
            .map(|l| l[22..26].trim())
            .collect();
        assert_eq!(residues, vec!["1", "2", "3", "5", "6"]);
        assert_eq!(text.lines().filter(|l| *l == "TER").count(), 2);
    }

    #[test]
    fn span_records_place_numbers_in_their_columns() {
        let mut chain = straight_chain(12, 0.0);
        chain.helices.push(Span::new(1, 10));
        chain.sheets.push(Span::new(0, 2));
        let text = write_to_string(&[chain]);
        let helix = text.lines().find(|l| l.starts_with("HELIX")).unwrap();
        let sheet = text.lines().find(|l| l.starts_with("SHEET")).unwrap();
        assert_eq!(&helix[21..25], "   2");
        assert_eq!(&helix[33..37], "  11");
        assert_eq!(&sheet[22..26], "   1");
        assert_eq!(&sheet[33..37], "   3");
    }

    #[test]
    fn written_chains_read_back_with_annotations() {
        let mut first = straight_chain(12, 0.0);
        first.helices.push(Span::new(2, 11));
        let mut second = straight_chain(4, 9.5);
        second.sheets.push(Span::new(1, 3));
        let chains = vec![first, second];

        let parsed = read_from_str(&write_to_string(&chains)).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].len(), 12);
        assert_eq!(parsed[1].len(), 4);
        assert_eq!(parsed[0].helices, vec![Span::new(2, 11)]);
        assert_eq!(parsed[1].sheets, vec![Span::new(1, 3)]);
        for (a, b) in chains[1].points.iter().zip(&parsed[1].points) {
            assert!((a - b).norm() < 1e-3);
        }
    }

    #[test]
    fn residue_gap_without_ter_starts_new_chain() {
        let text = "\
ATOM      1  CA  GLY A   1       0.000   0.000   0.000  1.00  0.00           C
ATOM      2  CA  GLY A   2       3.800   0.000   0.000  1.00  0.00           C
ATOM      3  CA  GLY A   7      20.000   0.000   0.000  1.00  0.00           C
";
        let chains = read_from_str(text).unwrap();
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].len(), 2);
        assert_eq!(chains[1].len(), 1);
    }

    #[test]
    fn large_files_switch_to_hybrid36_numbering() {
        let chain = TraceChain::new(vec![Point3::origin(); 10_000]);
        let text = write_to_string(&[chain]);
        let last_atom = text.lines().filter(|l| l.starts_with("ATOM")).last().unwrap();
        assert_eq!(&last_atom[22..26], "A000");

        let parsed = read_from_str(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].len(), 10_000);
    }

    #[test]
    fn span_across_chains_is_inconsistent() {
        let text = "\
ATOM      1  CA  GLY A   1       0.000   0.000   0.000  1.00  0.00           C
TER
ATOM      2  CA  GLY A   3       3.800   0.000   0.000  1.00  0.00           C
TER
HELIX    1   1 GLY A    1  GLY A    3  1
";
        assert!(matches!(
            read_from_str(text),
            Err(TraceFileError::Inconsistency(_))
        ));
    }

    #[test]
    fn malformed_coordinate_reports_line_and_columns() {
        let text = "ATOM      1  CA  GLY A   1       0.000   abcde   0.000  1.00  0.00           C  \n";
        match read_from_str(text) {
            Err(TraceFileError::Parse {
                line: 1,
                kind: TraceParseErrorKind::InvalidFloat { columns, .. },
            }) => assert_eq!(columns, "39-46"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_input_yields_no_chains() {
        assert!(read_from_str("").unwrap().is_empty());
    }

    #[test]
    fn chains_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces.pdb");
        let mut chain = straight_chain(15, 2.0);
        chain.helices.push(Span::new(1, 12));
        let chains = vec![chain, straight_chain(4, -3.0)];

        TraceRecordFile::write_to_path(&chains, &path).unwrap();
        let parsed = TraceRecordFile::read_from_path(&path).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].helices, vec![Span::new(1, 12)]);
        assert_eq!(parsed[1].len(), 4);
    }
}
