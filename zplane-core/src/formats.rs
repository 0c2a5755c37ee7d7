//! Text formats: saved filters, coefficient CSV and bulk signal tables.
//!
//! Saved filter (three lines):
//! ```text
//! zeros,poles
//! 0.5+0j,0.1-0.3j
//! 0.7+0.2j,0.7-0.2j
//! ```
//! Either root line may be empty. Complex values use the `a+bj` form of
//! [`crate::dsp::format_complex`]; the parenthesized `(a+bj)` variant is
//! accepted on load.
//!
//! Coefficient CSV: one row per named set, `name,v0,v1,...` for arrays and
//! `name,value` for scalars.
//!
//! Signal table: two numeric columns `time,amplitude`, comma separated, first
//! column strictly increasing. Blank lines and `#` comments are skipped, and
//! a non-numeric first line is treated as a header.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use num_complex::Complex64;
use tracing::info;

use crate::dsp::{format_complex, parse_complex};
use crate::error::{Result, ZplaneError};
use crate::sos::SosDecomposition;
use crate::transfer::FilterCoefficients;

/// Header line of a saved filter.
pub const FILTER_HEADER: &str = "zeros,poles";

// ------------------------------ Saved filters -----------------------------------

fn join_roots(roots: &[Complex64]) -> String {
    roots.iter().map(|z| format_complex(*z)).collect::<Vec<_>>().join(",")
}

/// Write the three-line filter layout.
pub fn write_filter<W: Write>(mut w: W, zeros: &[Complex64], poles: &[Complex64]) -> Result<()> {
    writeln!(w, "{FILTER_HEADER}")?;
    writeln!(w, "{}", join_roots(zeros))?;
    writeln!(w, "{}", join_roots(poles))?;
    w.flush()?;
    Ok(())
}

fn parse_root_line(line: &str, lineno: usize) -> Result<Vec<Complex64>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }
    line.split(',')
        .map(|field| {
            parse_complex(field).ok_or_else(|| ZplaneError::MalformedFilterFile {
                line: lineno,
                reason: format!("'{}' is not a complex number", field.trim()),
            })
        })
        .collect()
}

/// Undecodable text is a content problem on that line, not an I/O failure.
fn line_or(
    e: io::Error,
    lineno: usize,
    malformed: fn(usize, String) -> ZplaneError,
) -> ZplaneError {
    if e.kind() == ErrorKind::InvalidData {
        malformed(lineno, "line is not valid UTF-8".into())
    } else {
        ZplaneError::ExportIo(e)
    }
}

fn malformed_filter(line: usize, reason: String) -> ZplaneError {
    ZplaneError::MalformedFilterFile { line, reason }
}

fn malformed_signal(line: usize, reason: String) -> ZplaneError {
    ZplaneError::MalformedSignal { line, reason }
}

/// Parse the three-line filter layout into `(zeros, poles)`.
pub fn read_filter<R: BufRead>(r: R) -> Result<(Vec<Complex64>, Vec<Complex64>)> {
    let lines = r
        .lines()
        .enumerate()
        .map(|(i, l)| l.map_err(|e| line_or(e, i + 1, malformed_filter)))
        .collect::<Result<Vec<String>>>()?;
    let header = lines.first().map(|l| l.trim()).unwrap_or_default();
    if header != FILTER_HEADER {
        return Err(ZplaneError::MalformedFilterFile {
            line: 1,
            reason: format!("expected header '{FILTER_HEADER}', found '{header}'"),
        });
    }
    if lines.len() < 3 {
        return Err(ZplaneError::MalformedFilterFile {
            line: lines.len() + 1,
            reason: "expected a zeros line and a poles line".into(),
        });
    }
    if let Some(extra) = lines.iter().skip(3).position(|l| !l.trim().is_empty()) {
        return Err(ZplaneError::MalformedFilterFile {
            line: extra + 4,
            reason: "unexpected content after the poles line".into(),
        });
    }
    let zeros = parse_root_line(&lines[1], 2)?;
    let poles = parse_root_line(&lines[2], 3)?;
    Ok((zeros, poles))
}

pub fn save_filter_file(
    path: impl AsRef<Path>,
    zeros: &[Complex64],
    poles: &[Complex64],
) -> Result<()> {
    let path = path.as_ref();
    write_filter(BufWriter::new(File::create(path)?), zeros, poles)?;
    info!(path = %path.display(), zeros = zeros.len(), poles = poles.len(), "filter saved");
    Ok(())
}

pub fn load_filter_file(path: impl AsRef<Path>) -> Result<(Vec<Complex64>, Vec<Complex64>)> {
    let path = path.as_ref();
    let roots = read_filter(BufReader::new(File::open(path)?))?;
    info!(path = %path.display(), zeros = roots.0.len(), poles = roots.1.len(), "filter loaded");
    Ok(roots)
}

// ------------------------------ Coefficient CSV ---------------------------------

/// One named row of the coefficient export.
#[derive(Clone, Debug, PartialEq)]
pub enum ExportRow {
    Array(String, Vec<f64>),
    Scalar(String, f64),
}

impl ExportRow {
    pub fn name(&self) -> &str {
        match self {
            ExportRow::Array(n, _) | ExportRow::Scalar(n, _) => n,
        }
    }
}

/// Rows for the full realization: Direct-Form-II arrays, gain, order and one
/// row per cascaded section.
pub fn realization_rows(
    coeffs: &FilterCoefficients,
    gain: f64,
    sos: &SosDecomposition,
) -> Vec<ExportRow> {
    let mut rows = vec![
        ExportRow::Array("Numerator".into(), coeffs.numerator.clone()),
        ExportRow::Array("Denominator".into(), coeffs.denominator.clone()),
        ExportRow::Scalar("Gain".into(), gain),
        ExportRow::Scalar("Order".into(), coeffs.order() as f64),
    ];
    rows.extend(
        sos.sections()
            .iter()
            .enumerate()
            .map(|(i, s)| ExportRow::Array(format!("SOS{}", i + 1), s.to_vec())),
    );
    rows
}

pub fn write_coefficient_csv<W: Write>(mut w: W, rows: &[ExportRow]) -> Result<()> {
    for row in rows {
        match row {
            ExportRow::Array(name, values) => {
                write!(w, "{name}")?;
                for v in values {
                    write!(w, ",{v}")?;
                }
                writeln!(w)?;
            }
            ExportRow::Scalar(name, v) => writeln!(w, "{name},{v}")?,
        }
    }
    w.flush()?;
    Ok(())
}

pub fn export_coefficient_file(path: impl AsRef<Path>, rows: &[ExportRow]) -> Result<()> {
    let path = path.as_ref();
    write_coefficient_csv(BufWriter::new(File::create(path)?), rows)?;
    info!(path = %path.display(), rows = rows.len(), "realization exported");
    Ok(())
}

// ------------------------------ Signal tables -----------------------------------

/// Bulk input signal: sample times and amplitudes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignalTable {
    pub time: Vec<f64>,
    pub amplitude: Vec<f64>,
}

impl SignalTable {
    #[inline] pub fn len(&self) -> usize { self.amplitude.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.amplitude.is_empty() }

    /// Table with index times `0, 1, 2, ...`.
    pub fn from_amplitudes(amplitude: Vec<f64>) -> Self {
        let time = (0..amplitude.len()).map(|i| i as f64).collect();
        Self { time, amplitude }
    }
}

pub fn read_signal_table<R: BufRead>(r: R) -> Result<SignalTable> {
    let mut table = SignalTable::default();
    for (i, line) in r.lines().enumerate() {
        let lineno = i + 1;
        let line = line.map_err(|e| line_or(e, lineno, malformed_signal))?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let mut fields = text.split(',').map(str::trim);
        let first = fields.next().unwrap_or_default();
        let t = match first.parse::<f64>() {
            Ok(t) => t,
            Err(_) if lineno == 1 => continue,
            Err(_) => {
                return Err(ZplaneError::MalformedSignal {
                    line: lineno,
                    reason: format!("'{first}' is not a number"),
                })
            }
        };
        let second = fields.next().ok_or_else(|| ZplaneError::MalformedSignal {
            line: lineno,
            reason: "expected two columns".into(),
        })?;
        let x = second.parse::<f64>().map_err(|_| ZplaneError::MalformedSignal {
            line: lineno,
            reason: format!("'{second}' is not a number"),
        })?;
        if !(t.is_finite() && x.is_finite()) {
            return Err(malformed_signal(lineno, "non-finite value".into()));
        }
        if let Some(&prev) = table.time.last() {
            if t <= prev {
                return Err(ZplaneError::MalformedSignal {
                    line: lineno,
                    reason: format!("time {t} does not increase past {prev}"),
                });
            }
        }
        table.time.push(t);
        table.amplitude.push(x);
    }
    if table.is_empty() {
        return Err(ZplaneError::MalformedSignal { line: 0, reason: "no samples".into() });
    }
    Ok(table)
}

pub fn load_signal_file(path: impl AsRef<Path>) -> Result<SignalTable> {
    let path = path.as_ref();
    let table = read_signal_table(BufReader::new(File::open(path)?))?;
    info!(path = %path.display(), samples = table.len(), "signal loaded");
    Ok(table)
}

/// Write `index,input,output` rows of a replay.
pub fn write_replay_csv<W: Write>(mut w: W, input: &[f64], output: &[f64]) -> Result<()> {
    writeln!(w, "index,input,output")?;
    for (i, (x, y)) in input.iter().zip(output).enumerate() {
        writeln!(w, "{i},{x},{y}")?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sos::to_second_order_sections;
    use crate::transfer::to_coefficients;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn filter_file_layout() {
        let zeros = vec![c(0.5, 0.0), c(0.1, -0.3)];
        let poles = vec![c(0.7, 0.2), c(0.7, -0.2)];
        let mut buf = Vec::new();
        write_filter(&mut buf, &zeros, &poles).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text, "zeros,poles\n0.5+0j,0.1-0.3j\n0.7+0.2j,0.7-0.2j\n");

        let (z, p) = read_filter(buf.as_slice()).unwrap();
        assert_eq!(z, zeros);
        assert_eq!(p, poles);
    }

    #[test]
    fn filter_file_accepts_parenthesized_and_empty_lines() {
        let text = "zeros,poles\n\n(0.5+0j),(-0.25-0.5j)\n\n";
        let (z, p) = read_filter(text.as_bytes()).unwrap();
        assert!(z.is_empty());
        assert_eq!(p, vec![c(0.5, 0.0), c(-0.25, -0.5)]);
    }

    #[test]
    fn malformed_filter_files() {
        let cases = [
            ("", 1),
            ("poles,zeros\n\n\n", 1),
            ("zeros,poles\n0.5+0j\n", 3),
            ("zeros,poles\n0.5+0j,abc\n\n", 2),
            ("zeros,poles\n\n0.5+0j\nextra\n", 4),
        ];
        for (text, want_line) in cases {
            match read_filter(text.as_bytes()) {
                Err(ZplaneError::MalformedFilterFile { line, .. }) => {
                    assert_eq!(line, want_line, "{text:?}");
                }
                other => panic!("{text:?} -> {other:?}"),
            }
        }
    }

    #[test]
    fn undecodable_bytes_are_malformed_not_io() {
        let filter: &[u8] = b"zeros,poles\n0.5+0j\n\xff\xfe\n";
        match read_filter(filter) {
            Err(ZplaneError::MalformedFilterFile { line, .. }) => assert_eq!(line, 3),
            other => panic!("{other:?}"),
        }
        let signal: &[u8] = b"0,1.0\n1,\xc3\x28\n";
        match read_signal_table(signal) {
            Err(ZplaneError::MalformedSignal { line, .. }) => assert_eq!(line, 2),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn coefficient_rows() {
        let zeros = [c(-1.0, 0.0)];
        let poles = [c(0.5, 0.0)];
        let co = to_coefficients(&zeros, &poles, 0.5);
        let sos = to_second_order_sections(&zeros, &poles, 0.5);
        let rows = realization_rows(&co, 0.5, &sos);
        let names: Vec<&str> = rows.iter().map(ExportRow::name).collect();
        assert_eq!(names, ["Numerator", "Denominator", "Gain", "Order", "SOS1"]);

        let mut buf = Vec::new();
        write_coefficient_csv(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Numerator,0.5,0.5");
        assert_eq!(lines[1], "Denominator,1,-0.5");
        assert_eq!(lines[2], "Gain,0.5");
        assert_eq!(lines[3], "Order,1");
        assert_eq!(lines[4], "SOS1,0.5,0.5,0,1,-0.5,0");
    }

    #[test]
    fn signal_table_parsing() {
        let text = "time,amplitude\n0,0.5\n# comment\n\n1, -0.25\n2.5,1e-3,extra\n";
        let t = read_signal_table(text.as_bytes()).unwrap();
        assert_eq!(t.time, vec![0.0, 1.0, 2.5]);
        assert_eq!(t.amplitude, vec![0.5, -0.25, 1e-3]);
    }

    #[test]
    fn signal_table_errors() {
        let cases = [
            ("0,1\n0,2\n", 2),
            ("0,1\n1\n", 2),
            ("0,1\nx,2\n", 2),
            ("0,1\n1,nope\n", 2),
            ("", 0),
        ];
        for (text, want_line) in cases {
            match read_signal_table(text.as_bytes()) {
                Err(ZplaneError::MalformedSignal { line, .. }) => {
                    assert_eq!(line, want_line, "{text:?}");
                }
                other => panic!("{text:?} -> {other:?}"),
            }
        }
    }

    #[test]
    fn replay_csv() {
        let mut buf = Vec::new();
        write_replay_csv(&mut buf, &[1.0, 2.0], &[0.5, 1.25]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "index,input,output\n0,1,0.5\n1,2,1.25\n");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_filter_file("/nonexistent/zplane/filter.txt").unwrap_err();
        assert!(err.is_io(), "{err}");
    }
}
