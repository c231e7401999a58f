use crate::domain::{ChiError, ChiResult, CombinedCurve};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const CURVE_COLUMN_WIDTH: usize = 16;
pub const CURVE_COLUMN_PRECISION: usize = 8;

/// Right-aligned scientific notation with a signed two-digit exponent,
/// e.g. `  1.50000000E+00`.
pub fn format_scientific_f64(value: f64, width: usize, precision: usize) -> String {
    let rendered = format!("{value:.precision$e}");
    let formatted = match rendered.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exponent) => {
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}E{sign}{:02}", exponent.abs())
            }
            Err(_) => rendered.clone(),
        },
        // NaN and infinities have no exponent part.
        None => rendered.clone(),
    };
    format!("{formatted:>width$}")
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Two-column `k chi` rendering with a `#` header line.
pub fn render_curve_columns(curve: &CombinedCurve) -> String {
    let mut rendered = format!(
        "# {:>width$} {:>width$}\n",
        "k",
        "chi",
        width = CURVE_COLUMN_WIDTH - 2
    );
    for (k, chi) in curve.points() {
        let _ = writeln!(
            rendered,
            "{} {}",
            format_scientific_f64(k, CURVE_COLUMN_WIDTH, CURVE_COLUMN_PRECISION),
            format_scientific_f64(chi, CURVE_COLUMN_WIDTH, CURVE_COLUMN_PRECISION)
        );
    }
    rendered
}

impl CombinedCurve {
    pub fn to_columns(&self) -> String {
        render_curve_columns(self)
    }

    pub fn write_columns(&self, path: impl AsRef<Path>) -> ChiResult<()> {
        let path = path.as_ref();
        write_text_artifact(path, &self.to_columns()).map_err(|source| {
            ChiError::internal(
                "IO.CURVE_WRITE",
                format!("failed to write curve '{}': {}", path.display(), source),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{format_scientific_f64, normalize_text_artifact, render_curve_columns};
    use crate::domain::CombinedCurve;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scientific_formatting_uses_signed_two_digit_exponents() {
        assert_eq!(format_scientific_f64(1.5, 12, 3), "   1.500E+00");
        assert_eq!(format_scientific_f64(-0.00025, 12, 3), "  -2.500E-04");
        assert_eq!(format_scientific_f64(0.0, 10, 2), "  0.00E+00");
        assert_eq!(format_scientific_f64(1.0e120, 10, 1), "  1.0E+120");
    }

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        assert_eq!(normalize_text_artifact("a\r\nb\rc"), "a\nb\nc\n");
        assert_eq!(normalize_text_artifact(""), "");
    }

    #[test]
    fn curve_columns_have_header_and_one_row_per_point() {
        let curve = CombinedCurve::new(vec![0.0, 0.5], vec![2.0, -2.0]);
        let rendered = render_curve_columns(&curve);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('#'));
        assert_eq!(lines[1], "  0.00000000E+00   2.00000000E+00");
        assert_eq!(lines[2], "  5.00000000E-01  -2.00000000E+00");
    }

    #[test]
    fn repeated_curve_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("chi.dat");
        let curve = CombinedCurve::new(vec![0.0, 0.05, 0.1], vec![0.1, 0.2, 0.3]);

        curve.write_columns(&path).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");
        curve.write_columns(&path).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert!(second.ends_with(b"\n"));
        assert!(!second.contains(&b'\r'));
    }

    #[test]
    fn unwritable_destination_is_reported() {
        let temp = TempDir::new().expect("tempdir should be created");
        let curve = CombinedCurve::new(vec![0.0], vec![0.0]);
        let error = curve
            .write_columns(temp.path().join("missing").join("chi.dat"))
            .expect_err("parent directory does not exist");
        assert_eq!(error.placeholder(), "IO.CURVE_WRITE");
    }
}
