//! Fixed-width report tables

use gclab_profiler::{format_duration, round_duration};
use std::io::{self, Write};
use std::time::Duration;

/// Left-aligned columns of fixed minimum width
pub struct Table {
    widths: Vec<usize>,
}

impl Table {
    /// Table with the given column widths
    pub fn new(widths: &[usize]) -> Self {
        Self {
            widths: widths.to_vec(),
        }
    }

    /// Write one row; extra cells beyond the declared widths are unpadded
    pub fn row<I, S>(&self, out: &mut dyn Write, cells: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut line = String::new();
        for (i, cell) in cells.into_iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            let width = self.widths.get(i).copied().unwrap_or(0);
            line.push_str(&format!("{:<width$}", cell.as_ref()));
        }
        writeln!(out, "{}", line.trim_end())
    }
}

/// Duration rounded to whole milliseconds
pub fn ms(d: Duration) -> String {
    format_duration(round_duration(d, Duration::from_millis(1)))
}

/// Duration rounded to whole microseconds
pub fn us(d: Duration) -> String {
    format_duration(round_duration(d, Duration::from_micros(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_padding() {
        let table = Table::new(&[6, 4]);
        let mut out = Vec::new();
        table.row(&mut out, ["GOGC", "GC", "tail"]).unwrap();
        table.row(&mut out, ["100", "12345"]).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "GOGC   GC   tail\n100    12345\n");
    }

    #[test]
    fn test_duration_cells() {
        assert_eq!(ms(Duration::from_micros(2600)), "3ms");
        assert_eq!(us(Duration::from_nanos(1400)), "1µs");
    }
}
