//! Calculators over tabulated plot exports.

use riserfmt::prelude::*;

use crate::calculator::{CalcError, Calculator};

/// Envelope tables and the series holding their maxima, with the names of
/// the fields they feed.
const ENVELOPES: [(&str, &str, &str); 2] = [
  ("Envelope of Von Mises Stress", "Max-Von Mises Stress Envelope", "max_vms"),
  ("Envelope of Resultant Bending Moment", "Max-Resultant Bending Moment Envelope", "max_bm"),
];

/// The number in a `Table No.` title, e.g. 4 for `Table No.4 - Tension`.
pub fn table_number(title: &str) -> Option<i64> {
  let (_, rest) = title.split_once("No.")?;
  let digits = rest.trim_start()
    .chars()
    .take_while(char::is_ascii_digit)
    .collect::<String>();
  return digits.parse().ok();
}

/// The series of a table with the given name.
fn series_named<'r>(table: &'r Record, name: &str) -> Option<&'r Record> {
  return table.group("series")
    .map(|(_, s)| s)
    .find(|s| s.text("name") == Some(name));
}

/// The largest of some values, if there are any.
fn max_of(xs: &[f64]) -> Option<f64> {
  return xs.iter().copied().reduce(f64::max);
}

/// The maximum Von Mises stress and bending moment over the top and bottom
/// halves of the riser, and the riser length from the first envelope found.
pub struct EnvelopeMaxima;

impl Calculator for EnvelopeMaxima {
  fn name(&self) -> &str {
    return "envelope maxima";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut rb = RecordBuilder::new();
    let mut riser_length = None;
    for (_, table) in rec.group("tables") {
      let table_name = table.text("table_name").map(str::trim);
      for (envelope, series, field) in ENVELOPES {
        if table_name != Some(envelope) {
          continue;
        }
        let Some(series) = series_named(table, series) else {
          continue;
        };
        let xs = series.get("X").reals();
        let ys = series.get("Y").reals();
        // the split is by point count, not by elevation
        let mid = (ys.len() / 2).min(xs.len());
        rb.set(format!("{}_top", field), max_of(&xs[..mid]))
          .set(format!("{}_btm", field), max_of(&xs[mid..]));
        if riser_length.is_none() {
          riser_length = max_of(&ys)
            .zip(ys.iter().copied().reduce(f64::min))
            .map(|(hi, lo)| hi - lo)
            .filter(|l| *l != 0.0);
        }
      }
    }
    for (_, _, field) in ENVELOPES {
      rb.set_null(&format!("{}_top", field)).set_null(&format!("{}_btm", field));
    }
    rb.set("riser_length", riser_length);
    return Ok(rb.build());
  }
}

/// A series axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
  /// Horizontal.
  X,
  /// Vertical, usually elevation.
  #[default]
  Y
}

impl Axis {
  /// The series field holding this axis.
  pub fn field(self) -> &'static str {
    return match self {
      Self::X => "X",
      Self::Y => "Y"
    };
  }
}

/// Shifts one axis of every series of a table. The output carries all the
/// tables again, so it replaces them when merged.
pub struct OffsetElevations {
  /// The table title, as in the file.
  pub table: String,
  /// Added to every value.
  pub offset: f64,
  /// Which values.
  pub axis: Axis
}

impl OffsetElevations {
  /// A copy of a table with its series shifted.
  fn shifted(&self, table: &Record) -> Record {
    let mut rb = RecordBuilder::new();
    for (name, value) in table.fields() {
      rb.set(name, value.clone());
    }
    for group in table.group_names() {
      rb.declare_group(group);
      for (_, occurrence) in table.group(group) {
        if group != "series" {
          rb.push_group(group, occurrence.clone());
          continue;
        }
        let values = occurrence.get(self.axis.field()).reals()
          .into_iter()
          .map(|v| v + self.offset)
          .collect::<Vec<_>>();
        let mut axis = RecordBuilder::new();
        axis.set(self.axis.field(), values);
        rb.push_group(group, occurrence.merged(&axis.build()));
      }
    }
    return rb.build();
  }
}

impl Calculator for OffsetElevations {
  fn name(&self) -> &str {
    return "offset elevations";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut rb = RecordBuilder::new();
    rb.declare_group("tables");
    let mut found = false;
    for (_, table) in rec.group("tables") {
      if table.text("title") == Some(self.table.as_str()) {
        found = true;
        rb.push_group("tables", self.shifted(table));
      } else {
        rb.push_group("tables", table.clone());
      }
    }
    if !found {
      return Err(CalcError::not_found("table", &self.table));
    }
    return Ok(rb.build());
  }
}

#[cfg(test)]
mod tests {
  use riserfmt::prelude::*;
  use crate::prelude::*;

  const EXPORT: &str = "\
Table No. 3 - Envelope of Von Mises Stress
X-Axis: Von Mises Stress
Y-Axis: Elevation
Plot Data: Min-Von Mises Stress Envelope
0.5\t-100.0
Plot Data: Max-Von Mises Stress Envelope
10.0\t-100.0
30.0\t-50.0
20.0\t0.0
40.0\t50.0
Table No.7 - Envelope of Resultant Bending Moment
Plot Data: Max-Resultant Bending Moment Envelope
5.0\t0.0
1.0\t40.0
";

  fn export() -> Record {
    return RiserFile::parse_str(EXPORT, FileFormat::Tab).into_record();
  }

  #[test]
  fn table_numbers() {
    assert_eq!(table_number("Table No.4 - Tension"), Some(4));
    assert_eq!(table_number("Table No. 12 - Angles"), Some(12));
    assert_eq!(table_number("Table - Angles"), None);
  }

  #[test]
  fn envelope_maxima() {
    let out = EnvelopeMaxima.run(&export()).unwrap();
    assert_eq!(out.real("max_vms_top"), Some(30.0));
    assert_eq!(out.real("max_vms_btm"), Some(40.0));
    assert_eq!(out.real("max_bm_top"), Some(5.0));
    assert_eq!(out.real("max_bm_btm"), Some(1.0));
    assert_eq!(out.real("riser_length"), Some(150.0));
  }

  #[test]
  fn nothing_to_find() {
    let out = EnvelopeMaxima.run(&Record::new()).unwrap();
    assert!(out.has("max_bm_top"));
    assert!(out.get("max_bm_top").is_null());
    assert!(out.get("riser_length").is_null());
  }

  #[test]
  fn offsets_replace_one_table() {
    let calc = OffsetElevations {
      table: "Table No. 3 - Envelope of Von Mises Stress".to_string(),
      offset: 100.0,
      axis: Axis::Y
    };
    let base = export();
    let run = Pipeline::new().stage(calc).run(&base);
    assert!(run.is_clean());
    let rec = run.record;
    assert_eq!(rec.group_len("tables"), 2);
    assert_eq!(rec.get("tables[1]/series[2]/Y").reals(), [0.0, 50.0, 100.0, 150.0]);
    assert_eq!(rec.get("tables[1]/series[2]/X").reals(), [10.0, 30.0, 20.0, 40.0]);
    assert_eq!(rec.text("tables[1]/x_axis"), Some("Von Mises Stress"));
    assert_eq!(rec.get("tables[2]/series[1]/Y").reals(), [0.0, 40.0]);
    assert_eq!(base.get("tables[1]/series[1]/Y").reals(), [-100.0]);
    let missing = OffsetElevations { table: "Table No. 9".to_string(), offset: 1.0, axis: Axis::X };
    assert!(matches!(missing.run(&base), Err(CalcError::NotFound { what: "table", .. })));
  }
}
