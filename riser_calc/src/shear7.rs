//! Calculators over SHEAR7 input files: current statistics, S-N curve text
//! and the per-segment table that reduced velocities are worked out from.

use std::f64::consts::PI;

use itertools::Itertools;
use riserfmt::prelude::*;
use riserfmt::util::real_key;

use crate::calculator::{CalcError, Calculator, round, rows};
use crate::interp::Linear;

/// The lift coefficient used for every segment.
pub const CL_MAX: f64 = 0.7;
/// Sea water density, slug/ft³.
pub const RHO_FLUID: f64 = 63.981 * 0.031;
/// The Strouhal number used for the excitation frequency.
const OMEGA_STROUHAL: f64 = 0.18;
/// Turns rad/s into Hz, as the reports have always done it.
const OMEGA_TO_HZ: f64 = 0.1592;
/// Inches per foot.
const INCHES_PER_FOOT: f64 = 12.0;

/// The (depth, speed) points of the current profile.
fn current_points(rec: &Record) -> Vec<(f64, f64)> {
  return rows(rec, "current_profile")
    .filter_map(|p| Some((p.real("depth")?, p.real("speed")?)))
    .collect();
}

/// Extremes and mean of the current speeds, plus the profile as text. All
/// zero when there are no points.
pub struct CurrentStatistics;

impl Calculator for CurrentStatistics {
  fn name(&self) -> &str {
    return "current statistics";
  }

  fn requires(&self) -> &[&str] {
    return &["number_current_points"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let points = current_points(rec);
    let text = points.iter()
      .map(|(d, s)| format!("{},{}", real_key(*d), real_key(*s)))
      .join(",");
    let speeds = points.iter().map(|p| p.1);
    let (min, max) = speeds.clone()
      .minmax_by(f64::total_cmp)
      .into_option()
      .unwrap_or((0.0, 0.0));
    let mean = if points.is_empty() {
      0.0
    } else {
      round(speeds.sum::<f64>() / points.len() as f64, 4)
    };
    let mut rb = RecordBuilder::new();
    rb.set("current_text", text)
      .set("max_current", max)
      .set("min_current", min)
      .set("mean_current", mean)
      .set("number_current_points", rec.get("number_current_points").clone());
    return Ok(rb.build());
  }
}

/// Each S-N curve as `id,stress,cycles,stress,cycles,...`.
pub struct SnCurveText;

impl Calculator for SnCurveText {
  fn name(&self) -> &str {
    return "S-N curve text";
  }

  fn requires(&self) -> &[&str] {
    return &["sn_curves"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut texts = Vec::new();
    for curve in rows(rec, "sn_curves") {
      let id = curve.integer("id")
        .ok_or_else(|| CalcError::invalid("sn_curves", "curve without an id"))?;
      let pairs = curve.get("stress").reals().into_iter()
        .zip(curve.get("cycles").reals())
        .map(|(s, c)| format!("{},{}", real_key(s), real_key(c)));
      let text = std::iter::once(id.to_string()).chain(pairs).join(",");
      texts.push(Value::Text(text));
    }
    let mut rb = RecordBuilder::new();
    rb.set("sn_curves_text", Value::List(texts));
    return Ok(rb.build());
  }
}

/// Zone properties as functions of x/L.
struct ZoneProfile {
  /// Hydrodynamic diameter, in.
  diameter: Linear,
  /// Bending inertia.
  inertia: Linear,
  /// Mass per length in air.
  dry_mass: Linear,
  /// Mass per length in water.
  wet_mass: Linear,
  /// Strouhal number.
  st: Linear,
  /// Reduced velocity bandwidth.
  bandwidth: Linear
}

impl ZoneProfile {
  /// Samples every zone at its start and its end.
  fn of(rec: &Record) -> Result<Self, CalcError> {
    let mut zones = Vec::new();
    for zone in rows(rec, "section_properties") {
      let get = |field: &str| zone.real(field)
        .ok_or_else(|| CalcError::invalid("section_properties", format!("zone without {}", field)));
      let values = [
        get("hydro_diameter")?,
        get("inertia")?,
        get("dry_mass")?,
        get("wet_mass")?,
        get("st_code")?,
        get("bandwidth")?
      ];
      zones.push((get("start")?, values));
      zones.push((get("end")?, values));
    }
    if zones.is_empty() {
      return Err(CalcError::invalid("section_properties", "no zones"));
    }
    zones.sort_by(|a, b| a.0.total_cmp(&b.0));
    let column = |i: usize| Linear::new(zones.iter().map(|(x, v)| (*x, v[i])));
    return Ok(Self {
      diameter: column(0),
      inertia: column(1),
      dry_mass: column(2),
      wet_mass: column(3),
      st: column(4),
      bandwidth: column(5)
    });
  }
}

/// The current speed as a function of x/L. A profile that stops short of the
/// bottom drops to zero just below its last point.
fn current_profile(rec: &Record) -> Result<Linear, CalcError> {
  let mut points = current_points(rec);
  let Some(last) = points.last().copied() else {
    return Err(CalcError::invalid("current_profile", "no current points"));
  };
  let deepest = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
  if deepest < 1.0 {
    points.push((last.0 + 0.001, 0.0));
    points.push((1.0, 0.0));
  }
  return Ok(Linear::new(points));
}

/// Per-segment properties along the riser: the zone values and the current
/// interpolated at every segment end, and the reduced velocity band.
pub struct SegmentTable;

impl Calculator for SegmentTable {
  fn name(&self) -> &str {
    return "segment table";
  }

  fn requires(&self) -> &[&str] {
    return &["total_segments", "section_properties", "current_profile"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let n = rec.integer("total_segments")
      .filter(|n| *n > 0)
      .ok_or_else(|| CalcError::invalid("total_segments", "must be a positive integer"))?;
    let zones = ZoneProfile::of(rec)?;
    let current = current_profile(rec)?;
    let mut segments = Vec::new();
    for i in 0..=n {
      let x = i as f64 / n as f64;
      let at = |f: &Linear, field: &str| f.at(x).ok_or_else(|| CalcError::invalid(
        field,
        format!("x/L {} is outside the sampled range", x)
      ));
      let diameter = at(&zones.diameter, "section_properties")?;
      let speed = at(&current, "current_profile")?;
      let st = at(&zones.st, "section_properties")?;
      let bandwidth = at(&zones.bandwidth, "section_properties")?;
      let d = diameter / INCHES_PER_FOOT;
      let vr_crit = 1.0 / st;
      let mut rb = RecordBuilder::new();
      rb.set("x_over_l", x)
        .set("d", d)
        .set("inertia", at(&zones.inertia, "section_properties")?)
        .set("dry_mass", at(&zones.dry_mass, "section_properties")?)
        .set("wet_mass", at(&zones.wet_mass, "section_properties")?)
        .set("current", speed)
        .set("cl_max", CL_MAX)
        .set("rho_fluid", RHO_FLUID)
        .set("omega", ((2.0 * PI * OMEGA_STROUHAL * speed) / d) * OMEGA_TO_HZ)
        .set("st", st)
        .set("vr_crit", vr_crit)
        .set("bandwidth", bandwidth)
        .set("vr_min", vr_crit - (bandwidth / 2.0) * vr_crit)
        .set("vr_max", vr_crit + (bandwidth / 2.0) * vr_crit)
        .set_null("vr");
      segments.push(Value::Record(rb.build()));
    }
    let mut rb = RecordBuilder::new();
    rb.set("segments", Value::List(segments));
    return Ok(rb.build());
  }
}

/// Fills in the reduced velocity of every segment for one response
/// frequency. Needs the segment table.
pub struct ReducedVelocity {
  /// The response frequency, Hz.
  pub freq_hz: f64
}

impl Calculator for ReducedVelocity {
  fn name(&self) -> &str {
    return "reduced velocity";
  }

  fn requires(&self) -> &[&str] {
    return &["segments"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    if self.freq_hz.is_nan() || self.freq_hz <= 0.0 {
      return Err(CalcError::invalid("freq_hz", "must be positive"));
    }
    let mut segments = Vec::new();
    for seg in rows(rec, "segments") {
      let vr = match (seg.real("current"), seg.real("d")) {
        (Some(v), Some(d)) => Some(v / (self.freq_hz * d)).filter(|vr| vr.is_finite()),
        _ => None
      };
      let mut rb = RecordBuilder::new();
      rb.set("vr", vr);
      segments.push(Value::Record(seg.merged(&rb.build())));
    }
    let mut rb = RecordBuilder::new();
    rb.set("segments", Value::List(segments));
    return Ok(rb.build());
  }
}

#[cfg(test)]
mod tests {
  use riserfmt::prelude::*;
  use crate::prelude::*;

  fn close(a: Option<f64>, b: f64) -> bool {
    return a.is_some_and(|a| (a - b).abs() < 1e-9);
  }

  fn input() -> Record {
    let mut lines = vec![
      "*** BLOCK 2. STRUCTURAL DATA ***".to_string(),
      "1          structure type".to_string(),
      "1000.0     total length".to_string(),
      "4          number of segments".to_string(),
      "64.0".to_string(),
      "1.4e-5".to_string(),
      "0.003".to_string(),
      "500.0".to_string(),
      "2          number of zones".to_string(),
    ];
    for (range, diameter, band) in [
      ("  0.0, 0.5", "24.0", "0.4, 0.18, 1.0, 1"),
      ("  0.5, 1.0", "12.0", "0.2, 0.2, 1.0, 1")
    ] {
      lines.push(format!("{:<50}{}", range, "Zone"));
      lines.push(format!("  {}", diameter));
      lines.push("  500.0, 0.2, 0.1".to_string());
      lines.push("  1 1".to_string());
      lines.push(format!("  {}", band));
      lines.push("1.0,0.1,0.2,0.3,0.4,0.5".to_string());
    }
    lines.extend([
      "*** BLOCK 3. CURRENT DATA ***",
      "2, number of current points",
      "0.0, 2.0",
      "0.5, 1.0",
      "*** BLOCK 4. S-N CURVE DATA ***",
      "1   number of S-N curves",
      "1, 1   curve id and segments",
      "0.0  cutoff",
      "1.0e3, 1.0e9",
      "2.0e3, 1.0e7",
      "1.0, global SCF",
      "",
      "",
    ].map(String::from));
    return RiserFile::parse_str(&lines.join("\n"), FileFormat::Shear7Input).into_record();
  }

  #[test]
  fn current_and_curves() {
    let rec = input();
    let current = CurrentStatistics.run(&rec).unwrap();
    assert_eq!(current.text("current_text"), Some("0.0,2.0,0.5,1.0"));
    assert_eq!(current.real("max_current"), Some(2.0));
    assert_eq!(current.real("min_current"), Some(1.0));
    assert_eq!(current.real("mean_current"), Some(1.5));
    let sn = SnCurveText.run(&rec).unwrap();
    assert_eq!(sn.text("sn_curves_text[1]"), Some("1,1000.0,1000000000.0,2000.0,10000000.0"));
  }

  #[test]
  fn no_current_points_is_all_zero() {
    let mut rb = RecordBuilder::new();
    rb.set("number_current_points", 0_i64).set("current_profile", Value::List(vec![]));
    let current = CurrentStatistics.run(&rb.build()).unwrap();
    assert_eq!(current.text("current_text"), Some(""));
    assert_eq!(current.real("mean_current"), Some(0.0));
    assert_eq!(current.real("max_current"), Some(0.0));
  }

  #[test]
  fn segments_and_reduced_velocity() {
    let run = Pipeline::new()
      .stage(SegmentTable)
      .stage(ReducedVelocity { freq_hz: 0.5 })
      .run(&input());
    assert!(run.is_clean(), "{:?}", run.failure_report());
    let rec = run.record;
    assert_eq!(rec.list("segments").map(|s| s.len()), Some(5));
    // top of the riser
    assert!(close(rec.real("segments[1]/d"), 2.0));
    assert!(close(rec.real("segments[1]/current"), 2.0));
    assert!(close(rec.real("segments[1]/omega"), 2.0 * std::f64::consts::PI * 0.18 * 0.1592));
    assert!(close(rec.real("segments[1]/vr_crit"), 1.0 / 0.18));
    // on the zone boundary the upper zone wins
    assert!(close(rec.real("segments[3]/d"), 2.0));
    assert!(close(rec.real("segments[3]/current"), 1.0));
    // below the last current point the current is gone
    assert!(close(rec.real("segments[4]/d"), 1.0));
    assert!(close(rec.real("segments[4]/current"), 0.0));
    assert!(close(rec.real("segments[4]/vr_min"), 4.5));
    assert!(close(rec.real("segments[4]/vr_max"), 5.5));
    assert!(close(rec.real("segments[2]/vr"), 1.5));
    assert!(close(rec.real("segments[5]/x_over_l"), 1.0));
    assert_eq!(rec.real("segments[2]/cl_max"), Some(0.7));
  }

  #[test]
  fn frequency_must_be_positive() {
    let run = Pipeline::new()
      .stage(SegmentTable)
      .stage(ReducedVelocity { freq_hz: 0.0 })
      .run(&input());
    assert_eq!(run.failures.len(), 1);
    assert!(run.record.get("segments[1]/vr").is_null());
  }
}
