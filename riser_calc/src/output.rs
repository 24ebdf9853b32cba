//! Calculators over solver output listings: vessel offset and heave, wave
//! summary, element tensions and pipe-in-pipe sections.

use nalgebra::{Vector2, Vector3};

use riserfmt::formats::output::FORCE_POSITIONS;
use riserfmt::prelude::*;

use crate::calculator::{CalcError, Calculator, round, rows};

/// Horizontal vessel offset, as a length and as a fraction of water depth.
/// No offset in the listing means none was applied.
pub struct VesselOffset;

impl Calculator for VesselOffset {
  fn name(&self) -> &str {
    return "vessel offset";
  }

  fn requires(&self) -> &[&str] {
    return &["water_depth"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let depth = rec.require_real("water_depth")?;
    if depth == 0.0 {
      return Err(CalcError::invalid("water_depth", "zero water depth"));
    }
    let offsets = rec.get("vessel_offsets").reals();
    let mut rb = RecordBuilder::new();
    match offsets.as_slice() {
      [_, y, z] => {
        let magnitude = Vector2::new(*y, *z).norm();
        rb.set("offset_magnitude", magnitude)
          .set("offset_perc_wd", round(magnitude / depth, 2));
      },
      _ => {
        rb.set_null("offset_magnitude").set("offset_perc_wd", 0.0);
      }
    }
    return Ok(rb.build());
  }
}

/// Vessel heave, from the motion range in DOF 1 of the vessel-driven node
/// nearest to the vessel reference point.
pub struct VesselHeave;

/// The coordinates of a node.
fn node_position(rec: &Record, node: i64) -> Option<Vector3<f64>> {
  let n = rows(rec, "nodes").find(|n| n.integer("node") == Some(node))?;
  return Some(Vector3::new(n.real("x")?, n.real("y")?, n.real("z")?));
}

/// The min/max range of a node in one DOF.
fn motion_range(rec: &Record, node: i64, dof: i64) -> Option<f64> {
  let s = rows(rec, "motion_statistics")
    .find(|s| s.integer("node") == Some(node) && s.integer("dof") == Some(dof))?;
  return Some(s.real("max")? - s.real("min")?);
}

impl VesselHeave {
  /// Computes the heave, if there is a vessel-driven node to compute it at.
  pub fn heave(rec: &Record) -> Option<f64> {
    let mut candidates = rows(rec, "vessel_bcs")
      .filter(|bc| bc.integer("dof") == Some(1))
      .filter_map(|bc| bc.integer("node"))
      .filter(|n| motion_range(rec, *n, 1).is_some())
      .collect::<Vec<_>>();
    candidates.dedup();
    let reference = rec.get("vessel_ref_point").reals();
    let [x, y, z] = reference.as_slice() else {
      // without a reference point the first node will do
      return candidates.first().and_then(|n| motion_range(rec, *n, 1));
    };
    let reference = Vector3::new(*x, *y, *z);
    let nearest = candidates.iter()
      .filter_map(|n| node_position(rec, *n).map(|p| (*n, (p - reference).norm())))
      .min_by(|a, b| a.1.total_cmp(&b.1))?;
    return motion_range(rec, nearest.0, 1).map(|h| round(h, 2));
  }
}

impl Calculator for VesselHeave {
  fn name(&self) -> &str {
    return "vessel heave";
  }

  fn requires(&self) -> &[&str] {
    return &["vessel_bcs", "motion_statistics"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let heave = Self::heave(rec)
      .ok_or_else(|| CalcError::not_found("vessel-driven node", "DOF 1"))?;
    let mut rb = RecordBuilder::new();
    rb.set("vessel_heave", heave);
    return Ok(rb.build());
  }
}

/// Regular wave parameters, with the amplitude turned into a range.
pub struct WaveSummary;

impl WaveSummary {
  /// The wave fields, null when the wave isn't regular.
  fn fields(rec: &Record, rb: &mut RecordBuilder) {
    let regular = rec.text("wave_type") == Some("regular");
    let pick = |field: &str| if regular { rec.real(field) } else { None };
    rb.set("wave_type", rec.get("wave_type").clone())
      .set("wave_range", pick("wave_amplitude").map(|a| a * 2.0))
      .set("wave_period", pick("wave_period"))
      .set("wave_direction", pick("wave_direction"));
  }
}

impl Calculator for WaveSummary {
  fn name(&self) -> &str {
    return "wave summary";
  }

  fn requires(&self) -> &[&str] {
    return &["wave_type"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut rb = RecordBuilder::new();
    Self::fields(rec, &mut rb);
    return Ok(rb.build());
  }
}

/// Min, max and mean restoring force of an element at one position.
pub struct TensionValues {
  /// The element number.
  pub element: i64,
  /// `Start`, `Midpoint` or `End`.
  pub position: String
}

impl TensionValues {
  /// Makes one, checking the position.
  pub fn new<S: Into<String>>(element: i64, position: S) -> Result<Self, CalcError> {
    let position = position.into();
    if !FORCE_POSITIONS.contains(&position.as_str()) {
      return Err(CalcError::invalid(
        "position",
        format!("must be one of {}", FORCE_POSITIONS.join(", "))
      ));
    }
    return Ok(Self { element, position });
  }
}

impl Calculator for TensionValues {
  fn name(&self) -> &str {
    return "tension values";
  }

  fn requires(&self) -> &[&str] {
    return &["restoring_forces"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let row = rows(rec, "restoring_forces")
      .find(|r| {
        r.integer("element") == Some(self.element)
          && r.text("position") == Some(self.position.as_str())
      })
      .ok_or_else(|| CalcError::not_found(
        "restoring force",
        format!("{} {}", self.element, self.position)
      ))?;
    let mut rb = RecordBuilder::new();
    rb.set("tension_min", row.get("min").clone())
      .set("tension_max", row.get("max").clone())
      .set("tension_mean", row.get("mean").clone());
    return Ok(rb.build());
  }
}

/// The pipe-in-pipe connections with the elevations of both nodes, sorted
/// by the elevation of the first.
pub struct PipSections;

impl Calculator for PipSections {
  fn name(&self) -> &str {
    return "pipe-in-pipe sections";
  }

  fn requires(&self) -> &[&str] {
    return &["pip_sections", "nodes"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let elevation = |node: Option<i64>| -> Result<f64, CalcError> {
      let node = node.ok_or_else(|| CalcError::invalid("pip_sections", "no node number"))?;
      return node_position(rec, node)
        .map(|p| p.x)
        .ok_or_else(|| CalcError::not_found("node", node));
    };
    let mut sections = Vec::new();
    for pip in rows(rec, "pip_sections") {
      let e1 = elevation(pip.integer("node_1"))?;
      let e2 = elevation(pip.integer("node_2"))?;
      sections.push((e1, e2, pip));
    }
    sections.sort_by(|a, b| a.0.total_cmp(&b.0));
    let table = sections.into_iter()
      .map(|(e1, e2, pip)| {
        let mut rb = RecordBuilder::new();
        rb.set("node_1", pip.get("node_1").clone())
          .set("node_2", pip.get("node_2").clone())
          .set("node_1_elevation", e1)
          .set("node_2_elevation", e2)
          .set("perpendicular_stiffness", pip.get("perpendicular_stiffness").clone());
        Value::Record(rb.build())
      })
      .collect();
    let mut rb = RecordBuilder::new();
    rb.set("pip_section_table", Value::List(table));
    return Ok(rb.build());
  }
}

/// One row per run: wave, heave, offset and convergence. Parts that can't be
/// worked out are left null.
pub struct RunSummary;

impl Calculator for RunSummary {
  fn name(&self) -> &str {
    return "run summary";
  }

  fn requires(&self) -> &[&str] {
    return &["converged"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut summary = RecordBuilder::new();
    WaveSummary::fields(rec, &mut summary);
    summary.set("heave", VesselHeave::heave(rec));
    let offset = VesselOffset.run(rec).ok().map(|o| o.get("offset_perc_wd").clone());
    summary.set("offset_perc_wd", offset.unwrap_or_default())
      .set("converged", rec.get("converged").clone())
      .set("start_time", rec.get("start_time").clone())
      .set("finish_time", rec.get("finish_time").clone())
      .set("no_constant_bcs", rec.get("no_constant_bcs").clone())
      .set("no_vessel_bcs", rec.get("no_vessel_bcs").clone())
      .set("pip_connections", rec.get("pip_connections").clone());
    let mut rb = RecordBuilder::new();
    rb.set("run_summary", summary.build());
    return Ok(rb.build());
  }
}

#[cfg(test)]
mod tests {
  use riserfmt::prelude::*;
  use crate::prelude::*;

  const LISTING: &str = "\
 *** UNIT SYSTEM ***
   Analysis performed in Imperial units
 *** STRUCTURAL DISCRETISATION DETAILS ***
   No. of Pipe-in-Pipe Connections       :     1
 *** NODAL DATA ***
   Node No.    X        Y      Z
     1      0.0     0.0    0.0
     2     50.0     0.0    0.0
     9     90.0     0.0    0.0
    10    100.0     0.0    0.0
 *** OCEAN ENVIRONMENT DATA ***
   Water depth
   5000.0  ft
 *** OUTPUT OF VESSEL MOTION DATA ***
   Initial Coordinates of Vessel Reference Point:  100.0  0.0  0.0
   Vessel Offset (Global Coordinates):  0.0 ft 300.0 ft 400.0 ft
 *** BOUNDARY CONDITION INPUT DATA ***
   No. of Constant Specified Displacements :  6
   No. of Attached Vessel Displacements    :  2
   DISPLACEMENTS SPECIFIED FROM MOTION OF ATTACHED FLOATING VESSEL
   Node  DOF
   ---------
      9   1
     10   1
 *** STATISTICS OF MOTION ***
   Node  DOF  Min  Max  Mean  Std
      9   1   -2.0   2.0   0.0  0.5
     10   1   -4.0   6.123   1.0  0.5
 *** SPECTRUM DISCRETISATION DATA ***
   Regular wave
   1   10.0  12.0  180.0
 *** STATISTICS OF ELEMENT RESTORING FORCES ***
   Element  Location  Min  Max  Mean  Std
     98  Start  0.0   10.0  50.0  30.0  1.0
         End  100.0  11.0  51.0  31.0  1.0
 *** PIPE-IN-PIPE CONNECTIONS DATA ***
   1  Fixed  10  2  5000.0
   2  Sliding  2  1  Curve
 Successful DeepRiser analysis
";

  fn listing() -> Record {
    return RiserFile::parse_str(LISTING, FileFormat::SolverOutput).into_record();
  }

  #[test]
  fn offset_and_heave() {
    let rec = listing();
    let offset = VesselOffset.run(&rec).unwrap();
    assert_eq!(offset.real("offset_magnitude"), Some(500.0));
    assert_eq!(offset.real("offset_perc_wd"), Some(0.1));
    let heave = VesselHeave.run(&rec).unwrap();
    assert_eq!(heave.real("vessel_heave"), Some(10.12));
  }

  #[test]
  fn waves_tensions_and_pips() {
    let rec = listing();
    let wave = WaveSummary.run(&rec).unwrap();
    assert_eq!(wave.real("wave_range"), Some(20.0));
    assert_eq!(wave.real("wave_direction"), Some(180.0));
    let end = TensionValues::new(98, "End").unwrap().run(&rec).unwrap();
    assert_eq!(end.real("tension_min"), Some(11.0));
    assert_eq!(end.real("tension_mean"), Some(31.0));
    assert!(TensionValues::new(98, "Middle").is_err());
    let missing = TensionValues::new(7, "Start").unwrap().run(&rec);
    assert!(matches!(missing, Err(CalcError::NotFound { .. })));
    let pips = PipSections.run(&rec).unwrap();
    assert_eq!(pips.integer("pip_section_table[1]/node_1"), Some(2));
    assert_eq!(pips.real("pip_section_table[1]/node_2_elevation"), Some(0.0));
    assert_eq!(pips.real("pip_section_table[2]/node_1_elevation"), Some(100.0));
    assert_eq!(pips.real("pip_section_table[2]/perpendicular_stiffness"), Some(5000.0));
  }

  #[test]
  fn run_summary_in_a_pipeline() {
    let run = Pipeline::new()
      .stage(VesselOffset)
      .stage(RunSummary)
      .run(&listing());
    assert!(run.is_clean());
    let summary = run.record.record("run_summary").unwrap();
    assert_eq!(summary.flag("converged"), Some(true));
    assert_eq!(summary.real("heave"), Some(10.12));
    assert_eq!(summary.real("offset_perc_wd"), Some(0.1));
    assert_eq!(summary.real("wave_period"), Some(12.0));
    assert_eq!(run.record.real("offset_magnitude"), Some(500.0));
  }

  #[test]
  fn no_offset_means_none_applied() {
    let rec = RiserFile::parse_str(
      " *** OCEAN ENVIRONMENT DATA ***\n   5000.0  ft\n",
      FileFormat::SolverOutput
    ).into_record();
    assert_eq!(VesselOffset.run(&rec).unwrap().real("offset_perc_wd"), Some(0.0));
  }
}
