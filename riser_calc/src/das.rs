//! Calculators over structural input decks: load case summaries, soil, drag
//! amplification, wellhead stickup and the conductor/casing program.

use itertools::Itertools;
use nalgebra::Vector2;

use riserfmt::prelude::*;
use riserfmt::util::parse_real;

use crate::calculator::{CalcError, Calculator, round, rows};

/// Normal drag of a bare joint, the reference for the amplification factor.
pub const REFERENCE_DRAG: f64 = 1.2;

/// lb/ft² to psi.
const PSF_PER_PSI: f64 = 144.0;

/// slug/ft³ to ppg.
const PPG_PER_SLUG_FT3: f64 = 4.3;

/// The sum of every depth, p and y value of the first model's p-y curves.
/// It's a fingerprint, used to tell soil models apart at a glance.
pub fn soil_sum(rec: &Record) -> f64 {
  let Some(curves) = rec.record("models[1]/p_y_curves") else {
    return 0.0;
  };
  return curves.fields()
    .map(|(depth, curve)| {
      let depth = parse_real(depth).unwrap_or(0.0);
      let curve = curve.as_record();
      let p = curve.map(|c| c.get("p").reals().iter().sum::<f64>()).unwrap_or(0.0);
      let y = curve.map(|c| c.get("y").reals().iter().sum::<f64>()).unwrap_or(0.0);
      depth + p + y
    })
    .sum();
}

/// Soil fingerprint.
pub struct SoilSum;

impl Calculator for SoilSum {
  fn name(&self) -> &str {
    return "soil sum";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut rb = RecordBuilder::new();
    rb.set("soil_sum", soil_sum(rec));
    return Ok(rb.build());
  }
}

/// One row per load case, with the values engineers tabulate: durations,
/// tension in kips, fluids in field units, current and offset summaries,
/// disconnect phase and damping.
pub struct LoadCaseSummary;

impl LoadCaseSummary {
  /// Internal fluids, converted to psi and ppg for imperial decks.
  fn fluids(lc: &Record, units: UnitSystem, rb: &mut RecordBuilder) {
    let fluids = rows(lc, "internal_fluids")
      .map(|f| {
        let mut pressure = f.real("pressure").unwrap_or(0.0);
        let mut density = f.real("density").unwrap_or(0.0);
        if units == UnitSystem::Imperial {
          pressure /= PSF_PER_PSI;
          density = round(density * PPG_PER_SLUG_FT3, 2);
        }
        let mut out = RecordBuilder::new();
        out.set("level", f.real("level").unwrap_or(0.0))
          .set("density", density)
          .set("pressure", pressure)
          .set("axial_inertia", f.get("axial_inertia").clone());
        Value::Record(out.build())
      })
      .collect::<Vec<_>>();
    rb.set("internal_fluid_count", fluids.len() as i64);
    rb.set("internal_fluids", Value::List(fluids));
  }

  /// Average and surface current. Descending profiles start at the
  /// surface; ascending ones end there.
  fn current(lc: &Record, rb: &mut RecordBuilder) {
    let profile = rows(lc, "current_profile").collect::<Vec<_>>();
    let speeds = profile.iter().filter_map(|p| p.real("speed")).collect::<Vec<_>>();
    let average = if speeds.is_empty() {
      0.0
    } else {
      speeds.iter().sum::<f64>() / speeds.len() as f64
    };
    let surface = match lc.text("current_spec") {
      Some("DESCENDING") => profile.first(),
      Some(_) => profile.last(),
      None => None
    };
    rb.set("current_type", lc.get("current_type").clone())
      .set("current_spec", lc.get("current_spec").clone())
      .set("average_current", average)
      .set("surface_current", surface.and_then(|p| p.real("speed")).unwrap_or(0.0))
      .set("surface_current_direction", surface.and_then(|p| p.real("direction")));
  }

  /// Offset magnitude in the horizontal plane. It is negative when both
  /// components are.
  fn offset(lc: &Record, rb: &mut RecordBuilder) {
    let y = lc.real("offset_y");
    let z = lc.real("offset_z");
    let magnitude = y.zip(z).map(|(y, z)| {
      let m = round(Vector2::new(y, z).norm(), 2);
      if y < 0.0 && z < 0.0 { -m } else { m }
    });
    rb.set("offset", magnitude)
      .set("offset_y", y)
      .set("offset_z", z)
      .set("offset_option", lc.get("offset_option").clone());
  }

  /// Disconnect time, the number of whole wave periods before it and the
  /// wave phase at which it happens. Mud parameters only matter for a
  /// disconnect.
  fn disconnect(lc: &Record, rb: &mut RecordBuilder) {
    let time = lc.real("disconnect_time");
    let period = lc.real("wave_period").filter(|p| *p > 0.0);
    let (periods, phase) = match time.zip(period) {
      Some((t, p)) if t > p => {
        (Some((t / p).floor()), Some(round((t % p) / p * 360.0, 1)))
      },
      _ => (None, None)
    };
    rb.set("disconnect_time", time)
      .set("phase", phase)
      .set("periods_before_disconnect", periods);
    for field in [
      "bulk_modulus",
      "fanning_friction",
      "discharge_coeff_out",
      "discharge_coeff_in",
      "atmospheric_pressure",
    ] {
      let v = if time.is_some() { lc.get(field).clone() } else { Value::Null };
      rb.set(field, v);
    }
  }

  /// `set (coefficient), ` for every damping row.
  fn damping(lc: &Record) -> String {
    let text = rows(lc, "damping")
      .map(|d| format!(
        "{} ({}), ",
        d.text("set").unwrap_or_default(),
        d.get("coefficient")
      ))
      .join("");
    return if text.is_empty() { "No Damping".to_string() } else { text };
  }

  /// Summarises one load case. `first` is the first load case of the deck,
  /// whose RAO is inherited by cases that ask for it.
  fn summarise(
    lc: &Record,
    first: Option<&Record>,
    units: UnitSystem,
    root: &Record,
    soil: f64
  ) -> Record {
    let mut rb = RecordBuilder::new();
    rb.set("name", lc.get("name").clone())
      .set("database_start", root.get("database_start").clone())
      .set("soil_sum", soil);
    let fixed = lc.text("time_type") == Some("FIXED");
    let duration = lc.real("time_end")
      .zip(lc.real("time_start"))
      .filter(|_| fixed)
      .map(|(end, start)| round(end - start, 3));
    rb.set("time_type", lc.get("time_type").clone())
      .set("ramp", if fixed { lc.get("ramp").clone() } else { Value::Null })
      .set("duration", duration);
    Self::fluids(lc, units, &mut rb);
    let tension = lc.real("top_tension").map(|t| round(t / 1000.0, 1)).unwrap_or(0.0);
    rb.set("top_tension", tension);
    for field in [
      "wave_type", "wave_dir", "hs", "tp", "wave_amplitude", "wave_period",
      "wind_speed", "wind_dir",
      "eds", "tj_limit", "ten_limit", "ufj_limit", "lfj_limit", "wh_bm_limit",
      "riser_vms_limit", "cond_vms_limit",
    ] {
      rb.set(field, lc.get(field).clone());
    }
    Self::current(lc, &mut rb);
    let inherited = first
      .filter(|_| lc.flag("first_rao") == Some(true))
      .filter(|f| !f.get("rao").is_null() && !f.get("rao_type").is_null());
    let source = inherited.unwrap_or(lc);
    rb.set("rao", source.get("rao").clone())
      .set("rao_type", source.get("rao_type").clone());
    Self::disconnect(lc, &mut rb);
    Self::offset(lc, &mut rb);
    rb.set("damping", Self::damping(lc));
    return rb.build();
  }
}

impl Calculator for LoadCaseSummary {
  fn name(&self) -> &str {
    return "load case summary";
  }

  fn requires(&self) -> &[&str] {
    return &[UNIT_SYSTEM_FIELD];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let units = UnitSystem::of(rec)?;
    let soil = soil_sum(rec);
    let cases = rec.group("load_cases").map(|(_, lc)| lc).collect::<Vec<_>>();
    let first = cases.first().copied();
    let summaries = cases.iter()
      .enumerate()
      .map(|(i, lc)| {
        let first = if i == 0 { None } else { first };
        Value::Record(Self::summarise(lc, first, units, rec, soil))
      })
      .collect();
    let mut rb = RecordBuilder::new();
    rb.set("load_case_summaries", Value::List(summaries));
    return Ok(rb.build());
  }
}

/// Estimates the drag amplification factor from the first non-Reynolds
/// hydrodynamic set of a pup or slick joint, as its normal drag over that of
/// a bare joint.
pub struct DragAmplification;

impl Calculator for DragAmplification {
  fn name(&self) -> &str {
    return "drag amplification";
  }

  fn requires(&self) -> &[&str] {
    return &["models[1]/hydrodynamic_sets"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let sets = rec.require_record("models[1]/hydrodynamic_sets")?;
    let set = sets.fields()
      .filter_map(|(_, v)| v.as_record())
      .find(|s| {
        let name = s.text("set").unwrap_or_default();
        let reynolds = s.text("type").is_some_and(|t| t.contains("reynolds"));
        (name.contains("Slick Joint") || name.contains("Pup")) && !reynolds
      })
      .ok_or_else(|| CalcError::not_found("hydrodynamic set", "Pup/Slick Joint"))?;
    let drag = set.require_real("Normal Drag")?;
    let mut rb = RecordBuilder::new();
    rb.set("daf", round(drag / REFERENCE_DRAG, 3));
    return Ok(rb.build());
  }
}

/// Finds the element at the wellhead stickup: the lowest-numbered end of the
/// element set spanning both wellhead housings.
pub struct WellheadStickup;

impl Calculator for WellheadStickup {
  fn name(&self) -> &str {
    return "wellhead stickup";
  }

  fn requires(&self) -> &[&str] {
    return &["models[1]/element_sets"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let sets = rec.require_record("models[1]/element_sets")?;
    let (_, elements) = sets.fields()
      .find(|(name, _)| {
        let name = name.to_lowercase();
        name.contains("lpwh") && name.contains("hpwh")
      })
      .ok_or_else(|| CalcError::not_found("element set", "LPWH/HPWH"))?;
    let elements = elements.as_list().unwrap_or_default();
    let ends = elements.first().zip(elements.last())
      .and_then(|(a, b)| a.as_integer().zip(b.as_integer()))
      .ok_or_else(|| CalcError::invalid("element_sets", "wellhead set is empty"))?;
    let mut rb = RecordBuilder::new();
    rb.set("wh_stickup_element", ends.0.min(ends.1));
    return Ok(rb.build());
  }
}

/// Node elevations (x) of a model, by node number.
fn node_elevations(model: &Record) -> Vec<(i64, f64)> {
  return rows(model, "nodes")
    .filter_map(|n| n.integer("node").zip(n.real("x")))
    .collect();
}

/// Finds the masses hung at the lowest node(s) of the first model, which is
/// where the casing mass goes.
pub struct CasingMass;

impl Calculator for CasingMass {
  fn name(&self) -> &str {
    return "casing mass";
  }

  fn requires(&self) -> &[&str] {
    return &["models[1]/nodes"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let model = rec.require_record("models[1]")?;
    let nodes = node_elevations(model);
    let lowest = nodes.iter()
      .map(|(_, x)| *x)
      .min_by(f64::total_cmp)
      .ok_or_else(|| CalcError::invalid("nodes", "model has no nodes"))?;
    let lowest_nodes = nodes.iter()
      .filter(|(_, x)| *x == lowest)
      .map(|(n, _)| *n)
      .collect::<Vec<_>>();
    let masses = rows(model, "masses")
      .filter(|m| m.integer("node").is_some_and(|n| lowest_nodes.contains(&n)))
      .filter(|m| m.text("mass_type").is_some_and(|t| t.contains("MASS")))
      .map(|m| {
        let mut rb = RecordBuilder::new();
        rb.set("node", m.get("node").clone()).set("mass", m.get("mass").clone());
        Value::Record(rb.build())
      })
      .collect();
    let mut rb = RecordBuilder::new();
    rb.set("lowest_elevation", lowest)
      .set("lowest_nodes", Value::List(lowest_nodes.into_iter().map(Value::from).collect()))
      .set("casing_mass", Value::List(masses));
    return Ok(rb.build());
  }
}

/// Builds the conductor/casing program from the pipe-in-pipe element sets:
/// elevation span and diameters for each.
pub struct ConductorCasingProgram;

/// Position of the outer diameter in a geometric set.
const GEO_OD: usize = 9;
/// Position of the inner diameter in a geometric set.
const GEO_ID: usize = 6;

impl Calculator for ConductorCasingProgram {
  fn name(&self) -> &str {
    return "conductor casing program";
  }

  fn requires(&self) -> &[&str] {
    return &["models[1]/element_sets", "models[1]/nodes"];
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let model = rec.require_record("models[1]")?;
    let sets = model.require_record("element_sets")?;
    let nodes = node_elevations(model);
    let elevation = |node: Option<i64>| {
      return node.and_then(|n| nodes.iter().find(|(m, _)| *m == n)).map(|(_, x)| *x);
    };
    let mut program = RecordBuilder::new();
    let pip_sets = sets.fields().filter(|(name, _)| {
      let name = name.to_lowercase();
      name.contains("pip inner") || name.contains("pip outer")
    });
    for (name, elements) in pip_sets {
      let mut span = Vec::new();
      for element in elements.reals() {
        let Some(e) = rows(model, "elements").find(|e| e.real("element") == Some(element)) else {
          continue;
        };
        span.extend(elevation(e.integer("start_node")));
        span.extend(elevation(e.integer("end_node")));
      }
      let Some((start, end)) = span.iter().copied().minmax_by(f64::total_cmp).into_option() else {
        return Err(CalcError::invalid(name, "no element of the set has known nodes"));
      };
      let geo = model.get(&format!("geometric_sets/{}", name));
      let diameter = |i: usize| {
        return geo.as_list().and_then(|l| l.get(i)).cloned().unwrap_or_default();
      };
      let mut entry = RecordBuilder::new();
      entry.set("start_elevation", start)
        .set("end_elevation", end)
        .set("od", diameter(GEO_OD))
        .set("id", diameter(GEO_ID));
      program.set(name, entry.build());
    }
    let mut rb = RecordBuilder::new();
    rb.set("conductor_casing_program", program.build());
    return Ok(rb.build());
  }
}

#[cfg(test)]
mod tests {
  use riserfmt::prelude::*;
  use crate::prelude::*;

  const DECK: &str = "\
$ANALYSIS
*UNITS
UNITS=IMPERIAL
$MODEL
*NODE
1, -100.0, 0.0, 0.0
2, -100.0, 5.0, 0.0
3, 0.0, 0.0, 0.0
4, 50.0, 0.0, 0.0
*ELEMENT
1, 1, 3
2, 3, 4
3, 2, 3
*ELEMENT SETS
SET=Conductor PIP Inner
GEN=1,2
SET=LPWHH HPWHH
3
2
*GEOMETRIC SETS
SET=Conductor PIP Inner, TYPE=PIPE
1, 2, 3, 4, 5, 6, 19.5, 8, 9, 21.0
*HYDRODYNAMIC SETS
SET=Bare, TYPE=CONSTANT
1.0,1.0,1.0,1.0,1.0,0.0
SET=Pup Joint 10ft, TYPE=CONSTANT
1.5,1.0,1.0,1.0,1.0,0.0
*P-Y
DEPTH=10
1.0, 0.5
2.0, 0.5
*MASS
1, 12.5, MASS
2, 3.0, MASS
3, 99.0, MASS
$LOAD CASE
*DIRECTORY
DIRECTORY=\"case_01\"
*TIME
STEP=FIXED
0.0, 600.0, 0.1, 50.0
*INTERNAL FLUID
SET=_InternalFluid
0.0, 2.0, 144.0, 0, 0, 1
*TOP TENSION
SET=_Tensioner
1500000.0
*WAVE
TYPE=REGULAR
10.0, 12.0, 180.0
*CURRENT
TYPE=PIECEWISE LINEAR, DESCENDING
0.0, 2.0, 90.0
100.0, 1.0, 45.0
*RAO
Equivalent Wave Amp 6.5, Period 11.0
*TIME,DISCONNECT
130.0
*DRILLING MUD
SET=mud
1, 2.0e5, 0.01, 0.9, 0.8, 0, 14.7
*OFFSET
1, -30.0, -40.0
*DAMPING
set=damp1
0.05, 0.0, 0.0
set=damp2
0.1, 0.0, 0.0
$LOAD CASE
*DIRECTORY
DIRECTORY=case_02
*RAO
FIRSTRAO=YES
*OFFSET
1, 30.0, -40.0
$POSTPROCESSING
*DATABASE
FILE=db
100.0, 600.0
";

  fn deck() -> Record {
    return RiserFile::parse_str(DECK, FileFormat::Das).into_record();
  }

  #[test]
  fn load_case_summaries() {
    let out = LoadCaseSummary.run(&deck()).unwrap();
    let first = out.record("load_case_summaries[1]").unwrap();
    assert_eq!(first.text("name"), Some("case_01"));
    assert_eq!(first.real("database_start"), Some(100.0));
    assert_eq!(first.real("soil_sum"), Some(14.0));
    assert_eq!(first.real("duration"), Some(600.0));
    assert_eq!(first.real("ramp"), Some(50.0));
    assert_eq!(first.integer("internal_fluid_count"), Some(1));
    assert_eq!(first.real("internal_fluids[1]/pressure"), Some(1.0));
    assert_eq!(first.real("internal_fluids[1]/density"), Some(8.6));
    assert_eq!(first.real("top_tension"), Some(1500.0));
    assert_eq!(first.real("average_current"), Some(1.5));
    assert_eq!(first.real("surface_current"), Some(2.0));
    assert_eq!(first.real("surface_current_direction"), Some(90.0));
    assert_eq!(first.real("periods_before_disconnect"), Some(10.0));
    assert_eq!(first.real("phase"), Some(300.0));
    assert_eq!(first.real("bulk_modulus"), Some(2.0e5));
    assert_eq!(first.real("offset"), Some(-50.0));
    assert_eq!(first.text("damping"), Some("damp1 (0.05), damp2 (0.1), "));
    let second = out.record("load_case_summaries[2]").unwrap();
    assert_eq!(second.get("rao").reals(), [6.5, 11.0]);
    assert_eq!(second.text("rao_type"), Some("Equivalent Wave"));
    assert_eq!(second.real("offset"), Some(50.0));
    assert_eq!(second.real("top_tension"), Some(0.0));
    assert_eq!(second.real("average_current"), Some(0.0));
    assert!(second.get("duration").is_null());
    assert!(second.get("bulk_modulus").is_null());
    assert_eq!(second.text("damping"), Some("No Damping"));
  }

  #[test]
  fn summaries_need_units() {
    let rec = RiserFile::parse_str("$LOAD CASE\n*WIND\n1.0, 2.0\n", FileFormat::Das)
      .into_record();
    assert!(matches!(LoadCaseSummary.run(&rec), Err(CalcError::Missing(_))));
    assert_eq!(LoadCaseSummary.requires(), [UNIT_SYSTEM_FIELD]);
  }

  #[test]
  fn model_calculators() {
    let rec = deck();
    assert_eq!(SoilSum.run(&rec).unwrap().real("soil_sum"), Some(14.0));
    assert_eq!(DragAmplification.run(&rec).unwrap().real("daf"), Some(1.25));
    assert_eq!(WellheadStickup.run(&rec).unwrap().integer("wh_stickup_element"), Some(2));
    let casing = CasingMass.run(&rec).unwrap();
    assert_eq!(casing.real("lowest_elevation"), Some(-100.0));
    assert_eq!(casing.get("lowest_nodes").as_list().map(|l| l.len()), Some(2));
    assert_eq!(casing.real("casing_mass[2]/mass"), Some(3.0));
    let program = ConductorCasingProgram.run(&rec).unwrap();
    let pip = program.record("conductor_casing_program/Conductor PIP Inner").unwrap();
    assert_eq!(pip.real("start_elevation"), Some(-100.0));
    assert_eq!(pip.real("end_elevation"), Some(50.0));
    assert_eq!(pip.real("od"), Some(21.0));
    assert_eq!(pip.real("id"), Some(19.5));
  }

  #[test]
  fn no_pup_joint_no_daf() {
    let text = "$MODEL\n*HYDRODYNAMIC SETS\nSET=Bare, TYPE=CONSTANT\n1.0,1.0,1.0,1.0,1.0,0.0\n";
    let rec = RiserFile::parse_str(text, FileFormat::Das).into_record();
    assert!(matches!(DragAmplification.run(&rec), Err(CalcError::NotFound { .. })));
  }
}
