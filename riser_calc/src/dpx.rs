//! Calculators over component configuration files. Components are found by
//! type or id; menus and options are read by their exact names since those
//! hold `/` often enough.

use itertools::Itertools;
use num::ToPrimitive;

use riserfmt::prelude::*;
use riserfmt::util::{parse_real, round_to};

use crate::calculator::{CalcError, Calculator};

/// The lines an unnamed auxiliary line row stands for, by position.
pub const DEFAULT_AUX_LINES: [&str; 4] = ["Choke", "Kill", "Mud Booster", "Hydraulic"];

/// Drilling riser joint properties.
const JOINT_PROPERTIES: &str = "Drilling Riser Joint - Properties|||";
/// Properties of BOPs and the like.
const DEFINED_PROPERTIES: &str = "Properties - Define |||";
/// The current profile table.
const PIECEWISE_CURRENT: &str = "Current - Piecewise Linear|||";
/// The stack-up of a riser.
const STORAGE_MENU: &str = "DR Storage Menu|||";
/// Regular wave parameters.
const REGULAR_AIRY: &str = "Regular Airy|||";
/// Irregular wave parameters.
const JONSWAP: &str = "Jonswap - Equal Area - Hs/Tp|||";
/// Drift-off analysis limits.
const DRIFT_OFF_LIMITS: &str = "Drift-Off/Weak Point Analysis - Limits |||";
/// Drift-off disconnect sequences.
const DRIFT_OFF_TIMINGS: &str = "Drift-Off/Weak Point Analysis - Timings|||";
/// Drift-off load cases.
const DRIFT_OFF_LOAD_CASES: &str = "Drift-Off/Weak Point Analysis - Load Cases |||";

/// Per component type, the menus and columns whose first rows add up to the
/// submerged weight. Types not listed weigh nothing.
const WEIGHT_MENUS: &[(&str, &[(&str, &str)])] = &[
  ("Drilling Riser Joint", &[
    (JOINT_PROPERTIES, "Weight in Water - W(water)"),
    ("Drilling Riser Joint - Buoyancy Foam|||", "Total Weight in Water"),
  ]),
  ("Rotating Control Device", &[
    ("RCD - Above Seal Properties|||", "Weight in Water - W(water)"),
    ("RCD - Seal Properties|||", "Weight in Water - W(water)"),
    ("RCD - Below Seal Properties|||", "Weight in Water - W(water)"),
  ]),
  ("Flex Joint", &[("Linear Properties - Define|||", "Weight in Water")]),
  ("LMRP", &[("Properties  -  Define|||", "Weight in Water")]),
  ("BOP", &[(DEFINED_PROPERTIES, "Weight in Water")]),
  ("Telescopic Joint", &[
    ("Outer Barrel Properties  -  Define|||", "Weight in Water"),
    ("Inner Barrel Properties - Define|||", "Weight in Water"),
  ]),
  ("Wellhead Connector", &[
    ("Wellhead - High Pressure Wellhead Housing Stickup|||", "Weight in Water"),
    ("Wellhead - HPWHH and LPWHH|||", "Weight in Water"),
  ]),
];

/// Jonswap menu columns and the fields they go to.
const JONSWAP_FIELDS: [(&str, &str); 8] = [
  ("Wave Height", "wave_height"),
  ("Peak Period", "peak_period"),
  ("Max Frequency Increment", "max_frequency_increment"),
  ("Cut-off Frequency", "cutoff_frequency"),
  ("Number of Harmonics", "number_of_harmonics"),
  ("Wave Directions", "wave_directions"),
  ("Dominant Direction", "dominant_direction"),
  ("Wave Spreading Exponent", "wave_spreading_exponent"),
];

/// Regular wave menu columns and the fields they go to.
const REGULAR_FIELDS: [(&str, &str); 3] = [
  ("Amplitude", "amplitude"),
  ("Wave Period", "wave_period"),
  ("Direction", "direction"),
];

/// The components of a type, in file order.
pub fn components_of_type<'r>(
  rec: &'r Record,
  kind: &'r str
) -> impl Iterator<Item = &'r Record> + 'r {
  return rec.group("components")
    .map(|(_, c)| c)
    .filter(move |c| c.text("type") == Some(kind));
}

/// The component with an id. Ids are text in component headers but a
/// reference to one may have been read as a number.
pub fn find_id<'r>(rec: &'r Record, id: &Value) -> Option<&'r Record> {
  return rec.group("components")
    .map(|(_, c)| c)
    .find(|c| {
      let Some(own) = c.text("id") else {
        return false;
      };
      return match id {
        Value::Text(t) => t == own,
        Value::Integer(_) | Value::Real(_) => parse_real(own) == id.as_real(),
        _ => false
      };
    });
}

/// The component with a name.
fn component_named<'r>(rec: &'r Record, name: &str) -> Result<&'r Record, CalcError> {
  return rec.group("components")
    .map(|(_, c)| c)
    .find(|c| c.text("name") == Some(name))
    .ok_or_else(|| CalcError::not_found("component", name));
}

/// The rows of a menu of a component, if it has that menu.
fn menu<'r>(component: &'r Record, name: &str) -> Option<Vec<&'r Record>> {
  let rows = component.record("menus")?.field(name).as_list()?;
  return Some(rows.iter().filter_map(Value::as_record).collect());
}

/// An option of a component, null if it isn't set.
fn option(component: &Record, name: &str) -> Value {
  return component.record("options")
    .map(|o| o.field(name).clone())
    .unwrap_or_default();
}

/// The component name, for output rows.
fn name_of(component: &Record) -> Value {
  return component.get("name").clone();
}

/// Dry and wet weights of every riser joint and BOP.
pub struct JointWeights;

impl Calculator for JointWeights {
  fn name(&self) -> &str {
    return "joint weights";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let joints = components_of_type(rec, "Drilling Riser Joint")
      .chain(components_of_type(rec, "BOP"));
    let mut out = Vec::new();
    for joint in joints {
      let weights = menu(joint, JOINT_PROPERTIES)
        .map(|m| (m, "Weight in Air - W(air)", "Weight in Water - W(water)"))
        .or_else(|| menu(joint, DEFINED_PROPERTIES).map(|m| (m, "Weight in Air", "Weight in Water")));
      let (dry, wet) = match weights {
        Some((rows, dry, wet)) => match rows.last() {
          Some(row) => (row.field(dry).clone(), row.field(wet).clone()),
          None => (Value::Null, Value::Null)
        },
        None => (Value::Null, Value::Null)
      };
      let mut rb = RecordBuilder::new();
      rb.set("name", name_of(joint))
        .set("type", joint.get("type").clone())
        .set("dry_weight", dry)
        .set("wet_weight", wet);
      out.push(Value::Record(rb.build()));
    }
    let mut rb = RecordBuilder::new();
    rb.set("joint_weights", Value::List(out));
    return Ok(rb.build());
  }
}

/// Whether each riser joint shares load with its choke and kill lines, and
/// the gap. Anything but `Yes` or `No` reads as `No`; no gap is zero.
pub struct LoadSharing;

impl Calculator for LoadSharing {
  fn name(&self) -> &str {
    return "load sharing";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut out = Vec::new();
    for joint in components_of_type(rec, "Drilling Riser Joint") {
      let row = menu(joint, JOINT_PROPERTIES)
        .and_then(|rows| rows.last().copied())
        .ok_or_else(|| CalcError::not_found("menu", JOINT_PROPERTIES))?;
      let sharing = match row.field("Load Sharing with Choke/Kill Line").as_text() {
        Some("Yes") => "Yes",
        _ => "No"
      };
      let gap = match row.field("Load Sharing Gap") {
        Value::Null => Value::Real(0.0),
        v => v.clone()
      };
      let mut rb = RecordBuilder::new();
      rb.set("name", name_of(joint))
        .set("load_sharing", sharing)
        .set("gap", gap);
      out.push(Value::Record(rb.build()));
    }
    let mut rb = RecordBuilder::new();
    rb.set("load_sharing", Value::List(out));
    return Ok(rb.build());
  }
}

/// The recoil type of every tensioner, with the anti-recoil valve closure
/// curve of the detailed hydro-pneumatic ones.
pub struct TensionerData;

impl Calculator for TensionerData {
  fn name(&self) -> &str {
    return "tensioner data";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut out = Vec::new();
    for tensioner in components_of_type(rec, "Tensioner") {
      let recoil = option(tensioner, "Tensioner Recoil Type - Options|||");
      let (mut stroke, mut closure) = (Vec::new(), Vec::new());
      if recoil.as_text() == Some("Detailed Hydro-Pneumatic") {
        let rows = menu(tensioner, "Anti-Recoil Valve - Closure Curve |||").unwrap_or_default();
        for row in rows {
          stroke.push(row.field("Cylinder Stroke").clone());
          closure.push(row.field("Valve Closure").clone());
        }
      }
      let mut rb = RecordBuilder::new();
      rb.set("name", name_of(tensioner))
        .set("recoil_type", recoil)
        .set("arv_stroke", Value::List(stroke))
        .set("arv_closure", Value::List(closure));
      out.push(Value::Record(rb.build()));
    }
    let mut rb = RecordBuilder::new();
    rb.set("tensioners", Value::List(out));
    return Ok(rb.build());
  }
}

/// The joints of a riser from top to bottom, one entry per joint, with their
/// submerged weights. The riser weight counts from the telescopic joint down,
/// BOP and LMRP excluded.
pub struct RiserStackup {
  /// The riser component name.
  pub riser: String
}

impl RiserStackup {
  /// The submerged weight of one joint of a component.
  fn weight(component: &Record) -> f64 {
    let kind = component.text("type").unwrap_or_default();
    let Some((_, menus)) = WEIGHT_MENUS.iter().find(|(t, _)| *t == kind) else {
      return 0.0;
    };
    return menus.iter()
      .filter_map(|(m, key)| menu(component, m)?.first()?.field(key).as_real())
      .sum();
  }
}

impl Calculator for RiserStackup {
  fn name(&self) -> &str {
    return "riser stack-up";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let riser = component_named(rec, &self.riser)?;
    let rows = menu(riser, STORAGE_MENU)
      .ok_or_else(|| CalcError::not_found("menu", STORAGE_MENU))?;
    let mut stackup = Vec::new();
    let mut riser_weight = 0.0;
    let mut below_tj = false;
    for row in rows {
      let id = row.field("Joint");
      let joint = find_id(rec, id).ok_or_else(|| CalcError::not_found("component id", id))?;
      let count = row.field("Number of Joints").as_real()
        .and_then(|n| n.to_usize())
        .ok_or_else(|| CalcError::invalid("Number of Joints", format!("not a count in {}", STORAGE_MENU)))?;
      let kind = joint.text("type").unwrap_or_default();
      let weight = Self::weight(joint);
      let mut rb = RecordBuilder::new();
      rb.set("name", name_of(joint))
        .set("weight", weight)
        .set("type", kind)
        .set("top_elevation", row.field("Top Elevation").clone())
        .set("bottom_elevation", row.field("Bottom Elevation").clone());
      let entry = Value::Record(rb.build());
      for _ in 0..count {
        if kind == "Telescopic Joint" {
          below_tj = true;
        }
        if below_tj && kind != "BOP" && kind != "LMRP" {
          riser_weight += weight;
        }
        stackup.push(entry.clone());
      }
    }
    let mut rb = RecordBuilder::new();
    rb.set("stackup", Value::List(stackup)).set("riser_weight", riser_weight);
    return Ok(rb.build());
  }
}

/// Type, speed units and surface speed of every current.
pub struct CurrentData;

impl Calculator for CurrentData {
  fn name(&self) -> &str {
    return "current data";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut out = Vec::new();
    for current in components_of_type(rec, "Current") {
      let surface = menu(current, PIECEWISE_CURRENT)
        .and_then(|rows| rows.first().map(|r| r.field("Velocity").clone()))
        .unwrap_or(Value::Integer(0));
      let mut rb = RecordBuilder::new();
      rb.set("name", name_of(current))
        .set("current_type", option(current, "Current Type|||"))
        .set("speed_units", option(current, "Current Speed Units|||"))
        .set("surface_current", surface);
      out.push(Value::Record(rb.build()));
    }
    let mut rb = RecordBuilder::new();
    rb.set("currents", Value::List(out));
    return Ok(rb.build());
  }
}

/// Every current profile on a common set of depths: one row per depth, one
/// speed per current, null where a current has no point at that depth.
pub struct CurrentProfiles;

impl Calculator for CurrentProfiles {
  fn name(&self) -> &str {
    return "current profiles";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let currents = components_of_type(rec, "Current").collect::<Vec<_>>();
    let profiles = currents.iter()
      .map(|c| {
        return menu(c, PIECEWISE_CURRENT)
          .unwrap_or_default()
          .into_iter()
          .filter_map(|r| Some((r.field("Distance Below Mean Waterline").as_real()?, r.field("Velocity"))))
          .collect::<Vec<_>>();
      })
      .collect::<Vec<_>>();
    let depths = profiles.iter()
      .flatten()
      .map(|(d, _)| *d)
      .sorted_by(f64::total_cmp)
      .dedup()
      .collect::<Vec<_>>();
    let table = depths.iter()
      .map(|depth| {
        let speeds = profiles.iter()
          .map(|p| {
            return p.iter()
              .rev()
              .find(|(d, _)| d == depth)
              .map(|(_, v)| (*v).clone())
              .unwrap_or_default();
          })
          .collect();
        let mut rb = RecordBuilder::new();
        rb.set("depth", *depth).set("speeds", Value::List(speeds));
        return Value::Record(rb.build());
      })
      .collect();
    let mut rb = RecordBuilder::new();
    rb.set("current_names", Value::List(currents.iter().map(|c| name_of(c)).collect()))
      .set("current_profiles", Value::List(table));
    return Ok(rb.build());
  }
}

/// The type of every wave, with its parameters: `Regular Airy`, `Jonswap -
/// Equal Area - Hs/Tp` or `Unknown`.
pub struct WaveTypes;

impl Calculator for WaveTypes {
  fn name(&self) -> &str {
    return "wave types";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut out = Vec::new();
    for wave in components_of_type(rec, "Wave") {
      let mut rb = RecordBuilder::new();
      rb.set("name", name_of(wave));
      let (kind, rows, fields) = if let Some(rows) = menu(wave, REGULAR_AIRY) {
        ("Regular Airy", rows, &REGULAR_FIELDS[..])
      } else if let Some(rows) = menu(wave, JONSWAP) {
        ("Jonswap - Equal Area - Hs/Tp", rows, &JONSWAP_FIELDS[..])
      } else {
        ("Unknown", Vec::new(), &[][..])
      };
      rb.set("wave_type", kind);
      let last = rows.last();
      for (column, field) in fields {
        rb.set(*field, last.map(|r| r.field(column).clone()).unwrap_or_default());
      }
      out.push(Value::Record(rb.build()));
    }
    let mut rb = RecordBuilder::new();
    rb.set("waves", Value::List(out));
    return Ok(rb.build());
  }
}

/// The name an auxiliary line row goes by: its own, or the default for its
/// position.
fn aux_line_name(row: &Record, index: usize) -> Option<String> {
  let own = row.field("Auxiliary Line").as_text().map(str::trim).unwrap_or_default();
  if !own.is_empty() {
    return Some(own.to_string());
  }
  return DEFAULT_AUX_LINES.get(index).map(|s| s.to_string());
}

/// The auxiliary lines of a riser with their internal diameters in feet.
pub struct AuxLineNames {
  /// The riser component name.
  pub riser: String
}

impl Calculator for AuxLineNames {
  fn name(&self) -> &str {
    return "auxiliary lines";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    const MENU: &str = "Auxiliary Line Properties  |||";
    let riser = component_named(rec, &self.riser)?;
    let rows = menu(riser, MENU).ok_or_else(|| CalcError::not_found("menu", MENU))?;
    let mut out = Vec::new();
    for (i, row) in rows.into_iter().enumerate() {
      let name = aux_line_name(row, i)
        .ok_or_else(|| CalcError::invalid("Auxiliary Line", format!("row {} has no name", i + 1)))?;
      let id = row.field("Internal Diameter, Di").as_real().map(|d| round_to(d / 12.0, 3));
      let mut rb = RecordBuilder::new();
      rb.set("name", name).set("id", id);
      out.push(Value::Record(rb.build()));
    }
    let mut rb = RecordBuilder::new();
    rb.set("aux_lines", Value::List(out));
    return Ok(rb.build());
  }
}

/// Labels auxiliary lines so that repeated names stay apart: every name gets
/// its occurrence number, e.g. `Choke (1)`, `Choke (2)`.
pub fn aux_line_labels<S: AsRef<str>>(names: &[S]) -> Vec<String> {
  return names.iter()
    .enumerate()
    .map(|(i, name)| {
      let name = name.as_ref();
      let n = names[..=i].iter().filter(|m| m.as_ref() == name).count();
      return format!("{} ({})", name, n);
    })
    .collect();
}

/// Internal fluid, level and auxiliary line pressures of every internal
/// fluid load case. Each load case gets a pressure for every line label seen
/// in any of them, null where it doesn't have that line.
pub struct InternalFluidLoadCases;

impl Calculator for InternalFluidLoadCases {
  fn name(&self) -> &str {
    return "internal fluid load cases";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let cases = components_of_type(rec, "Internal Fluid Load Case").collect::<Vec<_>>();
    let mut labels: Vec<String> = Vec::new();
    let mut pressures = Vec::with_capacity(cases.len());
    for case in &cases {
      let rows = menu(case, "Auxiliary Line Properties - Define|||").unwrap_or_default();
      let mut names = Vec::with_capacity(rows.len());
      for (i, row) in rows.iter().enumerate() {
        names.push(aux_line_name(row, i)
          .ok_or_else(|| CalcError::invalid("Auxiliary Line", format!("row {} has no name", i + 1)))?);
      }
      let local = aux_line_labels(&names)
        .into_iter()
        .zip(rows.iter().map(|r| r.field("Pressure").clone()))
        .collect::<Vec<_>>();
      for (label, _) in &local {
        if !labels.contains(label) {
          labels.push(label.clone());
        }
      }
      pressures.push(local);
    }
    let mut out = Vec::new();
    for (case, local) in cases.iter().zip(pressures) {
      let fluid = menu(case, "Internal Fluids - Define|||")
        .and_then(|rows| rows.last().copied())
        .ok_or_else(|| CalcError::not_found("menu", "Internal Fluids - Define|||"))?;
      let keel = menu(case, "Internal Fluid - Level Above Keel|||")
        .and_then(|rows| rows.last().map(|r| r.field("Level Above Keel").clone()))
        .filter(|v| !v.as_text().is_some_and(|t| t.eq_ignore_ascii_case("default")))
        .unwrap_or_default();
      let mut lines = RecordBuilder::new();
      for label in &labels {
        let p = local.iter().find(|(l, _)| l == label).map(|(_, p)| p.clone());
        lines.set(label.as_str(), p.unwrap_or_default());
      }
      let mut rb = RecordBuilder::new();
      rb.set("name", name_of(case))
        .set("internal_fluid", fluid.field("Internal Fluid").clone())
        .set("fluid_level", fluid.field("Fluid Level").clone())
        .set("level_above_keel", keel)
        .set("aux_pressures", lines.build());
      out.push(Value::Record(rb.build()));
    }
    let mut rb = RecordBuilder::new();
    rb.set("aux_line_labels", Value::List(labels.into_iter().map(Value::Text).collect()))
      .set("internal_fluid_load_cases", Value::List(out));
    return Ok(rb.build());
  }
}

/// The limits of every drift-off analysis, and the red alert to POD time of
/// the disconnect sequence its load cases use.
pub struct DriftOffLimits;

impl Calculator for DriftOffLimits {
  fn name(&self) -> &str {
    return "drift-off limits";
  }

  fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
    let mut out = Vec::new();
    for analysis in components_of_type(rec, "DriftOff-Weak Point Analysis") {
      let mut limits = RecordBuilder::new();
      if let Some(row) = menu(analysis, DRIFT_OFF_LIMITS).and_then(|rows| rows.last().copied()) {
        for (param, value) in row.fields() {
          limits.set(param, value.as_real());
        }
      }
      let timings = menu(analysis, DRIFT_OFF_TIMINGS).unwrap_or_default();
      let sequences = timings.iter()
        .enumerate()
        .map(|(i, row)| {
          let name = match row.field("EDS Timing Sequence") {
            Value::Null => format!("EDS {}", i + 1),
            Value::Text(t) if t.trim().is_empty() => format!("EDS {}", i + 1),
            v => v.to_string()
          };
          return (name, row.field("Red Alert to POD Time"));
        })
        .collect::<Vec<_>>();
      let eds = menu(analysis, DRIFT_OFF_LOAD_CASES)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|lc| {
          let wanted = lc.field("EDS Timing Sequences");
          if wanted.is_null() {
            return None;
          }
          let wanted = wanted.to_string();
          return sequences.iter().find(|(n, _)| *n == wanted).map(|(_, t)| (*t).clone());
        })
        .last()
        .unwrap_or_default();
      let mut rb = RecordBuilder::new();
      rb.set("name", name_of(analysis))
        .set("limits", limits.build())
        .set("eds", eds);
      out.push(Value::Record(rb.build()));
    }
    let mut rb = RecordBuilder::new();
    rb.set("drift_off", Value::List(out));
    return Ok(rb.build());
  }
}
