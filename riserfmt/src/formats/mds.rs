//! Modal shape files. The first line holds the number of modes and nodes,
//! the next lines one `mode frequency` pair per mode, and every line after
//! that a `mode segment shape` triple.

use indexmap::IndexMap;
use num::ToPrimitive;

use crate::extractor::*;
use crate::grammar::SectionGrammar;
use crate::issues::*;
use crate::normalize::LineFilter;
use crate::record::*;
use crate::rules::*;
use crate::tree::*;

/// Blank lines carry nothing.
pub const FILTER: LineFilter = LineFilter {
  comment_prefixes: &[],
  trim: true,
  skip_blank: true
};

/// No markers at all.
pub const GRAMMAR: SectionGrammar = SectionGrammar::FLAT;

/// The mode id at the start of every line.
const MODE: FieldSpec = FieldSpec::integer("mode");
/// The natural frequency, rad/s.
const NATURAL_FREQUENCY: FieldSpec = FieldSpec::real("natural_frequency");
/// The segment position.
const SEGMENT: FieldSpec = FieldSpec::real("segments");
/// The shape ordinate.
const SHAPE: FieldSpec = FieldSpec::real("mode_shape");

/// One mode as it is being read.
#[derive(Default)]
struct Mode {
  /// The natural frequency.
  frequency: Value,
  /// Segment positions.
  segments: Vec<Value>,
  /// Shape ordinates.
  shape: Vec<Value>
}

/// Reads the frequency and shape lines into a `modes` group.
#[derive(Default)]
struct ModalShapeDecoder {
  /// Lines seen so far.
  seen: usize,
  /// The declared number of modes.
  declared: usize,
  /// The modes, by id, in declaration order.
  modes: IndexMap<i64, Mode>
}

impl SectionDecoder for ModalShapeDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    self.seen += 1;
    if self.seen == 1 {
      self.declared = ctx.record.get("no_of_modes")
        .as_integer()
        .and_then(|n| n.to_usize())
        .unwrap_or(0);
      return LineResponse::Useless;
    }
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    let Value::Integer(id) = ctx.coerce(&MODE, tokens.first().copied()).unwrap_or_default() else {
      return LineResponse::Malformed;
    };
    if self.seen <= 1 + self.declared {
      let frequency = ctx.coerce(&NATURAL_FREQUENCY, tokens.get(1).copied())
        .unwrap_or_default();
      self.modes.insert(id, Mode { frequency, ..Default::default() });
      return LineResponse::Data;
    }
    let Some(mode) = self.modes.get_mut(&id) else {
      ctx.malformed(MODE.name, &id.to_string(), MalformedReason::UnknownKey);
      return LineResponse::Malformed;
    };
    mode.segments.push(ctx.coerce(&SEGMENT, tokens.get(1).copied()).unwrap_or_default());
    mode.shape.push(ctx.coerce(&SHAPE, tokens.get(2).copied()).unwrap_or_default());
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    ctx.record.declare_group("modes");
    for (id, mode) in self.modes {
      let mut rb = RecordBuilder::new();
      rb.set(MODE.name, id)
        .set(NATURAL_FREQUENCY.name, mode.frequency)
        .set(SEGMENT.name, Value::List(mode.segments))
        .set(SHAPE.name, Value::List(mode.shape));
      ctx.record.push_group("modes", rb.build());
    }
  }
}

/// Builds the decoder.
fn modal_shapes() -> Box<dyn SectionDecoder> {
  return Box::new(ModalShapeDecoder::default());
}

/// The whole schema.
pub const SCHEMA: Schema = Schema::rules(&[
  ExtractionRule::at(&[seg(HEADERS)], Strategy::Split {
    line: LineSelect::Index(0),
    cut: Cut::Keep,
    delimiter: Delimiter::Whitespace,
    columns: &[
      (Token::Nth(0), FieldSpec::integer("no_of_modes")),
      (Token::Nth(1), FieldSpec::integer("no_of_nodes")),
    ]
  }).expected(),
  ExtractionRule::at(&[seg(HEADERS)], Strategy::Decoder {
    name: "modal shapes",
    make: modal_shapes
  }),
]);

/// Nothing to resolve.
pub(crate) fn finish(
  _rb: &mut RecordBuilder,
  _tree: &SectionTree,
  _issues: &mut Vec<ParseIssue>
) {}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  #[test]
  fn shapes_are_grouped_by_mode() {
    let text = "2 3\n1 1.5\n2 2.0\n1 0.0 1.0\n1 2.0 0.5\n2 0.0 2.0\n";
    let f = RiserFile::parse_str(text, FileFormat::ModalShape);
    let rec = f.record();
    assert_eq!(rec.integer("no_of_modes"), Some(2));
    assert_eq!(rec.integer("no_of_nodes"), Some(3));
    assert_eq!(rec.group_len("modes"), 2);
    assert_eq!(rec.real("modes[1]/natural_frequency"), Some(1.5));
    assert_eq!(rec.get("modes[1]/mode_shape").reals(), [1.0, 0.5]);
    assert_eq!(rec.get("modes[1]/segments").reals(), [0.0, 2.0]);
    assert_eq!(rec.get("modes[2]/mode_shape").reals(), [2.0]);
    assert!(f.issues().is_empty());
  }

  #[test]
  fn unknown_modes_are_reported() {
    let text = "1 2\n1 0.7\n1 0.0 0.1\n9 0.5 0.2\n";
    let f = RiserFile::parse_str(text, FileFormat::ModalShape);
    assert_eq!(f.record().get("modes[1]/mode_shape").reals(), [0.1]);
    assert!(matches!(
      f.issues(),
      [ParseIssue::MalformedField { reason: MalformedReason::UnknownKey, .. }]
    ));
  }
}
