//! G-code instruction model and line parser.

use tracing::debug;

/// One line of a G-code file, parsed into an op code and optional parameters.
///
/// Parsing never fails hard: a line the parser cannot fully understand keeps
/// `parsed = false` and its original text, so it can be passed through to the
/// output byte-for-byte instead of being mangled or dropped.
#[derive(Clone, Debug, Default)]
pub struct Gcode {
    /// Original line text, unmodified.
    pub line: String,
    /// 1-based line number in the source file.
    pub line_no: u64,
    /// True when the whole line parsed cleanly.
    pub parsed: bool,
    /// Operation code, uppercased. Empty for blank or comment-only lines.
    pub op: String,

    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    /// Extrusion distance or target.
    pub e: Option<f64>,
    /// Arc center offsets (timing for arcs is unsupported, but the values
    /// are still captured).
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub k: Option<f64>,
    pub s: Option<f64>,
    /// Feedrate, converted to units per second at parse time.
    pub f: Option<f64>,
    pub p: Option<f64>,
    pub r: Option<f64>,

    /// Text after the first `;`, without the semicolon.
    pub comment: Option<String>,
}

/// Parameter tokenizer state. A one-character token is a prefix letter whose
/// value arrives in the next token ("X 12.5"); anything longer carries both
/// ("X12.5").
enum ParamState {
    AwaitingPrefix,
    AwaitingValue(char),
}

impl Gcode {
    /// Parses one raw line.
    pub fn parse(line: &str, line_no: u64) -> Self {
        let mut g = Gcode {
            line: line.to_string(),
            line_no,
            ..Default::default()
        };

        let mut body = line;
        if let Some(idx) = body.find(';') {
            g.comment = Some(body[idx + 1..].to_string());
            body = &body[..idx];
        }

        let mut tokens = body.split_whitespace();
        let Some(op) = tokens.next() else {
            return g;
        };
        g.op = op.to_ascii_uppercase();

        let mut state = ParamState::AwaitingPrefix;
        for token in tokens {
            let (prefix, value) = match state {
                ParamState::AwaitingPrefix => {
                    let mut chars = token.chars();
                    let Some(first) = chars.next() else {
                        continue;
                    };
                    let rest = chars.as_str();
                    if rest.is_empty() {
                        state = ParamState::AwaitingValue(first);
                        continue;
                    }
                    (first, rest)
                }
                ParamState::AwaitingValue(prefix) => (prefix, token),
            };

            let Ok(value) = value.parse::<f64>() else {
                debug!(line_no, token = value, "failed to parse parameter value");
                return g;
            };
            if !g.assign(prefix, value) {
                debug!(line_no, prefix = %prefix, "unknown parameter prefix");
                return g;
            }
            state = ParamState::AwaitingPrefix;
        }
        // A dangling trailing prefix letter with no value is ignored.

        g.parsed = true;
        g
    }

    /// Stores a parameter value under its prefix letter. Returns false for a
    /// letter the engine does not recognize.
    fn assign(&mut self, prefix: char, value: f64) -> bool {
        match prefix.to_ascii_uppercase() {
            'X' => self.x = Some(value),
            'Y' => self.y = Some(value),
            'Z' => self.z = Some(value),
            'E' => self.e = Some(value),
            'I' => self.i = Some(value),
            'J' => self.j = Some(value),
            'K' => self.k = Some(value),
            'S' => self.s = Some(value),
            // Files carry feedrates in units per minute; the engine's time
            // arithmetic is per second.
            'F' => self.f = Some(value / 60.0),
            'P' => self.p = Some(value),
            'R' => self.r = Some(value),
            _ => return false,
        }
        true
    }

    /// True for the motion ops, linear and curved.
    pub fn is_move(&self) -> bool {
        Self::is_move_op(&self.op)
    }

    pub fn is_move_op(op: &str) -> bool {
        matches!(op, "G0" | "G1" | "G2" | "G3")
    }

    /// True when any parameter letter carried a value.
    pub fn has_params(&self) -> bool {
        self.x.is_some()
            || self.y.is_some()
            || self.z.is_some()
            || self.e.is_some()
            || self.i.is_some()
            || self.j.is_some()
            || self.k.is_some()
            || self.s.is_some()
            || self.f.is_some()
            || self.p.is_some()
            || self.r.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_move() {
        let g = Gcode::parse("G1 X10.5 Y-2 E0.42", 1);
        assert!(g.parsed);
        assert_eq!(g.op, "G1");
        assert_eq!(g.x, Some(10.5));
        assert_eq!(g.y, Some(-2.0));
        assert_eq!(g.e, Some(0.42));
        assert_eq!(g.z, None);
    }

    #[test]
    fn test_parse_lowercase() {
        let g = Gcode::parse("g1 x5 y6", 1);
        assert!(g.parsed);
        assert_eq!(g.op, "G1");
        assert_eq!(g.x, Some(5.0));
        assert_eq!(g.y, Some(6.0));
    }

    #[test]
    fn test_parse_feedrate_converted_to_per_second() {
        let g = Gcode::parse("G1 X10 F600", 1);
        assert!(g.parsed);
        assert_eq!(g.f, Some(10.0));
    }

    #[test]
    fn test_parse_detached_prefix() {
        // A prefix letter separated from its value by whitespace.
        let g = Gcode::parse("G1 X 10 Y 20", 1);
        assert!(g.parsed);
        assert_eq!(g.x, Some(10.0));
        assert_eq!(g.y, Some(20.0));
    }

    #[test]
    fn test_parse_dangling_prefix_ignored() {
        let g = Gcode::parse("G1 X10 Y", 1);
        assert!(g.parsed);
        assert_eq!(g.x, Some(10.0));
        assert_eq!(g.y, None);
    }

    #[test]
    fn test_parse_strips_comment() {
        let g = Gcode::parse("G1 X1 ; outer wall", 7);
        assert!(g.parsed);
        assert_eq!(g.x, Some(1.0));
        assert_eq!(g.comment.as_deref(), Some(" outer wall"));
        assert_eq!(g.line, "G1 X1 ; outer wall");
    }

    #[test]
    fn test_parse_comment_only_line_is_unparsed() {
        let g = Gcode::parse("; just a comment", 3);
        assert!(!g.parsed);
        assert_eq!(g.op, "");
        assert_eq!(g.comment.as_deref(), Some(" just a comment"));
        assert_eq!(g.line, "; just a comment");
    }

    #[test]
    fn test_parse_empty_line_is_unparsed() {
        let g = Gcode::parse("", 1);
        assert!(!g.parsed);
        assert_eq!(g.line, "");
    }

    #[test]
    fn test_parse_bad_number_aborts_whole_line() {
        let g = Gcode::parse("G1 X1 Ynope", 1);
        assert!(!g.parsed);
        // The partial parse is irrelevant; the original line survives.
        assert_eq!(g.line, "G1 X1 Ynope");
    }

    #[test]
    fn test_parse_unknown_prefix_aborts_whole_line() {
        let g = Gcode::parse("G1 X1 Q5", 1);
        assert!(!g.parsed);
        assert_eq!(g.line, "G1 X1 Q5");
    }

    #[test]
    fn test_is_move() {
        assert!(Gcode::parse("G0 X1", 1).is_move());
        assert!(Gcode::parse("G2 X1 I1", 1).is_move());
        assert!(!Gcode::parse("G90", 1).is_move());
    }

    #[test]
    fn test_has_params() {
        assert!(Gcode::parse("M109 S240", 1).has_params());
        assert!(!Gcode::parse("M109", 1).has_params());
    }
}
