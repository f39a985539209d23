//! Solver text interchange format.
//!
//! Request (`input.dat`):
//!
//! ```text
//! <n>
//! <x> <y>          n lines, one decimal place
//! ```
//!
//! Result (`<output>.tile`):
//!
//! ```text
//! <title line>
//! <m> ...          original point count
//! <x> <y>          m lines, skipped
//! <k> <_> <ih_type> ...
//! <tiling parameters line>
//! <x> <y>          k lines, the optimized tile
//! ```

use kurbo::Point;

use crate::config::OddCountPolicy;
use crate::error::EscherError;
use crate::geom::strip_closing_duplicate;

/// Distance under which a trailing point counts as a closing duplicate.
const CLOSING_TOLERANCE: f64 = 1e-9;

/// Decoded solver output, before orientation reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverResult {
    pub ih_type: u32,
    pub tile: Vec<Point>,
}

/// Bring a polygon into the shape the solver accepts: no closing
/// duplicate and an even vertex count.
pub fn prepare_request(
    polygon: &[Point],
    policy: OddCountPolicy,
) -> Result<Vec<Point>, EscherError> {
    let mut points = strip_closing_duplicate(polygon, CLOSING_TOLERANCE).to_vec();
    if points.len() % 2 == 1 {
        match policy {
            OddCountPolicy::DropLast => {
                log::warn!(
                    "solver needs an even vertex count; dropping last of {} points",
                    points.len()
                );
                points.pop();
            }
            OddCountPolicy::Reject => {
                return Err(EscherError::InputRejected(format!(
                    "solver needs an even vertex count, outline has {}",
                    points.len()
                )));
            }
        }
    }
    Ok(points)
}

/// Serialize a polygon into the solver's input text.
pub fn encode_request(polygon: &[Point], policy: OddCountPolicy) -> Result<String, EscherError> {
    let points = prepare_request(polygon, policy)?;
    let mut text = format!("{}\n", points.len());
    for p in &points {
        text.push_str(&format!("{:.1} {:.1}\n", p.x, p.y));
    }
    Ok(text)
}

/// Parse the solver's result text.
pub fn decode_result(text: &str) -> Result<SolverResult, EscherError> {
    let mut lines = Lines::new(text);

    lines.next("title line")?;
    let original_count = lines.next_count("original point count")?;
    for i in 0..original_count {
        lines.next_pair(&format!("original point {}", i))?;
    }

    let header = lines.next("result header")?;
    let mut tokens = header.split_whitespace();
    let output_count = parse_token::<usize>(tokens.next(), "output count", lines.index)?;
    tokens.next();
    let ih_type = parse_token::<u32>(tokens.next(), "isohedral type", lines.index)?;

    lines.next("tiling parameters")?;

    let tile = (0..output_count)
        .map(|i| lines.next_pair(&format!("tile point {}", i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SolverResult { ih_type, tile })
}

/// Line cursor that reports positions in its errors.
struct Lines<'a> {
    inner: std::str::Lines<'a>,
    index: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self { inner: text.trim().lines(), index: 0 }
    }

    fn next(&mut self, what: &str) -> Result<&'a str, EscherError> {
        self.index += 1;
        self.inner.next().map(str::trim).ok_or_else(|| {
            EscherError::MalformedSolverOutput(format!(
                "missing {} (line {})",
                what, self.index
            ))
        })
    }

    fn next_count(&mut self, what: &str) -> Result<usize, EscherError> {
        let line = self.next(what)?;
        parse_token(line.split_whitespace().next(), what, self.index)
    }

    fn next_pair(&mut self, what: &str) -> Result<Point, EscherError> {
        let line = self.next(what)?;
        let mut tokens = line.split_whitespace();
        let x = parse_token::<f64>(tokens.next(), what, self.index)?;
        let y = parse_token::<f64>(tokens.next(), what, self.index)?;
        if !x.is_finite() || !y.is_finite() {
            return Err(EscherError::MalformedSolverOutput(format!(
                "non-finite {} (line {})",
                what, self.index
            )));
        }
        Ok(Point::new(x, y))
    }
}

fn parse_token<T: std::str::FromStr>(
    token: Option<&str>,
    what: &str,
    line: usize,
) -> Result<T, EscherError> {
    token.and_then(|t| t.parse().ok()).ok_or_else(|| {
        EscherError::MalformedSolverOutput(format!("bad {} (line {})", what, line))
    })
}
