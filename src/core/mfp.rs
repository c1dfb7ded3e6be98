use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Direction of a nearest-neighbour charge transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    #[inline]
    pub fn step(self) -> i32 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// A transition between adjacent charge states, written `from->to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transition {
    pub from: i32,
    pub to: i32,
}

impl Transition {
    /// Errors: `Error::Configuration` unless `from` and `to` differ by exactly 1.
    pub fn new(from: i32, to: i32) -> Result<Self> {
        if (i64::from(to) - i64::from(from)).abs() != 1 {
            return Err(Error::config(format!(
                "transition {from}->{to} does not join adjacent charge states"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn direction(&self) -> Direction {
        if self.to > self.from {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

impl FromStr for Transition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (from, to) = s.split_once("->").ok_or_else(|| {
            Error::config(format!("transition key '{s}' is not of the form 'a->b'"))
        })?;
        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|e| Error::config(format!("transition key '{s}': {e}")))
        };
        Transition::new(parse(from)?, parse(to)?)
    }
}

/// Widest charge span stored as dense per-state columns.
const DENSE_SPAN_LIMIT: u64 = 1 << 16;

/// Longest list of missing transitions spelled out by `check_coverage`.
const MISSING_REPORT_LIMIT: usize = 16;

#[derive(Debug, Clone)]
enum Columns {
    /// One slot per state in `[q_min, q_max]`, indexed by `q - q_min`.
    Dense {
        up: Vec<Option<NotNan<f64>>>,
        down: Vec<Option<NotNan<f64>>>,
    },
    /// Tables whose keys lie far apart in charge space.
    Sparse(HashMap<(i32, Direction), NotNan<f64>>),
}

/// Mean free paths for every adjacent charge transition.
///
/// Narrow tables are stored as two dense vectors indexed by `q - q_min`, one
/// per direction; wide sparse ones fall back to a hash map. The
/// outward transitions of the extreme states (`q_max -> q_max+1` and
/// `q_min -> q_min-1`) always report an infinite MFP, which confines the walk
/// to `[q_min, q_max]`. The extremes are taken over the `from` states.
#[derive(Debug, Clone)]
pub struct MfpTable {
    q_min: i32,
    q_max: i32,
    reference: i32,
    entries: usize,
    columns: Columns,
}

impl MfpTable {
    /// Build a table from textual keys such as `"2->3"`, in insertion order.
    ///
    /// The first key's `from` state becomes the reference charge.
    pub fn from_labeled<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let parsed = entries
            .into_iter()
            .map(|(k, v)| Ok((k.as_ref().parse::<Transition>()?, v)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_transitions(parsed)
    }

    /// Build a table from already-parsed transitions.
    ///
    /// Errors (`Error::Configuration`): empty input, duplicate keys, MFP that is
    /// NaN or not strictly positive. `f64::INFINITY` is accepted.
    pub fn from_transitions<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Transition, f64)>,
    {
        let entries: Vec<(Transition, f64)> = entries.into_iter().collect();
        let Some((first, _)) = entries.first() else {
            return Err(Error::config("MFP table is empty"));
        };
        let reference = first.from;
        let q_min = entries.iter().map(|(t, _)| t.from).min().unwrap_or(reference);
        let q_max = entries.iter().map(|(t, _)| t.from).max().unwrap_or(reference);

        let span = span_of(q_min, q_max);
        let mut columns = if span <= DENSE_SPAN_LIMIT {
            Columns::Dense {
                up: vec![None; span as usize],
                down: vec![None; span as usize],
            }
        } else {
            Columns::Sparse(HashMap::with_capacity(entries.len()))
        };
        let mut seen = HashSet::with_capacity(entries.len());

        for &(t, mfp) in &entries {
            if !seen.insert(t) {
                return Err(Error::config(format!("duplicate MFP entry for {t}")));
            }
            let value = NotNan::new(mfp)
                .map_err(|_| Error::config(format!("MFP for {t} is NaN")))?;
            if *value <= 0.0 {
                return Err(Error::config(format!(
                    "MFP for {t} must be > 0, got {mfp}"
                )));
            }
            match &mut columns {
                Columns::Dense { up, down } => {
                    let slot = (i64::from(t.from) - i64::from(q_min)) as usize;
                    match t.direction() {
                        Direction::Up => up[slot] = Some(value),
                        Direction::Down => down[slot] = Some(value),
                    }
                }
                Columns::Sparse(map) => {
                    map.insert((t.from, t.direction()), value);
                }
            }
        }

        Ok(Self {
            q_min,
            q_max,
            reference,
            entries: entries.len(),
            columns,
        })
    }

    /// `from` state of the first entry.
    pub fn reference_charge(&self) -> i32 {
        self.reference
    }

    /// `(q_min, q_max)` over the `from` states.
    pub fn charge_bounds(&self) -> (i32, i32) {
        (self.q_min, self.q_max)
    }

    /// Number of caller-supplied entries.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Mean free path for leaving `q` in `direction`.
    ///
    /// Errors: `Error::Configuration` if the table has no such entry.
    #[inline]
    pub fn mean_free_path(&self, q: i32, direction: Direction) -> Result<f64> {
        match direction {
            Direction::Up if q == self.q_max => return Ok(f64::INFINITY),
            Direction::Down if q == self.q_min => return Ok(f64::INFINITY),
            _ => {}
        }
        self.lookup(q, direction)
            .map(NotNan::into_inner)
            .ok_or_else(|| {
                Error::config(format!(
                    "MFP table has no entry for transition {}->{}",
                    q,
                    i64::from(q) + i64::from(direction.step())
                ))
            })
    }

    /// Verify that every interior transition between `q_min` and `q_max` is present.
    pub fn check_coverage(&self) -> Result<()> {
        let required = 2 * (span_of(self.q_min, self.q_max) - 1);
        let map = match &self.columns {
            Columns::Dense { .. } => return self.check_dense_coverage(),
            Columns::Sparse(map) => map,
        };
        let present = map
            .keys()
            .filter(|&&(q, d)| !(d == Direction::Up && q == self.q_max))
            .filter(|&&(q, d)| !(d == Direction::Down && q == self.q_min))
            .count() as u64;
        if present == required {
            return Ok(());
        }
        Err(Error::config(format!(
            "MFP table is missing {} of {} transitions between {} and {}",
            required - present,
            required,
            self.q_min,
            self.q_max
        )))
    }

    fn check_dense_coverage(&self) -> Result<()> {
        let mut missing = Vec::new();
        for q in self.q_min..=self.q_max {
            for direction in [Direction::Up, Direction::Down] {
                if self.mean_free_path(q, direction).is_err() {
                    missing.push(format!("{}->{}", q, q + direction.step()));
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        let total = missing.len();
        missing.truncate(MISSING_REPORT_LIMIT);
        let more = match total - missing.len() {
            0 => String::new(),
            rest => format!(" and {rest} more"),
        };
        Err(Error::config(format!(
            "MFP table is missing transitions: {}{}",
            missing.join(", "),
            more
        )))
    }

    #[inline]
    fn lookup(&self, q: i32, direction: Direction) -> Option<NotNan<f64>> {
        if q < self.q_min || q > self.q_max {
            return None;
        }
        match &self.columns {
            Columns::Dense { up, down } => {
                let slot = (i64::from(q) - i64::from(self.q_min)) as usize;
                match direction {
                    Direction::Up => up[slot],
                    Direction::Down => down[slot],
                }
            }
            Columns::Sparse(map) => map.get(&(q, direction)).copied(),
        }
    }
}

fn span_of(q_min: i32, q_max: i32) -> u64 {
    (i64::from(q_max) - i64::from(q_min) + 1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> Result<MfpTable> {
        MfpTable::from_labeled([("1->2", 1.0), ("2->1", 1.0), ("2->3", 2.0), ("3->2", 2.0)])
    }

    #[test]
    fn parse_transition_keys() -> Result<()> {
        let t: Transition = "2->3".parse()?;
        assert_eq!(t, Transition { from: 2, to: 3 });
        assert_eq!(t.direction(), Direction::Up);
        let neg: Transition = "0->-1".parse()?;
        assert_eq!(neg, Transition { from: 0, to: -1 });
        assert_eq!(neg.to_string(), "0->-1");
        Ok(())
    }

    #[test]
    fn malformed_keys_rejected() {
        assert!("2=>3".parse::<Transition>().is_err());
        assert!("a->3".parse::<Transition>().is_err());
        assert!("1->3".parse::<Transition>().is_err());
    }

    #[test]
    fn bounds_and_reference_from_keys() -> Result<()> {
        let table = toy()?;
        assert_eq!(table.charge_bounds(), (1, 3));
        assert_eq!(table.reference_charge(), 1);
        assert_eq!(table.len(), 4);
        Ok(())
    }

    #[test]
    fn boundary_transitions_are_infinite() -> Result<()> {
        let table = toy()?;
        assert_eq!(table.mean_free_path(3, Direction::Up)?, f64::INFINITY);
        assert_eq!(table.mean_free_path(1, Direction::Down)?, f64::INFINITY);
        assert_eq!(table.mean_free_path(2, Direction::Up)?, 2.0);
        assert_eq!(table.mean_free_path(3, Direction::Down)?, 2.0);
        Ok(())
    }

    #[test]
    fn boundary_overrides_supplied_entry() -> Result<()> {
        let table = MfpTable::from_labeled([("1->2", 1.0)])?;
        assert_eq!(table.charge_bounds(), (1, 1));
        assert_eq!(table.mean_free_path(1, Direction::Up)?, f64::INFINITY);
        Ok(())
    }

    #[test]
    fn missing_transition_is_configuration_error() -> Result<()> {
        let table = MfpTable::from_labeled([("1->2", 1.0), ("3->2", 1.0)])?;
        let err = table.mean_free_path(2, Direction::Up).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("2->3"));
        assert!(table.mean_free_path(7, Direction::Down).is_err());
        let gaps = table.check_coverage().unwrap_err().to_string();
        assert!(gaps.contains("2->3") && gaps.contains("2->1"));
        Ok(())
    }

    #[test]
    fn complete_table_passes_coverage() -> Result<()> {
        toy()?.check_coverage()
    }

    #[test]
    fn wide_sparse_table_is_usable() -> Result<()> {
        let table = MfpTable::from_labeled([
            ("-2000000000->-1999999999", 1.0),
            ("2000000000->1999999999", 1.0),
        ])?;
        assert_eq!(table.charge_bounds(), (-2_000_000_000, 2_000_000_000));
        assert_eq!(table.mean_free_path(-2_000_000_000, Direction::Up)?, 1.0);
        assert_eq!(
            table.mean_free_path(2_000_000_000, Direction::Up)?,
            f64::INFINITY
        );
        let err = table.mean_free_path(0, Direction::Up).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        let gaps = table.check_coverage().unwrap_err().to_string();
        assert!(gaps.contains("missing"), "{gaps}");
        Ok(())
    }

    #[test]
    fn coverage_report_is_truncated() -> Result<()> {
        let table = MfpTable::from_labeled([("0->1", 1.0), ("100->99", 1.0)])?;
        let gaps = table.check_coverage().unwrap_err().to_string();
        assert!(gaps.contains("more"), "{gaps}");
        Ok(())
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(MfpTable::from_labeled(Vec::<(&str, f64)>::new()).is_err());
        assert!(MfpTable::from_labeled([("1->2", f64::NAN)]).is_err());
        assert!(MfpTable::from_labeled([("1->2", 0.0)]).is_err());
        assert!(MfpTable::from_labeled([("1->2", 1.0), ("1->2", 2.0)]).is_err());
        assert!(MfpTable::from_labeled([("1->2", f64::INFINITY)]).is_ok());
    }
}
