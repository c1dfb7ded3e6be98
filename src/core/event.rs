use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Kind of a recorded history event.
///
/// `Display`/`FromStr` use the short labels `pre`, `+`, `-`, `post`, `ignored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Starting state of a simulated segment.
    Pre,
    /// Transition `q -> q + 1`.
    Plus,
    /// Transition `q -> q - 1`.
    Minus,
    /// End of a segment, pinned at the requested stopping length.
    Post,
    /// End of a segment whose distance was not committed.
    Ignored,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pre => "pre",
            EventKind::Plus => "+",
            EventKind::Minus => "-",
            EventKind::Post => "post",
            EventKind::Ignored => "ignored",
        }
    }

    /// Charge change carried by a transition kind; zero for bookkeeping kinds.
    #[inline]
    pub fn charge_delta(&self) -> i32 {
        match self {
            EventKind::Plus => 1,
            EventKind::Minus => -1,
            _ => 0,
        }
    }

    /// True for `Post` and `Ignored`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Post | EventKind::Ignored)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pre" => Ok(EventKind::Pre),
            "+" => Ok(EventKind::Plus),
            "-" => Ok(EventKind::Minus),
            "post" => Ok(EventKind::Post),
            "ignored" => Ok(EventKind::Ignored),
            other => Err(Error::InvalidParam(format!(
                "unknown event kind '{other}'"
            ))),
        }
    }
}

/// One entry of a particle history.
///
/// - `charge`: charge state after the event.
/// - `length`: cumulative travelled length at the event (finite, >= 0).
/// - `kind`: what happened.
/// - `zp`: reference charge label, set only on the first event of a fresh history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub charge: i32,
    pub length: f64,
    pub kind: EventKind,
    pub zp: Option<i32>,
}

impl Event {
    /// Create an event, validating that `length` is finite and non-negative.
    pub fn new(charge: i32, length: f64, kind: EventKind) -> Result<Self> {
        if !length.is_finite() || length < 0.0 {
            return Err(Error::InvalidParam(format!(
                "event length must be finite and >= 0, got {length}"
            )));
        }
        Ok(Self {
            charge,
            length,
            kind,
            zp: None,
        })
    }

    /// Attach the reference charge label.
    pub fn with_zp(mut self, zp: i32) -> Self {
        self.zp = Some(zp);
        self
    }

    // Unchecked constructor for the sampling loop, where lengths are finite by construction.
    #[inline]
    pub(crate) fn at(charge: i32, length: f64, kind: EventKind) -> Self {
        Self {
            charge,
            length,
            kind,
            zp: None,
        }
    }
}

/// Ordered record of one particle's events.
pub type History = Vec<Event>;

/// One history per simulated particle, index-aligned with the population.
pub type Histories = Vec<History>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_rejects_negative_length() {
        let err = Event::new(1, -0.5, EventKind::Plus).unwrap_err();
        assert!(err.to_string().contains("length"));
    }

    #[test]
    fn new_event_rejects_nan_length() {
        assert!(Event::new(1, f64::NAN, EventKind::Post).is_err());
    }

    #[test]
    fn kind_labels_parse_back() -> Result<()> {
        for kind in [
            EventKind::Pre,
            EventKind::Plus,
            EventKind::Minus,
            EventKind::Post,
            EventKind::Ignored,
        ] {
            assert_eq!(kind.to_string().parse::<EventKind>()?, kind);
        }
        assert!("sideways".parse::<EventKind>().is_err());
        Ok(())
    }

    #[test]
    fn charge_delta_matches_kind() {
        assert_eq!(EventKind::Plus.charge_delta(), 1);
        assert_eq!(EventKind::Minus.charge_delta(), -1);
        assert_eq!(EventKind::Post.charge_delta(), 0);
        assert!(EventKind::Ignored.is_terminal());
        assert!(!EventKind::Pre.is_terminal());
    }

    #[test]
    fn zp_only_when_attached() -> Result<()> {
        let e = Event::new(3, 0.0, EventKind::Pre)?;
        assert_eq!(e.zp, None);
        assert_eq!(e.with_zp(8).zp, Some(8));
        Ok(())
    }
}
