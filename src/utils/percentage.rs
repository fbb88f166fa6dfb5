use std::{fmt::Display, ops::Deref};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. || value.is_nan() {
            None
        } else {
            Some(Percentage(value))
        }
    }

    pub fn zero() -> Self {
        Percentage(0.)
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `whole_seconds` taken by `seconds`. An empty whole yields zero.
pub fn share_of(seconds: f64, whole_seconds: f64) -> Percentage {
    if whole_seconds <= 0. {
        return Percentage::zero();
    }
    Percentage::new_opt(seconds / whole_seconds * 100.).unwrap_or(Percentage::zero())
}
