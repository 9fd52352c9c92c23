/// One power constraint: a power limit averaged over a time window
///
/// When applying a limit, a zero (or negative) field means "leave the
/// current value unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RaplLimit {
    pub seconds: f64,
    pub watts: f64,
}

impl RaplLimit {
    pub fn new(seconds: f64, watts: f64) -> Self {
        Self { seconds, watts }
    }
}
