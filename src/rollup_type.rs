//! Copyright (c) 2024 MASSA LABS <info@massa.net>

//! The rollup value-kind taxonomy.
//!
//! The tracker itself treats this only as an opaque tag carried alongside a
//! slot; the persister layer is the one that actually dispatches on it to
//! pick a serializer. It is re-architected here as a tagged enum with total
//! functions, rather than the runtime-class-inspection the original used.

use crate::granularity::Granularity;

/// The kind of value a rollup slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RollupType {
    /// monotonically increasing counter
    Counter,
    /// timer/latency distribution
    Timer,
    /// a set of distinct values
    Set,
    /// a point-in-time gauge reading
    Gauge,
    /// Blueflood-flavored histogram buckets
    BfHistograms,
    /// Blueflood-flavored basic stats (min/max/average/count)
    BfBasic,
    /// not a rollup-eligible value at all
    NotARollup,
}

impl RollupType {
    /// Case-insensitive parse; unknown or empty strings map to `BfBasic`.
    /// Total: never fails.
    pub fn from_str(s: &str) -> RollupType {
        match s.to_ascii_uppercase().as_str() {
            "COUNTER" => RollupType::Counter,
            "TIMER" => RollupType::Timer,
            "SET" => RollupType::Set,
            "GAUGE" => RollupType::Gauge,
            "BF_HISTOGRAMS" => RollupType::BfHistograms,
            "NOT_A_ROLLUP" => RollupType::NotARollup,
            "BF_BASIC" => RollupType::BfBasic,
            _ => RollupType::BfBasic,
        }
    }

    /// The stable name used by `from_str`'s inverse, for the round-trip
    /// property in the design doc (`from_str(from_str(s).name()) ==
    /// from_str(s)`).
    pub fn name(self) -> &'static str {
        match self {
            RollupType::Counter => "COUNTER",
            RollupType::Timer => "TIMER",
            RollupType::Set => "SET",
            RollupType::Gauge => "GAUGE",
            RollupType::BfHistograms => "BF_HISTOGRAMS",
            RollupType::BfBasic => "BF_BASIC",
            RollupType::NotARollup => "NOT_A_ROLLUP",
        }
    }

    /// The serializer descriptor a persister should use for this
    /// (tag, granularity) pairing. Total over the enum: the match has no
    /// wildcard arm so the compiler flags any new variant left unhandled.
    pub fn value_class(self, granularity: Granularity) -> ValueClass {
        match (self, granularity) {
            (RollupType::BfBasic, Granularity::Full) => ValueClass::SingleSample,
            (RollupType::Counter, _)
            | (RollupType::Timer, _)
            | (RollupType::Set, _)
            | (RollupType::Gauge, _)
            | (RollupType::BfHistograms, _)
            | (RollupType::BfBasic, _)
            | (RollupType::NotARollup, _) => ValueClass::Aggregate,
        }
    }
}

/// The serializer-facing class a (tag, granularity) pairing resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueClass {
    /// a single unrolled sample, carried verbatim (finest granularity, basic
    /// stats only)
    SingleSample,
    /// a computed aggregate over the slot's window
    Aggregate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!(RollupType::from_str("COUNTER"), RollupType::Counter);
        assert_eq!(RollupType::from_str("counter"), RollupType::Counter);
        assert_eq!(RollupType::from_str("Counter"), RollupType::Counter);
    }

    #[test]
    fn unknown_or_empty_maps_to_bf_basic() {
        assert_eq!(RollupType::from_str(""), RollupType::BfBasic);
        assert_eq!(RollupType::from_str("bogus"), RollupType::BfBasic);
    }

    /// S6/property 6: `from_str(from_str(s).name()) == from_str(s)`.
    #[test]
    fn from_str_round_trips_through_name() {
        for s in ["COUNTER", "TIMER", "SET", "GAUGE", "BF_HISTOGRAMS", "BF_BASIC", "NOT_A_ROLLUP", "garbage"] {
            let parsed = RollupType::from_str(s);
            assert_eq!(RollupType::from_str(parsed.name()), parsed);
        }
    }

    #[test]
    fn value_class_singleton_only_for_bf_basic_at_finest() {
        assert_eq!(
            RollupType::BfBasic.value_class(Granularity::Full),
            ValueClass::SingleSample
        );
        assert_eq!(
            RollupType::BfBasic.value_class(Granularity::Min5),
            ValueClass::Aggregate
        );
        assert_eq!(
            RollupType::Counter.value_class(Granularity::Full),
            ValueClass::Aggregate
        );
    }
}
