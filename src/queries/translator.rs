//! Translates logical query filters into SQL conditions.
//!
//! The one domain-aware rewrite is the `is_live` leaf: its presence routes
//! the query to the live-status read partition, where it becomes a check on
//! the `is_live` column. Every other node passes through a generic
//! structural recursion unchanged.

use super::account_query::{Bound, FilterExpression, Range};

/// Reports whether a filter references the live-order index anywhere in its
/// tree. Stores use this to pick the read partition before translating.
pub fn has_live_check(filter: &FilterExpression) -> bool {
    match filter {
        FilterExpression::IsLive => true,
        FilterExpression::Literal(_) => false,
        FilterExpression::Not(inner) => has_live_check(inner),
        FilterExpression::And(lhs, rhs) | FilterExpression::Or(lhs, rhs) => {
            has_live_check(lhs) || has_live_check(rhs)
        }
    }
}

/// Renders a filter as a SQL condition. The `is_live` leaf is only valid
/// against the live-status view, which exposes it as a 0/1 column.
pub fn translate_filter(filter: &FilterExpression) -> String {
    match filter {
        FilterExpression::Literal(true) => "1".to_string(),
        FilterExpression::Literal(false) => "0".to_string(),
        FilterExpression::IsLive => "is_live <> 0".to_string(),
        FilterExpression::Not(inner) => format!("NOT ({})", translate_filter(inner)),
        FilterExpression::And(lhs, rhs) => {
            format!("({}) AND ({})", translate_filter(lhs), translate_filter(rhs))
        }
        FilterExpression::Or(lhs, rhs) => {
            format!("({}) OR ({})", translate_filter(lhs), translate_filter(rhs))
        }
    }
}

/// Renders a range as SQL conditions over the `ordinal` and `timestamp`
/// columns. Timestamps compare against their microsecond representation.
pub fn translate_range(range: &Range) -> Vec<String> {
    let mut conditions = Vec::new();
    match range.start {
        Bound::First => {}
        Bound::Last => conditions.push("0".to_string()),
        Bound::Ordinal(ordinal) => conditions.push(format!("ordinal >= {ordinal}")),
        Bound::Timestamp(ts) => {
            conditions.push(format!("timestamp >= {}", ts.timestamp_micros()));
        }
    }
    match range.end {
        Bound::Last => {}
        Bound::First => conditions.push("0".to_string()),
        Bound::Ordinal(ordinal) => conditions.push(format!("ordinal <= {ordinal}")),
        Bound::Timestamp(ts) => {
            conditions.push(format!("timestamp <= {}", ts.timestamp_micros()));
        }
    }
    conditions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn detects_live_check_at_any_depth() {
        assert!(has_live_check(&FilterExpression::IsLive));
        assert!(has_live_check(&FilterExpression::IsLive.not()));
        assert!(has_live_check(
            &FilterExpression::Literal(true).and(FilterExpression::IsLive)
        ));
        assert!(has_live_check(
            &FilterExpression::Literal(false)
                .or(FilterExpression::Literal(true).and(FilterExpression::IsLive.not()))
        ));
        assert!(!has_live_check(&FilterExpression::Literal(true)));
        assert!(!has_live_check(
            &FilterExpression::Literal(true).and(FilterExpression::Literal(false))
        ));
    }

    #[test]
    fn translates_filters() {
        assert_eq!(translate_filter(&FilterExpression::Literal(true)), "1");
        assert_eq!(translate_filter(&FilterExpression::IsLive), "is_live <> 0");
        assert_eq!(
            translate_filter(&FilterExpression::IsLive.not()),
            "NOT (is_live <> 0)"
        );
        assert_eq!(
            translate_filter(&FilterExpression::IsLive.and(FilterExpression::Literal(false))),
            "(is_live <> 0) AND (0)"
        );
    }

    #[test]
    fn translates_ranges() {
        assert!(translate_range(&Range::total()).is_empty());
        assert_eq!(
            translate_range(&Range::ordinals(3, 9)),
            vec!["ordinal >= 3".to_string(), "ordinal <= 9".to_string()]
        );
        let start = Utc.timestamp_micros(1_000_000).unwrap();
        let end = Utc.timestamp_micros(2_000_000).unwrap();
        assert_eq!(
            translate_range(&Range::timestamps(start, end)),
            vec![
                "timestamp >= 1000000".to_string(),
                "timestamp <= 2000000".to_string()
            ]
        );
    }
}
