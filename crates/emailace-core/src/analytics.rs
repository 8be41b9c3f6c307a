//! KPIs derived from the backend's aggregate counts.

use std::collections::BTreeMap;
use std::fmt;

use emailace_api::{AnalyticsSnapshot, Priority, Sentiment};

use crate::cache::{CacheSnapshot, QueryState, Subscription};

/// An exact ratio of two counts.
///
/// Keeps numerator and denominator so further arithmetic never compounds
/// display rounding. A zero denominator reads as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ratio {
    part: u64,
    whole: u64,
}

impl Ratio {
    /// `part / whole`.
    #[must_use]
    pub const fn new(part: u64, whole: u64) -> Self {
        Self { part, whole }
    }

    /// The counted part.
    #[must_use]
    pub const fn part(&self) -> u64 {
        self.part
    }

    /// The total it is a share of.
    #[must_use]
    pub const fn whole(&self) -> u64 {
        self.whole
    }

    /// The ratio as a fraction in `0.0..`, `0.0` when the whole is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self) -> f64 {
        if self.whole == 0 {
            0.0
        } else {
            self.part as f64 / self.whole as f64
        }
    }

    /// Whole percent, rounded half away from zero.
    #[must_use]
    pub fn percent(&self) -> u64 {
        if self.whole == 0 {
            return 0;
        }
        let scaled = u128::from(self.part) * 200 + u128::from(self.whole);
        let rounded = scaled / (u128::from(self.whole) * 2);
        u64::try_from(rounded).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// One label of a breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    /// Label as the backend names it.
    pub label: String,
    /// Emails carrying the label.
    pub count: u64,
    /// `count / total`.
    pub ratio: Ratio,
}

/// Everything the analytics view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedMetrics {
    /// Number of emails.
    pub total: u64,
    /// Resolved out of total.
    pub resolution_rate: Ratio,
    /// Pending out of total.
    pub pending_rate: Ratio,
    /// Urgent out of total.
    pub urgent_rate: Ratio,
    /// Per-sentiment shares: positive, neutral, negative, then any others.
    pub sentiment: Vec<Share>,
    /// Per-priority shares in triage order, then any others.
    pub priority: Vec<Share>,
}

impl DerivedMetrics {
    /// Share for a sentiment.
    #[must_use]
    pub fn sentiment_share(&self, sentiment: Sentiment) -> Option<&Share> {
        self.sentiment.iter().find(|share| share.label == sentiment.as_str())
    }

    /// Share for a priority.
    #[must_use]
    pub fn priority_share(&self, priority: Priority) -> Option<&Share> {
        self.priority.iter().find(|share| share.label == priority.as_str())
    }
}

/// Computes the KPIs for `snapshot`. Never fails, even for an empty inbox.
#[must_use]
pub fn derive(snapshot: &AnalyticsSnapshot) -> DerivedMetrics {
    let total = snapshot.total;
    DerivedMetrics {
        total,
        resolution_rate: Ratio::new(snapshot.resolved, total),
        pending_rate: Ratio::new(snapshot.pending, total),
        urgent_rate: Ratio::new(snapshot.urgent, total),
        sentiment: shares(
            Sentiment::ALL.iter().map(Sentiment::as_str),
            &snapshot.sentiment_breakdown,
            total,
        ),
        priority: shares(
            Priority::ALL.iter().map(Priority::as_str),
            &snapshot.priority_breakdown,
            total,
        ),
    }
}

/// Known labels first, absent ones as zero; labels only the server knows follow.
fn shares<'a>(
    known: impl Iterator<Item = &'a str>,
    breakdown: &BTreeMap<String, u64>,
    total: u64,
) -> Vec<Share> {
    let known: Vec<&str> = known.collect();
    let share = |label: &str| {
        let count = breakdown.get(label).copied().unwrap_or(0);
        Share {
            label: label.to_string(),
            count,
            ratio: Ratio::new(count, total),
        }
    };
    let extra = breakdown
        .keys()
        .map(String::as_str)
        .filter(|label| !known.contains(label));
    known.iter().copied().chain(extra).map(share).collect()
}

/// The analytics panel: an analytics subscription plus [`derive`].
#[derive(Debug)]
pub struct AnalyticsView {
    subscription: Subscription<AnalyticsSnapshot>,
}

impl AnalyticsView {
    /// Wraps an analytics subscription.
    #[must_use]
    pub const fn new(subscription: Subscription<AnalyticsSnapshot>) -> Self {
        Self { subscription }
    }

    /// Metrics for the current cache state.
    #[must_use]
    pub fn metrics(&self) -> QueryState<DerivedMetrics> {
        render(&self.subscription.snapshot())
    }

    /// Waits for the next cache change. `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<QueryState<DerivedMetrics>> {
        let snapshot = self.subscription.changed().await?;
        Some(render(&snapshot))
    }

    /// Waits until the analytics entry settles.
    pub async fn settled(&mut self) -> QueryState<DerivedMetrics> {
        render(&self.subscription.settled().await)
    }
}

fn render(snapshot: &CacheSnapshot<AnalyticsSnapshot>) -> QueryState<DerivedMetrics> {
    snapshot.state().map(derive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(total: u64, resolved: u64) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            total,
            resolved,
            pending: total - resolved,
            ..AnalyticsSnapshot::default()
        }
    }

    #[test]
    fn test_resolution_rate() {
        let metrics = derive(&snapshot(200, 150));
        assert_eq!(metrics.resolution_rate.percent(), 75);
        assert!((metrics.resolution_rate.value() - 0.75).abs() < f64::EPSILON);
        assert_eq!(metrics.pending_rate.percent(), 25);
    }

    #[test]
    fn test_empty_inbox_is_zero_not_nan() {
        let metrics = derive(&snapshot(0, 0));
        assert_eq!(metrics.resolution_rate.percent(), 0);
        assert!(metrics.resolution_rate.value().abs() < f64::EPSILON);
        assert!(!metrics.resolution_rate.value().is_nan());
        assert!(metrics.sentiment.iter().all(|share| share.ratio.percent() == 0));
    }

    #[test]
    fn test_percent_rounds_half_away_from_zero() {
        assert_eq!(Ratio::new(1, 8).percent(), 13);
        assert_eq!(Ratio::new(1, 3).percent(), 33);
        assert_eq!(Ratio::new(2, 3).percent(), 67);
        assert_eq!(Ratio::new(1, 200).percent(), 1);
        assert_eq!(Ratio::new(3, 3).to_string(), "100%");
    }

    #[test]
    fn test_breakdowns_cover_known_labels() {
        let mut raw = snapshot(10, 4);
        raw.sentiment_breakdown.insert("negative".into(), 6);
        raw.priority_breakdown.insert("urgent".into(), 2);
        raw.priority_breakdown.insert("critical".into(), 1);
        let metrics = derive(&raw);

        let sentiments: Vec<_> = metrics.sentiment.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(sentiments, vec!["positive", "neutral", "negative"]);
        assert_eq!(metrics.sentiment_share(Sentiment::Negative).map(|s| s.ratio.percent()), Some(60));
        assert_eq!(metrics.sentiment_share(Sentiment::Positive).map(|s| s.count), Some(0));

        let priorities: Vec<_> = metrics.priority.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(priorities, vec!["urgent", "high", "normal", "low", "critical"]);
        assert_eq!(metrics.priority_share(Priority::Urgent).map(|s| s.ratio.percent()), Some(20));
    }
}
