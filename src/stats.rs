use chrono::NaiveDate;

/// 0-100 score with one decimal, e.g. 2 of 3 correct -> 66.7.
pub fn score_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (correct as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Percentage of answers picking each 1-based alternative. Picks outside
/// `1..=alternative_count` are ignored and do not count toward the base.
pub fn answer_distribution(alternative_count: usize, picks: &[usize]) -> Vec<f64> {
    let mut counts = vec![0usize; alternative_count];
    let mut considered = 0usize;
    for &p in picks {
        if p >= 1 && p <= alternative_count {
            counts[p - 1] += 1;
            considered += 1;
        }
    }
    if considered == 0 {
        return vec![0.0; alternative_count];
    }
    counts
        .iter()
        .map(|&c| (c as f64 / considered as f64 * 1000.0).round() / 10.0)
        .collect()
}

#[derive(Debug, PartialEq)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub rate: f64,
}

#[derive(Debug, PartialEq)]
pub struct PaymentSummary {
    pub total: f64,
    pub count: usize,
}

fn in_range(date: NaiveDate, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    if let Some(f) = from {
        if date < f {
            return false;
        }
    }
    if let Some(t) = to {
        if date > t {
            return false;
        }
    }
    true
}

/// Present/absent counts over an inclusive optional date range.
pub fn summarize_attendance(
    records: &[(NaiveDate, bool)],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> AttendanceSummary {
    let mut present = 0usize;
    let mut absent = 0usize;
    for &(date, was_present) in records {
        if !in_range(date, from, to) {
            continue;
        }
        if was_present {
            present += 1;
        } else {
            absent += 1;
        }
    }
    let counted = present + absent;
    let rate = if counted == 0 {
        0.0
    } else {
        present as f64 / counted as f64
    };
    AttendanceSummary {
        present,
        absent,
        rate,
    }
}

/// Payment total/count over the same inclusive range semantics.
pub fn summarize_payments(
    records: &[(NaiveDate, f64)],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> PaymentSummary {
    let mut total = 0.0;
    let mut count = 0usize;
    for &(date, amount) in records {
        if !in_range(date, from, to) {
            continue;
        }
        total += amount;
        count += 1;
    }
    PaymentSummary { total, count }
}
