use crate::errors::StatsError;
use crate::models::{parse_date, Bucket, Granularity, Record};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Groups records into one bucket per day, ISO week or calendar month,
/// ordered by period start. Records sharing a period have their visits summed.
pub fn aggregate(records: &[Record], granularity: Granularity) -> Result<Vec<Bucket>, StatsError> {
    let mut periods: BTreeMap<NaiveDate, u64> = BTreeMap::new();

    for record in records {
        let date = parse_date(&record.date).ok_or_else(|| StatsError::InvalidRecord {
            date: record.date.clone(),
        })?;
        let total = periods.entry(period_start(date, granularity)).or_default();
        *total = total.saturating_add(record.visits);
    }

    Ok(periods
        .into_iter()
        .map(|(start, visits)| Bucket {
            label: period_label(start, granularity),
            visits,
            period_start: start,
        })
        .collect())
}

pub fn total_visits(buckets: &[Bucket]) -> u64 {
    buckets
        .iter()
        .fold(0u64, |sum, bucket| sum.saturating_add(bucket.visits))
}

fn period_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Weekly => week_start(date),
        Granularity::Monthly => month_start(date),
    }
}

// Monday of the ISO week; a Sunday belongs to the week that started six days earlier.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

fn period_label(start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Daily => start.format("%b %-d").to_string(),
        Granularity::Weekly => format!("Week of {}", start.format("%b %-d")),
        Granularity::Monthly => start.format("%B %Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, visits: u64) -> Record {
        Record {
            id: format!("id-{date}-{visits}"),
            date: date.to_string(),
            visits,
        }
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn first_week_of_march() -> Vec<Record> {
        [120, 140, 90, 110, 105, 130, 94]
            .into_iter()
            .enumerate()
            .map(|(offset, visits)| record(&format!("2025-03-{:02}", offset + 1), visits))
            .collect()
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        for granularity in Granularity::ALL {
            assert!(aggregate(&[], granularity).unwrap().is_empty());
        }
    }

    #[test]
    fn daily_buckets_are_sorted_and_labelled() {
        let records = vec![record("2025-03-03", 5), record("2025-03-01", 7)];
        let buckets = aggregate(&records, Granularity::Daily).unwrap();

        assert_eq!(
            buckets,
            vec![
                Bucket {
                    label: "Mar 1".to_string(),
                    visits: 7,
                    period_start: ymd(2025, 3, 1),
                },
                Bucket {
                    label: "Mar 3".to_string(),
                    visits: 5,
                    period_start: ymd(2025, 3, 3),
                },
            ]
        );
    }

    #[test]
    fn daily_sums_duplicate_dates() {
        let records = vec![record("2025-03-01", 7), record("2025-03-01", 3)];
        let buckets = aggregate(&records, Granularity::Daily).unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].visits, 10);
    }

    #[test]
    fn sunday_and_monday_fall_in_different_weeks() {
        let records = vec![record("2025-03-02", 1), record("2025-03-03", 1)];
        let buckets = aggregate(&records, Granularity::Weekly).unwrap();

        let starts: Vec<_> = buckets.iter().map(|bucket| bucket.period_start).collect();
        assert_eq!(starts, vec![ymd(2025, 2, 24), ymd(2025, 3, 3)]);
        assert_eq!(buckets[0].label, "Week of Feb 24");
        assert_eq!(buckets[1].label, "Week of Mar 3");
    }

    #[test]
    fn week_start_crosses_year_boundary() {
        assert_eq!(week_start(ymd(2025, 1, 1)), ymd(2024, 12, 30));
        assert_eq!(week_start(ymd(2024, 12, 30)), ymd(2024, 12, 30));
    }

    #[test]
    fn monthly_groups_whole_month() {
        let records = vec![
            record("2025-03-31", 4),
            record("2025-04-01", 8),
            record("2025-03-01", 6),
        ];
        let buckets = aggregate(&records, Granularity::Monthly).unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "March 2025");
        assert_eq!(buckets[0].visits, 10);
        assert_eq!(buckets[0].period_start, ymd(2025, 3, 1));
        assert_eq!(buckets[1].label, "April 2025");
        assert_eq!(buckets[1].visits, 8);
    }

    #[test]
    fn seeded_week_splits_at_monday() {
        let records = first_week_of_march();
        let buckets = aggregate(&records, Granularity::Weekly).unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].period_start, ymd(2025, 2, 24));
        assert_eq!(buckets[0].visits, 120 + 140);
        assert_eq!(buckets[1].period_start, ymd(2025, 3, 3));
        assert_eq!(buckets[1].visits, 90 + 110 + 105 + 130 + 94);
    }

    #[test]
    fn aggregation_conserves_visits() {
        let mut records = first_week_of_march();
        records.push(record("2024-12-31", 17));
        records.push(record("2025-01-05", 0));
        records.push(record("2025-03-01", 9));
        let expected: u64 = records.iter().map(|record| record.visits).sum();

        for granularity in Granularity::ALL {
            let buckets = aggregate(&records, granularity).unwrap();
            assert_eq!(total_visits(&buckets), expected, "{granularity}");
        }
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let records = first_week_of_march();
        let mut reversed = records.clone();
        reversed.reverse();

        for granularity in Granularity::ALL {
            assert_eq!(
                aggregate(&records, granularity).unwrap(),
                aggregate(&reversed, granularity).unwrap()
            );
        }
    }

    #[test]
    fn unparseable_date_is_an_invalid_record() {
        let records = vec![record("2025-03-01", 1), record("", 2)];
        let err = aggregate(&records, Granularity::Monthly).unwrap_err();
        assert!(matches!(err, StatsError::InvalidRecord { ref date } if date.is_empty()));

        let records = vec![record("tomorrow", 1)];
        assert!(aggregate(&records, Granularity::Daily).is_err());
    }
}
