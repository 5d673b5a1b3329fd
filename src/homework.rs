use crate::models::{DeliverySummary, HomeworkStatus};

pub fn summarize(statuses: &[HomeworkStatus]) -> DeliverySummary {
    let total = statuses.len();
    let delivered = statuses.iter().filter(|status| status.delivered).count();

    DeliverySummary {
        total,
        delivered,
        pending: total - delivered,
        delivery_rate: if total == 0 {
            None
        } else {
            Some(delivered as f64 / total as f64)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status(delivered: bool) -> HomeworkStatus {
        HomeworkStatus {
            student_id: Uuid::new_v4(),
            student_name: "Aina Puig".to_string(),
            delivered,
            comment: None,
        }
    }

    #[test]
    fn counts_delivered_and_pending() {
        let summary = summarize(&[status(true), status(false), status(true), status(true)]);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.delivered, 3);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.delivery_rate, Some(0.75));
    }

    #[test]
    fn empty_class_has_no_rate() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.delivery_rate, None);
    }
}
