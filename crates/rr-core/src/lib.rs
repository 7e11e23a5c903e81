//! rusty-report/crates/rr-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Rusty-Report.

pub mod access;
pub mod error;
pub mod models;
pub mod stats;
pub mod traits;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use std::str::FromStr;

    #[test]
    fn test_choice_round_trip_through_strings() {
        for status in IncidentStatus::ALL {
            assert_eq!(IncidentStatus::from_str(status.as_str()), Ok(*status));
        }
        assert_eq!(IncidentType::Medical.label(), "Medical Emergency");
        assert_eq!(
            serde_json::to_value(IncidentStatus::InProgress).unwrap(),
            serde_json::json!("in_progress")
        );
        assert!(Role::from_str("staff").is_err());
    }

    #[test]
    fn test_ordering_parses_direction() {
        let ordering: Ordering = "-updated_at".parse().unwrap();
        assert_eq!(ordering.field, OrderField::UpdatedAt);
        assert!(ordering.descending);
        assert!("title".parse::<Ordering>().is_err());
        assert_eq!(Ordering::default().field, OrderField::CreatedAt);
    }

    #[test]
    fn test_page_math() {
        let page = Page::<()> { items: vec![], page: 2, per_page: 20, total: 41 };
        assert_eq!(page.num_pages(), 3);
        assert!(page.has_previous());
        assert!(page.has_next());
    }
}
