use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    WaitingForAccept,
    InProgress,
    Delivered,
    Canceled,
}

impl DeliveryStatus {
    /// Legal edges: WaitingForAccept -> InProgress -> Delivered and
    /// WaitingForAccept -> Canceled.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        matches!(
            (self, next),
            (DeliveryStatus::WaitingForAccept, DeliveryStatus::InProgress)
                | (DeliveryStatus::WaitingForAccept, DeliveryStatus::Canceled)
                | (DeliveryStatus::InProgress, DeliveryStatus::Delivered)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::WaitingForAccept => "waiting_for_accept",
            DeliveryStatus::InProgress => "in_progress",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactDetails {
    pub provider_name: Option<String>,
    pub provider_mobile: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_mobile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub created_by: String,
    pub handler: Option<String>,
    pub pickup: GeoPoint,
    pub destination: GeoPoint,
    pub current: Option<GeoPoint>,
    pub status: DeliveryStatus,
    pub webhook: Option<String>,
    pub contact: ContactDetails,
    pub pickup_address: Option<String>,
    pub destination_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submission payload. Geometry and identity are optional here so that a
/// missing field surfaces as a validation error instead of a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDelivery {
    pub created_by: Option<String>,
    pub pickup: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub webhook: Option<String>,
    #[serde(default)]
    pub contact: ContactDetails,
    pub pickup_address: Option<String>,
    pub destination_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{DeliveryStatus, GeoPoint};

    const ALL: [DeliveryStatus; 4] = [
        DeliveryStatus::WaitingForAccept,
        DeliveryStatus::InProgress,
        DeliveryStatus::Delivered,
        DeliveryStatus::Canceled,
    ];

    #[test]
    fn only_forward_edges_are_legal() {
        let legal: Vec<(DeliveryStatus, DeliveryStatus)> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            legal,
            vec![
                (DeliveryStatus::WaitingForAccept, DeliveryStatus::InProgress),
                (DeliveryStatus::WaitingForAccept, DeliveryStatus::Canceled),
                (DeliveryStatus::InProgress, DeliveryStatus::Delivered),
            ]
        );
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            assert!(ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn rejects_out_of_range_and_non_finite_points() {
        assert!(GeoPoint::new(52.5, 13.4).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_valid());
    }
}
