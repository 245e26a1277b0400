//! Server-authoritative proximity filter.
//!
//! For a requesting session, [`compute_nearby`] returns every other session
//! within the threshold, nearest first. Recomputing this for every session on
//! every change is O(n^2) over the live set, which is fine for a local mesh.

use std::cmp::Ordering;

use crate::geo::Location;
use crate::protocol::{DeviceKind, LocationUpdate, NearbyEntry};
use crate::types::{SessionId, Timestamp};

/// Default inclusion radius in meters.
pub const DEFAULT_PROXIMITY_THRESHOLD_METERS: f64 = 100.0;

/// The transport-free part of a session record, as seen by the proximity
/// filter and reported to peers.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    pub session_id: SessionId,
    pub name: String,
    pub device_kind: DeviceKind,
    pub location: Location,
    pub last_seen: Timestamp,
}

impl Presence {
    pub fn from_update(update: LocationUpdate, last_seen: Timestamp) -> Self {
        Self {
            session_id: update.session_id,
            name: update.name,
            device_kind: update.device_type,
            location: update.location,
            last_seen,
        }
    }

    /// Build the wire row describing this presence at `distance` meters.
    pub fn to_nearby_entry(&self, distance: f64) -> NearbyEntry {
        NearbyEntry {
            session_id: self.session_id.clone(),
            name: self.name.clone(),
            device_type: self.device_kind,
            location: self.location,
            distance,
            last_seen: self.last_seen,
        }
    }
}

/// A peer within range of the requester.
#[derive(Debug, Clone, PartialEq)]
pub struct Nearby<'a> {
    pub presence: &'a Presence,
    pub distance_meters: f64,
}

/// Every session in `all` other than `requester` whose distance is at most
/// `threshold_meters`, sorted by ascending distance and then by session id.
///
/// The requester is excluded by session id, so passing a snapshot that
/// contains the requester is fine. Peers whose distance is NaN are dropped.
pub fn compute_nearby<'a, I>(requester: &Presence, all: I, threshold_meters: f64) -> Vec<Nearby<'a>>
where
    I: IntoIterator<Item = &'a Presence>,
{
    let mut nearby: Vec<Nearby<'a>> = all
        .into_iter()
        .filter(|other| other.session_id != requester.session_id)
        .filter_map(|other| {
            let distance_meters = requester.location.distance_to(&other.location);
            (distance_meters <= threshold_meters).then_some(Nearby {
                presence: other,
                distance_meters,
            })
        })
        .collect();

    nearby.sort_by(compare_nearby);
    nearby
}

/// [`compute_nearby`] rendered as `UPDATE_LIST` rows.
pub fn nearby_entries<'a, I>(requester: &Presence, all: I, threshold_meters: f64) -> Vec<NearbyEntry>
where
    I: IntoIterator<Item = &'a Presence>,
{
    compute_nearby(requester, all, threshold_meters)
        .into_iter()
        .map(|n| n.presence.to_nearby_entry(n.distance_meters))
        .collect()
}

fn compare_nearby(a: &Nearby<'_>, b: &Nearby<'_>) -> Ordering {
    a.distance_meters
        .total_cmp(&b.distance_meters)
        .then_with(|| a.presence.session_id.cmp(&b.presence.session_id))
}
