//! R-tree indexed sample positions and radius queries.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::GpsPoint;

/// Envelope padding so the degree box always contains the haversine circle.
const ENVELOPE_MARGIN: f64 = 1.5;

/// A GPS point with its stream index for R-tree queries
#[derive(Debug, Clone, Copy)]
pub struct IndexedPoint {
    pub idx: usize,
    pub lat: f64,
    pub lng: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Build R-tree from GPS points for efficient spatial queries
pub fn build_rtree(points: &[GpsPoint]) -> RTree<IndexedPoint> {
    let indexed: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(i, p)| IndexedPoint {
            idx: i,
            lat: p.latitude,
            lng: p.longitude,
        })
        .collect();
    RTree::bulk_load(indexed)
}

/// Indices of all points within `radius_m` of `center`, in ascending order.
///
/// The R-tree only narrows the candidates; membership is decided by the exact
/// haversine distance, so the result equals a linear scan of `points`.
pub fn indices_within_radius(
    tree: &RTree<IndexedPoint>,
    points: &[GpsPoint],
    center: &GpsPoint,
    radius_m: f64,
) -> Vec<usize> {
    let (dlat, dlng) = meters_to_degrees(radius_m * ENVELOPE_MARGIN, center.latitude);
    let min_lat = center.latitude - dlat;
    let max_lat = center.latitude + dlat;
    let min_lng = center.longitude - dlng;
    let max_lng = center.longitude + dlng;

    // The box would wrap the antimeridian or a pole
    if min_lng < -180.0 || max_lng > 180.0 || min_lat < -90.0 || max_lat > 90.0 {
        return points
            .iter()
            .enumerate()
            .filter(|(_, p)| haversine_distance(p, center) <= radius_m)
            .map(|(i, _)| i)
            .collect();
    }

    let envelope = AABB::from_corners([min_lat, min_lng], [max_lat, max_lng]);
    let mut hits: Vec<usize> = tree
        .locate_in_envelope(&envelope)
        .filter(|p| haversine_distance(&GpsPoint::new(p.lat, p.lng), center) <= radius_m)
        .map(|p| p.idx)
        .collect();
    hits.sort_unstable();
    hits
}
