use crate::common::{Document, Value};
use crate::doc;
use crate::errors::{ErrorKind, FrameError, FrameResult};
use std::fmt::{Display, Formatter};

/// Earth's mean radius in meters (WGS84)
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// A longitude/latitude pair in degrees, stored the way GeoJSON orders it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    lon: f64,
    lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> FrameResult<GeoPoint> {
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            log::error!("Coordinates out of range: lon={}, lat={}", lon, lat);
            return Err(FrameError::new(
                &format!("Coordinates out of range: lon={}, lat={}", lon, lat),
                ErrorKind::InvalidFilter,
            ));
        }
        Ok(GeoPoint { lon, lat })
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Great-circle distance in meters.
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Reads a point from a stored field value.
    ///
    /// Accepts a GeoJSON point (`{type: "Point", coordinates: [lon, lat]}`),
    /// a bare `[lon, lat]` array or a `"lon,lat"` string. Returns `None` for
    /// anything else so documents without a location simply don't match.
    pub fn from_value(value: &Value) -> Option<GeoPoint> {
        match value {
            Value::Array(coords) if coords.len() == 2 => {
                let lon = coords[0].as_f64()?;
                let lat = coords[1].as_f64()?;
                GeoPoint::new(lon, lat).ok()
            }
            Value::String(text) => {
                let (lon, lat) = text.split_once(',')?;
                let lon = lon.trim().parse::<f64>().ok()?;
                let lat = lat.trim().parse::<f64>().ok()?;
                GeoPoint::new(lon, lat).ok()
            }
            Value::Document(doc) => {
                if let Some(kind) = doc.get("type").and_then(|t| t.as_str()) {
                    if kind != "Point" {
                        return None;
                    }
                }
                GeoPoint::from_value(doc.get("coordinates")?)
            }
            _ => None,
        }
    }

    /// GeoJSON representation.
    pub fn to_geojson(&self) -> Document {
        doc! {
            "type": "Point",
            coordinates: [(self.lon), (self.lat)],
        }
    }
}

impl Display for GeoPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GeoPoint(lon={:.6}, lat={:.6})", self.lon, self.lat)
    }
}

fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Nearest-first geospatial predicate with optional distance bounds in meters.
#[derive(Debug, Clone, PartialEq)]
pub struct NearQuery {
    point: GeoPoint,
    min_distance: Option<f64>,
    max_distance: Option<f64>,
}

impl NearQuery {
    pub fn new(point: GeoPoint) -> NearQuery {
        NearQuery {
            point,
            min_distance: None,
            max_distance: None,
        }
    }

    pub fn min_distance(mut self, meters: f64) -> NearQuery {
        self.min_distance = Some(meters);
        self
    }

    pub fn max_distance(mut self, meters: f64) -> NearQuery {
        self.max_distance = Some(meters);
        self
    }

    pub fn point(&self) -> &GeoPoint {
        &self.point
    }

    /// Parses the value side of a `field__near` keyword.
    ///
    /// Besides everything [GeoPoint::from_value] accepts, a document of the
    /// shape `{location, mind, maxd}` sets the distance bounds.
    pub fn parse(value: &Value) -> FrameResult<NearQuery> {
        if let Value::Document(spec) = value {
            if let Some(location) = spec.get("location") {
                let mut query = NearQuery::new(require_point(location)?);
                if let Some(mind) = spec.get("mind") {
                    query = query.min_distance(require_distance("mind", mind)?);
                }
                if let Some(maxd) = spec.get("maxd") {
                    query = query.max_distance(require_distance("maxd", maxd)?);
                }
                return Ok(query);
            }
        }
        Ok(NearQuery::new(require_point(value)?))
    }

    /// Distance from the query point when the value holds a point within bounds.
    pub fn distance_within(&self, value: &Value) -> Option<f64> {
        let point = GeoPoint::from_value(value)?;
        let distance = self.point.distance_meters(&point);
        if self.min_distance.map_or(false, |min| distance < min) {
            return None;
        }
        if self.max_distance.map_or(false, |max| distance > max) {
            return None;
        }
        Some(distance)
    }

    /// Native `$near` operand.
    pub fn to_document(&self) -> Document {
        let mut near = doc! { "$geometry": (self.point.to_geojson()) };
        if let Some(max) = self.max_distance {
            near.put("$maxDistance", max);
        }
        if let Some(min) = self.min_distance {
            near.put("$minDistance", min);
        }
        near
    }
}

fn require_point(value: &Value) -> FrameResult<GeoPoint> {
    match GeoPoint::from_value(value) {
        Some(point) => Ok(point),
        None => {
            log::error!("No coordinates found in near specification {}", value);
            Err(FrameError::new(
                &format!("Near filter requires coordinates, got {}", value),
                ErrorKind::InvalidFilter,
            ))
        }
    }
}

fn require_distance(name: &str, value: &Value) -> FrameResult<f64> {
    match value.as_f64() {
        Some(d) if d >= 0.0 => Ok(d),
        _ => {
            log::error!("Invalid {} distance {}", name, value);
            Err(FrameError::new(
                &format!("Distance '{}' must be a non-negative number, got {}", name, value),
                ErrorKind::InvalidFilter,
            ))
        }
    }
}
