//! S2 cell ids for latitude/longitude pairs, on top of the `s2` crate.

use s2::cellid::CellID;
use s2::latlng::LatLng;
use thiserror::Error;

pub const MAX_LEVEL: u8 = 30;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("received invalid latitude, longitude values")]
    InvalidLatLng,
    #[error("received invalid s2 geo level {0}")]
    InvalidLevel(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(pub u64);

impl CellId {
    /// The leaf cell containing the given point, in degrees.
    pub fn from_lat_lng(lat: f64, lng: f64) -> Result<CellId, GeoError> {
        if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
            return Err(GeoError::InvalidLatLng);
        }
        Ok(CellId(CellID::from(LatLng::from_degrees(lat, lng)).0))
    }

    /// The cell at `level` containing the point, as done by the segmenter.
    pub fn at_level(lat: f64, lng: f64, level: u8) -> Result<CellId, GeoError> {
        if level > MAX_LEVEL {
            return Err(GeoError::InvalidLevel(level));
        }
        Ok(CellId::from_lat_lng(lat, lng)?.parent(level))
    }

    pub fn is_valid(&self) -> bool {
        CellID(self.0).is_valid()
    }

    pub fn level(&self) -> u8 {
        u8::try_from(CellID(self.0).level()).unwrap_or(MAX_LEVEL)
    }

    /// The ancestor of this cell at `level`, clamped to the leaf level.
    pub fn parent(&self, level: u8) -> CellId {
        CellId(CellID(self.0).parent(u64::from(level.min(MAX_LEVEL))).0)
    }
}
