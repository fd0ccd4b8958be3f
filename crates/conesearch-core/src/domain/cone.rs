//! Simple Cone Search のパラメータ

use serde::{Deserialize, Serialize};

use crate::typed::Parameters;

/// Levels of verbosity in a simple cone search response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Minimum columns required to describe the object.
    Minimum,
    /// A useful intermediate number of columns.
    #[default]
    Default,
    /// All available columns.
    All,
}

/// Parameters for a Simple Cone Search.
///
/// Positions are ICRS, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConeSearchParameters {
    /// Right ascension of the cone centre.
    pub ra: f64,
    /// Declination of the cone centre.
    pub dec: f64,
    /// Search radius.
    pub sr: f64,
    #[serde(default)]
    pub verb: Verbosity,
}

impl ConeSearchParameters {
    pub fn new(ra: f64, dec: f64, sr: f64) -> Self {
        Self {
            ra,
            dec,
            sr,
            verb: Verbosity::Default,
        }
    }

    pub fn with_verbosity(mut self, verb: Verbosity) -> Self {
        self.verb = verb;
        self
    }
}

impl Parameters for ConeSearchParameters {
    const KIND: &'static str = "conesearch.search.cone.v1";

    fn validate(&self) -> Result<(), String> {
        if !(self.ra.is_finite() && self.dec.is_finite() && self.sr.is_finite()) {
            return Err("ra, dec and sr must be finite".to_string());
        }
        if !(0.0..360.0).contains(&self.ra) {
            return Err(format!("ra {} out of range [0, 360)", self.ra));
        }
        if !(-90.0..=90.0).contains(&self.dec) {
            return Err(format!("dec {} out of range [-90, 90]", self.dec));
        }
        if self.sr <= 0.0 || self.sr > 180.0 {
            return Err(format!("sr {} out of range (0, 180]", self.sr));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn verbosity_defaults_when_absent() {
        let p: ConeSearchParameters =
            serde_json::from_str(r#"{"ra": 179.5, "dec": 59.98, "sr": 0.5}"#).unwrap();
        assert_eq!(p.verb, Verbosity::Default);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn verbosity_is_lowercase_on_the_wire() {
        let p = ConeSearchParameters::new(10.0, 0.0, 1.0).with_verbosity(Verbosity::All);
        let v = serde_json::to_value(p).unwrap();
        assert_eq!(v["verb"], "all");
    }

    #[rstest]
    #[case::ra_negative(-0.1, 0.0, 1.0)]
    #[case::ra_wraps(360.0, 0.0, 1.0)]
    #[case::dec_too_high(10.0, 90.5, 1.0)]
    #[case::dec_too_low(10.0, -91.0, 1.0)]
    #[case::zero_radius(10.0, 0.0, 0.0)]
    #[case::huge_radius(10.0, 0.0, 181.0)]
    #[case::nan(f64::NAN, 0.0, 1.0)]
    fn out_of_range_is_rejected(#[case] ra: f64, #[case] dec: f64, #[case] sr: f64) {
        assert!(ConeSearchParameters::new(ra, dec, sr).validate().is_err());
    }

    #[rstest]
    #[case(0.0, -90.0, 180.0)]
    #[case(359.999, 90.0, 0.001)]
    fn boundary_values_are_accepted(#[case] ra: f64, #[case] dec: f64, #[case] sr: f64) {
        assert!(ConeSearchParameters::new(ra, dec, sr).validate().is_ok());
    }
}
