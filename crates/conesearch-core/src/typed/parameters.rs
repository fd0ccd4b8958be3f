//! Parameters trait - payload の型と worker を結びつける

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Typed job parameters.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ImageCutout { ra: f64, dec: f64 }
///
/// impl Parameters for ImageCutout {
///     const KIND: &'static str = "acme.image.cutout.v1";
/// }
/// ```
///
/// `KIND` follows `{namespace}.{domain}.{action}.v{major}`.
pub trait Parameters: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: &'static str;

    /// Domain checks run at creation, before any state change.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}
