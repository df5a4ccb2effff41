/// Opaque job identifier assigned by the processing backend.
pub type JobId = String;

/// Region name → hex color, as exchanged with the backend.
///
/// Ordered so that serialized payloads and rendered tables are stable.
pub type ColorMap = std::collections::BTreeMap<String, String>;
