use gdal::spatial_ref::SpatialRef;
use log::{info, warn};

/// Human-readable name of a projection, for log messages
pub fn describe_projection(projection_wkt: &str) -> String {
    if projection_wkt.trim().is_empty() {
        return "undefined".to_string();
    }
    SpatialRef::from_wkt(projection_wkt)
        .and_then(|sr| sr.name())
        .unwrap_or_else(|_| "unparsable WKT".to_string())
}

/// Whether two WKT projections describe the same spatial reference.
///
/// Missing or unparsable projections are compared as text.
pub fn same_spatial_reference(a_wkt: &str, b_wkt: &str) -> bool {
    let (a_trimmed, b_trimmed) = (a_wkt.trim(), b_wkt.trim());
    if a_trimmed.is_empty() || b_trimmed.is_empty() {
        return a_trimmed == b_trimmed;
    }

    match (SpatialRef::from_wkt(a_trimmed), SpatialRef::from_wkt(b_trimmed)) {
        (Ok(a), Ok(b)) => a == b,
        _ => {
            warn!("Failed to parse projection WKT, comparing projections as text");
            a_trimmed == b_trimmed
        }
    }
}

/// Log whether the reference and target share a spatial reference.
///
/// Inputs are never reprojected; mismatching projections only produce a warning.
pub fn check_spatial_references(reference_wkt: &str, target_wkt: &str) -> bool {
    let same = same_spatial_reference(reference_wkt, target_wkt);
    if same {
        info!("Spatial reference: {}", describe_projection(reference_wkt));
    } else {
        warn!(
            "Reference ({}) and target ({}) spatial references differ; inputs are not reprojected",
            describe_projection(reference_wkt),
            describe_projection(target_wkt)
        );
    }
    same
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_undefined_match() {
        assert!(same_spatial_reference("", "  "));
    }

    #[test]
    fn test_undefined_differs_from_defined() {
        assert!(!same_spatial_reference("", "LOCAL_CS[\"grid\"]"));
        assert!(!check_spatial_references("LOCAL_CS[\"grid\"]", ""));
    }

    #[test]
    fn test_unparsable_compared_as_text() {
        assert!(same_spatial_reference("not a projection", "not a projection"));
        assert!(!same_spatial_reference("not a projection", "something else"));
    }

    #[test]
    fn test_describe_undefined() {
        assert_eq!(describe_projection(""), "undefined");
    }
}
