//! Match detections to catalog patterns.

use marker_telemetry_core::{Detection, PatternCatalog, PatternEntry};

/// A catalog pattern paired with the detection chosen for it this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedMarker {
    /// Position in the catalog.
    pub index: usize,
    pub pattern: PatternEntry,
    pub detection: Detection,
}

/// Index of the highest-confidence detection carrying `pattern_id`.
///
/// Ties keep the earliest detection.
pub fn best_detection(pattern_id: i32, detections: &[Detection]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (j, det) in detections.iter().enumerate() {
        if det.id != pattern_id {
            continue;
        }
        match best {
            Some(k) if detections[k].confidence < det.confidence => best = Some(j),
            Some(_) => {}
            None => best = Some(j),
        }
    }
    best
}

/// Resolve every catalog pattern against this frame's detections.
///
/// Sets each pattern's `visible` flag and returns the visible ones in
/// catalog order.
pub fn resolve(catalog: &mut PatternCatalog, detections: &[Detection]) -> Vec<ResolvedMarker> {
    let mut resolved = Vec::new();
    for index in 0..catalog.len() {
        let Some(pattern) = catalog.get(index) else {
            break;
        };
        match best_detection(pattern.id, detections) {
            Some(k) => {
                let pattern = pattern.clone();
                catalog.set_visible(index, true);
                resolved.push(ResolvedMarker {
                    index,
                    pattern: PatternEntry {
                        visible: true,
                        ..pattern
                    },
                    detection: detections[k].clone(),
                });
            }
            None => catalog.set_visible(index, false),
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn det(id: i32, confidence: f64, tag: f32) -> Detection {
        Detection {
            id,
            vertices: [Point2::new(tag, tag); 4],
            dir: 0,
            confidence,
        }
    }

    fn entry(id: i32, name: &str) -> PatternEntry {
        PatternEntry {
            id,
            name: name.to_string(),
            pattern_file: format!("patt.{name}").into(),
            side_length: 0.08,
            visible: false,
        }
    }

    #[test]
    fn picks_highest_confidence() {
        let dets = [det(3, 0.4, 0.0), det(5, 0.7, 1.0), det(3, 0.9, 2.0)];
        assert_eq!(best_detection(3, &dets), Some(2));
        assert_eq!(best_detection(5, &dets), Some(1));
        assert_eq!(best_detection(7, &dets), None);
    }

    #[test]
    fn ties_keep_first_detection() {
        let dets = [det(1, 0.5, 0.0), det(1, 0.5, 1.0)];
        assert_eq!(best_detection(1, &dets), Some(0));
    }

    #[test]
    fn nan_confidence_never_displaces_a_pick() {
        let dets = [det(1, 0.5, 0.0), det(1, f64::NAN, 1.0)];
        assert_eq!(best_detection(1, &dets), Some(0));
        let dets = [det(1, f64::NAN, 0.0), det(1, 0.5, 1.0)];
        assert_eq!(best_detection(1, &dets), Some(0));
    }

    #[test]
    fn unseen_pattern_is_not_visible() {
        let mut catalog =
            PatternCatalog::new(vec![entry(1, "one"), entry(2, "two"), entry(3, "three")])
                .expect("catalog");
        let dets = [det(1, 0.3, 0.0), det(1, 0.9, 1.0), det(2, 0.5, 2.0)];

        let resolved = resolve(&mut catalog, &dets);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].pattern.id, 1);
        assert_eq!(resolved[0].detection.confidence, 0.9);
        assert_eq!(resolved[1].pattern.id, 2);
        assert_eq!(resolved[1].detection.confidence, 0.5);
        assert!(!catalog.get(2).expect("three").visible);
    }

    #[test]
    fn resolve_sets_visibility_and_keeps_catalog_order() {
        let mut catalog =
            PatternCatalog::new(vec![entry(0, "a"), entry(1, "b"), entry(2, "c")]).expect("catalog");
        let dets = [det(2, 0.6, 0.0), det(-1, 1.0, 1.0), det(0, 0.5, 2.0)];

        let resolved = resolve(&mut catalog, &dets);
        let names: Vec<_> = resolved.iter().map(|m| m.pattern.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(resolved[0].detection, dets[2]);
        assert_eq!(resolved[1].index, 2);

        let visible: Vec<_> = catalog.iter().map(|p| p.visible).collect();
        assert_eq!(visible, [true, false, true]);

        let resolved = resolve(&mut catalog, &[]);
        assert!(resolved.is_empty());
        assert!(catalog.iter().all(|p| !p.visible));
    }
}
