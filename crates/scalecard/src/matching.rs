//! Brute-force descriptor matching with Lowe's ratio test.

use crate::features::Descriptor;

/// One surviving template-to-target correspondence.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorMatch {
    /// Index into the template keypoint/descriptor vectors.
    pub template_idx: usize,
    /// Index into the target keypoint/descriptor vectors.
    pub target_idx: usize,
    /// Hamming distance of the winning pair.
    pub distance: u32,
}

/// Match every template descriptor against its two nearest target
/// descriptors (k=2, Hamming) and keep it only when the best distance is
/// below `ratio` times the second best.
///
/// With fewer than two target descriptors no match can pass the ratio test,
/// so the result is empty. That is a "not found" precursor, not an error.
pub fn match_descriptors(
    template: &[Descriptor],
    target: &[Descriptor],
    ratio: f32,
) -> Vec<DescriptorMatch> {
    if target.len() < 2 {
        return Vec::new();
    }

    let mut good = Vec::new();
    for (ti, desc) in template.iter().enumerate() {
        let mut best = u32::MAX;
        let mut second = u32::MAX;
        let mut best_idx = 0usize;
        for (qi, cand) in target.iter().enumerate() {
            let d = desc.hamming(cand);
            if d < best {
                second = best;
                best = d;
                best_idx = qi;
            } else if d < second {
                second = d;
            }
        }
        if (best as f32) < ratio * second as f32 {
            good.push(DescriptorMatch {
                template_idx: ti,
                target_idx: best_idx,
                distance: best,
            });
        }
    }
    good
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(word: u64) -> Descriptor {
        Descriptor([word, 0, 0, 0])
    }

    #[test]
    fn unambiguous_match_survives() {
        let template = vec![desc(0b1111)];
        // Best distance 0, second best 60: passes any sane ratio.
        let target = vec![desc(0b1111), desc(u64::MAX)];
        let m = match_descriptors(&template, &target, 0.7);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].target_idx, 0);
        assert_eq!(m[0].distance, 0);
    }

    #[test]
    fn ratio_test_rejects_ambiguous_match() {
        let template = vec![desc(0b1111)];
        // Two nearly equally good candidates: 3 bits vs 4 bits away, and
        // 3 < 0.7 * 4 fails, so the match is dropped as ambiguous.
        let target = vec![desc(0b0001), desc(0b0000)];
        let m = match_descriptors(&template, &target, 0.7);
        assert!(m.is_empty());
    }

    #[test]
    fn ratio_test_keeps_clearly_better_match() {
        let template = vec![desc(0b1111)];
        // 1 bit vs 2 bits away: 1 < 0.7 * 2 holds, so the best candidate
        // survives despite a nearby runner-up.
        let target = vec![desc(0b1110), desc(0b1100)];
        let m = match_descriptors(&template, &target, 0.7);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].target_idx, 0);
        assert_eq!(m[0].distance, 1);
    }

    #[test]
    fn single_target_descriptor_yields_nothing() {
        let template = vec![desc(1), desc(2)];
        let target = vec![desc(1)];
        assert!(match_descriptors(&template, &target, 0.7).is_empty());
    }

    #[test]
    fn each_template_descriptor_matches_independently() {
        let template = vec![desc(0xF0), desc(0x0F)];
        let target = vec![desc(0xF0), desc(0x0F), desc(u64::MAX >> 1)];
        let m = match_descriptors(&template, &target, 0.7);
        assert_eq!(m.len(), 2);
        assert_eq!(m[0].template_idx, 0);
        assert_eq!(m[0].target_idx, 0);
        assert_eq!(m[1].template_idx, 1);
        assert_eq!(m[1].target_idx, 1);
    }
}
