pub use sitelens_llm::review::rescale_score as rescale_llm;

/// Weighted blend of the CLIP and LLM scores, both in `[0, 1]`.
///
/// With only one score present that score is used as is. An LLM score of zero
/// or less means the model gave no usable rating and counts as absent.
///
/// ```
/// use sitelens_compare::blend;
///
/// assert_eq!(blend(Some(0.6), Some(0.8), 0.5), Some(0.7));
/// assert_eq!(blend(None, Some(0.8), 0.5), Some(0.8));
/// assert_eq!(blend(Some(0.6), Some(0.0), 0.5), Some(0.6));
/// assert_eq!(blend(None, None, 0.5), None);
/// ```
pub fn blend(clip: Option<f64>, llm: Option<f64>, clip_weight: f64) -> Option<f64> {
    let llm = llm.filter(|s| *s > 0.0);
    let w = clip_weight.clamp(0.0, 1.0);
    match (clip, llm) {
        (Some(c), Some(l)) => Some(w * c + (1.0 - w) * l),
        (Some(c), None) => Some(c),
        (None, Some(l)) => Some(l),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_shifts_the_blend() {
        let b = blend(Some(1.0), Some(0.0001), 1.0).unwrap();
        assert_eq!(b, 1.0);
        let b = blend(Some(0.2), Some(0.6), 0.25).unwrap();
        assert!((b - 0.5).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_weights_are_clamped() {
        assert_eq!(blend(Some(0.4), Some(0.8), 7.0), Some(0.4));
        assert_eq!(blend(Some(0.4), Some(0.8), -1.0), Some(0.8));
    }

    #[test]
    fn negative_llm_scores_are_ignored() {
        assert_eq!(blend(None, Some(-0.5), 0.5), None);
    }

    #[test]
    fn llm_rescale_clamps() {
        assert_eq!(rescale_llm(8.0), 0.8);
        assert_eq!(rescale_llm(11.0), 1.0);
    }
}
