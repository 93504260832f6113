use crate::{
    features::{FeatureKey, TemplateId, Weight},
    storage::{LINE_SIZE, WeightLine, WeightsView},
};

/// Copies the rows of every active feature into `out`.
///
/// Position `i` of `features` holds the feature id produced by template `i`,
/// `0` marks a template without a feature. Unknown features contribute no rows.
///
/// # Arguments
/// * `weights` - The inference view to read rows from.
/// * `features` - The active feature ids, one per template.
/// * `out` - Cleared and filled with the gathered rows.
pub fn gather(weights: &WeightsView<'_>, features: &[u64], out: &mut Vec<WeightLine>) {
    out.clear();

    for (template, &feature) in features.iter().enumerate() {
        let Some(key) = FeatureKey::new(template as TemplateId, feature) else {
            continue;
        };

        if let Some(handle) = weights.get(key) {
            out.extend(weights.lines(handle).copied());
        }
    }
}

#[inline(always)]
fn add_line(dst: &mut [Weight; LINE_SIZE], src: &[Weight; LINE_SIZE]) {
    dst[0] += src[0];
    dst[1] += src[1];
    dst[2] += src[2];
    dst[3] += src[3];
    dst[4] += src[4];
    dst[5] += src[5];
    dst[6] += src[6];
}

/// Zeroes `scores` and adds every gathered row into it.
///
/// Rows that overhang the last class only add their valid columns.
pub fn accumulate(scores: &mut [Weight], lines: &[WeightLine]) {
    scores.fill(0.);
    let nr_class = scores.len();

    for line in lines {
        let start = line.start;
        let end = start + LINE_SIZE;

        if end <= nr_class {
            if let Ok(dst) = <&mut [Weight; LINE_SIZE]>::try_from(&mut scores[start..end]) {
                add_line(dst, &line.line);
            }
        } else if start < nr_class {
            let valid = nr_class - start;
            scores[start..]
                .iter_mut()
                .zip(&line.line[..valid])
                .for_each(|(s, w)| *s += w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FeatureMap;

    fn line(row: usize, weights: [Weight; LINE_SIZE]) -> WeightLine {
        WeightLine {
            start: row * LINE_SIZE,
            line: weights,
        }
    }

    #[test]
    fn test_accumulate_full_rows() {
        let mut scores = [9.; 14];
        let lines = [
            line(0, [1.; LINE_SIZE]),
            line(1, [2.; LINE_SIZE]),
            line(0, [0.5; LINE_SIZE]),
        ];
        accumulate(&mut scores, &lines);

        assert_eq!(scores[..7], [1.5; 7]);
        assert_eq!(scores[7..], [2.; 7]);
    }

    #[test]
    fn test_accumulate_partial_last_row() {
        let mut scores = [0.; 10];
        let lines = [line(1, [1., 2., 3., 4., 5., 6., 7.])];
        accumulate(&mut scores, &lines);

        assert_eq!(scores, [0., 0., 0., 0., 0., 0., 0., 1., 2., 3.]);
    }

    #[test]
    fn test_accumulate_without_lines_is_zero() {
        let mut scores = [3.; 5];
        accumulate(&mut scores, &[]);
        assert_eq!(scores, [0.; 5]);
    }

    #[test]
    fn test_gather_skips_absent_and_unknown() {
        let mut map = FeatureMap::new(10);
        let mut train = map.train();
        let handle = train.get_or_create(FeatureKey::new(1, 42).unwrap()).unwrap();
        train.cell(handle, 2).unwrap().update_weight(1.);
        train.cell(handle, 8).unwrap().update_weight(1.);

        let mut out = Vec::new();
        gather(&map.weights(), &[0, 42, 42], &mut out);

        // template 0 is absent and template 2 never saw feature 42
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].start, 0);
        assert_eq!(out[1].start, 7);
    }
}
