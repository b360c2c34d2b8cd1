//! Timestep alignment between two results.

use pal_model::{AlignedStep, Timestep};

/// Outcome of matching two timestep lists by simulation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Index pairs `(a, b)` in increasing time of `a`.
    pub pairs: Vec<(usize, usize)>,
    pub unmatched_a: Vec<usize>,
    pub unmatched_b: Vec<usize>,
}

impl Alignment {
    pub fn steps(&self, a: &[Timestep], b: &[Timestep]) -> Vec<AlignedStep> {
        self.pairs
            .iter()
            .map(|&(i, j)| AlignedStep {
                time_a_days: a[i].time_days,
                time_b_days: b[j].time_days,
                report_step_a: a[i].report_step,
                report_step_b: b[j].report_step,
            })
            .collect()
    }
}

/// Pair each step with its nearest partner within `tolerance_days`.
///
/// Candidate pairs are taken closest first, so the result does not depend
/// on which side is passed as `a`.
pub fn align(a: &[Timestep], b: &[Timestep], tolerance_days: f64) -> Alignment {
    let mut candidates: Vec<(f64, f64, f64, usize, usize)> = Vec::new();
    for (i, sa) in a.iter().enumerate() {
        for (j, sb) in b.iter().enumerate() {
            let gap = (sa.time_days - sb.time_days).abs();
            if gap <= tolerance_days {
                let lo = sa.time_days.min(sb.time_days);
                let hi = sa.time_days.max(sb.time_days);
                candidates.push((gap, lo, hi, i, j));
            }
        }
    }
    candidates.sort_by(|x, y| {
        x.0.total_cmp(&y.0)
            .then(x.1.total_cmp(&y.1))
            .then(x.2.total_cmp(&y.2))
    });

    let mut used_a = vec![false; a.len()];
    let mut used_b = vec![false; b.len()];
    let mut pairs = Vec::new();
    for (_, _, _, i, j) in candidates {
        if !used_a[i] && !used_b[j] {
            used_a[i] = true;
            used_b[j] = true;
            pairs.push((i, j));
        }
    }
    pairs.sort_by(|x, y| a[x.0].time_days.total_cmp(&a[y.0].time_days));

    let unused = |used: &[bool]| used.iter().enumerate().filter(|(_, u)| !**u).map(|(i, _)| i).collect();
    Alignment {
        pairs,
        unmatched_a: unused(&used_a),
        unmatched_b: unused(&used_b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(times: &[f64]) -> Vec<Timestep> {
        times
            .iter()
            .enumerate()
            .map(|(r, &t)| Timestep {
                report_step: r as u32 + 1,
                time_days: t,
                cells: None,
                wells: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn nearest_partner_wins() {
        let a = steps(&[10.0, 20.0, 30.0]);
        let b = steps(&[10.2, 19.9, 20.05, 45.0]);
        let al = align(&a, &b, 0.5);
        assert_eq!(al.pairs, vec![(0, 0), (1, 2)]);
        assert_eq!(al.unmatched_a, vec![2]);
        assert_eq!(al.unmatched_b, vec![1, 3]);
    }

    #[test]
    fn swapping_sides_swaps_pairs() {
        let a = steps(&[1.0, 2.0, 3.0, 4.0]);
        let b = steps(&[1.1, 2.9, 3.05]);
        let ab = align(&a, &b, 0.2);
        let ba = align(&b, &a, 0.2);
        let mut flipped: Vec<(usize, usize)> = ba.pairs.iter().map(|&(j, i)| (i, j)).collect();
        flipped.sort();
        assert_eq!(ab.pairs, flipped);
    }
}
